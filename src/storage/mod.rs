pub mod store;
pub mod types;

pub use store::PredictionStore;
pub use types::{Collection, Document, PredictionRecord, StoredDocument};
