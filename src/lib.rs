pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod inference;
pub mod llm;
pub mod models;
pub mod recommend;
pub mod server;
pub mod storage;

pub use error::{Error, Result};
