//! Static label and threshold tables shared by the inference and
//! recommendation layers.

/// PlantVillage class names in classifier output order.
pub const DISEASE_LABELS: [&str; 31] = [
    "Apple___Apple_scab",
    "Apple___Black_rot",
    "Apple___Cedar_apple_rust",
    "Apple___healthy",
    "Background_without_leaves",
    "Blueberry___healthy",
    "Cherry___healthy",
    "Cherry___Powdery_mildew",
    "Corn___Common_rust",
    "Corn___healthy",
    "Corn___Northern_Leaf_Blight",
    "Grape___Black_rot",
    "Grape___healthy",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___healthy",
    "Potato___Early_blight",
    "Potato___healthy",
    "Potato___Late_blight",
    "Raspberry___healthy",
    "Soybean___healthy",
    "Squash___Powdery_mildew",
    "Strawberry___healthy",
    "Strawberry___Leaf_scorch",
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___healthy",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Target_Spot",
];

/// Square input resolution of the disease classifier.
pub const IMAGE_SIZE: u32 = 224;

/// Per-channel normalization constants used at training time.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const DISEASE_CONFIDENCE_THRESHOLD: f64 = 0.60;

pub const IRRIGATION_NEEDED_BELOW: f64 = 25.0;
pub const MONITOR_BELOW: f64 = 40.0;

pub const IRRIGATION_NEEDED: &str = "Irrigation Needed";
pub const MONITOR_LOW: &str = "Monitor - Low";
pub const NO_IRRIGATION_REQUIRED: &str = "No Irrigation Required";

/// Daily rainfall bands in mm.
pub const RAINFALL_LIGHT: f64 = 2.5;
pub const RAINFALL_MODERATE: f64 = 7.6;
pub const RAINFALL_HEAVY: f64 = 35.0;

/// Air temperature bands in °C.
pub const TEMPERATURE_LOW: f64 = 15.0;
pub const TEMPERATURE_OPTIMAL_MIN: f64 = 20.0;
pub const TEMPERATURE_OPTIMAL_MAX: f64 = 30.0;
pub const TEMPERATURE_HIGH: f64 = 35.0;

/// Yield bands in tons.
pub const YIELD_LOW: f64 = 1.5;
pub const YIELD_MODERATE: f64 = 3.0;
pub const YIELD_GOOD: f64 = 5.0;
pub const YIELD_EXCELLENT: f64 = 7.0;

pub const YIELD_UNIT: &str = "tons";

/// Ordered threshold banding: the first upper bound the value falls below wins.
pub fn band<'a>(value: f64, bands: &[(f64, &'a str)], otherwise: &'a str) -> &'a str {
    bands
        .iter()
        .find(|(upper, _)| value < *upper)
        .map(|(_, label)| *label)
        .unwrap_or(otherwise)
}

pub fn irrigation_recommendation(predicted_moisture: f64) -> &'static str {
    band(
        predicted_moisture,
        &[
            (IRRIGATION_NEEDED_BELOW, IRRIGATION_NEEDED),
            (MONITOR_BELOW, MONITOR_LOW),
        ],
        NO_IRRIGATION_REQUIRED,
    )
}

pub fn yield_band(predicted_yield: f64) -> &'static str {
    band(
        predicted_yield,
        &[
            (YIELD_LOW, "poor"),
            (YIELD_MODERATE, "moderate"),
            (YIELD_GOOD, "good"),
            (YIELD_EXCELLENT, "very good"),
        ],
        "excellent",
    )
}

pub fn rainfall_band(rainfall_mm: f64) -> &'static str {
    if rainfall_mm <= 0.0 {
        return "no rain";
    }
    band(
        rainfall_mm,
        &[
            (RAINFALL_LIGHT, "light"),
            (RAINFALL_MODERATE, "moderate"),
            (RAINFALL_HEAVY, "heavy"),
        ],
        "very heavy",
    )
}

pub fn temperature_band(celsius: f64) -> &'static str {
    band(
        celsius,
        &[
            (TEMPERATURE_LOW, "cold"),
            (TEMPERATURE_OPTIMAL_MIN, "cool"),
            (TEMPERATURE_OPTIMAL_MAX, "optimal"),
            (TEMPERATURE_HIGH, "warm"),
        ],
        "hot",
    )
}
