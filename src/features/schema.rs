/// A canonical column filled from other columns when the client omitted it.
#[derive(Debug)]
pub struct Derivation {
    pub target: &'static str,
    pub inputs: &'static [&'static str],
    pub formula: fn(&[f64]) -> f64,
}

/// String-to-code table for a categorical column. Lookups are trimmed and
/// case-insensitive; keys here are lowercase.
#[derive(Debug)]
pub struct Categorical {
    pub column: &'static str,
    pub codes: &'static [(&'static str, f64)],
}

impl Categorical {
    pub fn code(&self, value: &str) -> Option<f64> {
        let key = value.trim().to_lowercase();
        self.codes
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, code)| *code)
    }
}

/// Training-time input schema of one model: column order plus the tables used
/// to map loose client input onto it.
#[derive(Debug)]
pub struct FeatureSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    /// `(alias, canonical)` pairs, alias lowercase, applied in order.
    pub aliases: &'static [(&'static str, &'static str)],
    pub derivations: &'static [Derivation],
    pub categoricals: &'static [Categorical],
    pub default_value: f64,
}

impl FeatureSchema {
    pub fn categorical(&self, column: &str) -> Option<&Categorical> {
        self.categoricals.iter().find(|c| c.column == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// Dew point estimate: T - (100 - RH) / 5
fn dew_point(inputs: &[f64]) -> f64 {
    let (temperature, humidity) = (inputs[0], inputs[1]);
    temperature - (100.0 - humidity) / 5.0
}

// Soil runs a couple of degrees below air temperature.
fn soil_temperature(inputs: &[f64]) -> f64 {
    inputs[0] - 2.0
}

pub static IRRIGATION: FeatureSchema = FeatureSchema {
    name: "irrigation",
    columns: &[
        "Humidity",
        "Atmospheric_Temp",
        "Soil_Temp",
        "Dew_Point",
        "Previous_Soil_Moisture",
    ],
    aliases: &[
        ("temperature", "Atmospheric_Temp"),
        ("humidity", "Humidity"),
        ("previous_moisture", "Previous_Soil_Moisture"),
        ("soil_moisture", "Previous_Soil_Moisture"),
        ("dew_point", "Dew_Point"),
        ("soil_temp", "Soil_Temp"),
    ],
    derivations: &[
        Derivation {
            target: "Dew_Point",
            inputs: &["Atmospheric_Temp", "Humidity"],
            formula: dew_point,
        },
        Derivation {
            target: "Soil_Temp",
            inputs: &["Atmospheric_Temp"],
            formula: soil_temperature,
        },
    ],
    categoricals: &[],
    default_value: 0.0,
};

pub static YIELD: FeatureSchema = FeatureSchema {
    name: "yield",
    columns: &[
        "crop",
        "area",
        "rainfall",
        "temperature",
        "season",
        "soil_type",
        "ph",
        "fertilizer_level",
    ],
    aliases: &[],
    derivations: &[],
    categoricals: &[
        Categorical {
            column: "crop",
            codes: &[
                ("rice", 0.0),
                ("wheat", 1.0),
                ("maize", 2.0),
                ("cotton", 3.0),
                ("sugarcane", 4.0),
            ],
        },
        Categorical {
            column: "season",
            codes: &[
                ("kharif", 0.0),
                ("rabi", 1.0),
                ("summer", 2.0),
                ("winter", 3.0),
                ("whole_year", 4.0),
            ],
        },
        Categorical {
            column: "soil_type",
            codes: &[
                ("sandy", 0.0),
                ("loamy", 1.0),
                ("loam", 1.0),
                ("clay", 2.0),
                ("silty", 3.0),
                ("silt", 3.0),
                ("black", 4.0),
                ("red", 5.0),
            ],
        },
    ],
    default_value: 0.0,
};
