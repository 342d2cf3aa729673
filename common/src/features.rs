//! Feature vector and form validation for the FWI regression model.
//!
//! The scaler and the ridge model were fit on a fixed column order, so every
//! path that turns user input into numbers goes through [`FeatureVector`].

use serde::Deserialize;
use std::fmt;

pub const NUM_FEATURES: usize = 9;

/// Column order the artifacts were fit on.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "Temperature",
    "RH",
    "Ws",
    "Rain",
    "FFMC",
    "DMC",
    "ISI",
    "Classes",
    "Region",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; NUM_FEATURES]);

impl FeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    /// Value of a named feature, `None` for unknown names.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }
}

/// Raw `POST /predictdata` body. Every field is optional so that validation,
/// not deserialization, decides what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictForm {
    #[serde(rename = "Temperature")]
    pub temperature: Option<String>,
    #[serde(rename = "RH")]
    pub rh: Option<String>,
    #[serde(rename = "Ws")]
    pub ws: Option<String>,
    #[serde(rename = "Rain")]
    pub rain: Option<String>,
    #[serde(rename = "FFMC")]
    pub ffmc: Option<String>,
    #[serde(rename = "DMC")]
    pub dmc: Option<String>,
    #[serde(rename = "ISI")]
    pub isi: Option<String>,
    #[serde(rename = "Classes")]
    pub classes: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
}

impl PredictForm {
    /// Build from decoded `(name, value)` pairs. Unknown names are ignored
    /// and the first value of a repeated name wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut form = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_ref() {
                "Temperature" => &mut form.temperature,
                "RH" => &mut form.rh,
                "Ws" => &mut form.ws,
                "Rain" => &mut form.rain,
                "FFMC" => &mut form.ffmc,
                "DMC" => &mut form.dmc,
                "ISI" => &mut form.isi,
                "Classes" => &mut form.classes,
                "Region" => &mut form.region,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        form
    }

    /// Fields in [`FEATURE_NAMES`] order.
    fn fields(&self) -> [Option<&str>; NUM_FEATURES] {
        [
            self.temperature.as_deref(),
            self.rh.as_deref(),
            self.ws.as_deref(),
            self.rain.as_deref(),
            self.ffmc.as_deref(),
            self.dmc.as_deref(),
            self.isi.as_deref(),
            self.classes.as_deref(),
            self.region.as_deref(),
        ]
    }

    /// Parse and validate all nine fields.
    ///
    /// A field is missing when it is absent, empty or only whitespace. A
    /// present field that does not parse as `f64` is reported as invalid.
    /// Both lists keep [`FEATURE_NAMES`] order.
    pub fn validate(&self) -> Result<FeatureVector, FormError> {
        let mut values = [0.0; NUM_FEATURES];
        let mut error = FormError::default();

        for (idx, raw) in self.fields().into_iter().enumerate() {
            let name = FEATURE_NAMES[idx];
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => error.missing.push(name),
                Some(text) => match text.parse::<f64>() {
                    Ok(v) => values[idx] = v,
                    Err(_) => error.invalid.push(name),
                },
            }
        }

        if error.is_empty() {
            Ok(FeatureVector(values))
        } else {
            Err(error)
        }
    }
}

/// Field names that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<&'static str>,
}

impl FormError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error:")?;
        if !self.missing.is_empty() {
            write!(f, " Missing or empty fields: {}.", self.missing.join(", "))?;
        }
        if !self.invalid.is_empty() {
            write!(f, " Non-numeric fields: {}.", self.invalid.join(", "))?;
        }
        write!(f, " Please provide all required numerical inputs.")
    }
}

impl std::error::Error for FormError {}
