//! Run inputs: the safety checklist, weather conditions and OSHA reference data.
//!
//! All three are loaded from JSON or YAML. Field names follow the camelCase
//! used by checklist front-ends, and unknown fields are preserved so prompts
//! see everything the crew wrote down.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::WeatherRisk;

/// Errors that can occur when loading run inputs.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Load a JSON or YAML document, choosing the parser by file extension.
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, InputError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        other => Err(InputError::UnsupportedFormat(format!(
            "{} (expected .json, .yaml or .yml, got {:?})",
            path.display(),
            other
        ))),
    }
}

/// A completed job hazard analysis checklist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<String>,

    /// Question id to crew response.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub responses: Map<String, Value>,

    /// Any other fields the checklist carries.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checklist {
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, InputError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        load_document(path)
    }

    /// Work type, or "General Construction" when none was recorded.
    pub fn work_type_or_default(&self) -> &str {
        self.work_type
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or("General Construction")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Pretty JSON rendering used inside prompts.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Lower-cased JSON text of the whole checklist, keys included.
    ///
    /// Keyword scans run over this so that a field named `rescuePlan`
    /// counts as much as a response mentioning a rescue plan.
    pub fn searchable_text(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Site weather at the time of the analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConditions {
    /// Degrees Fahrenheit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Miles per hour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    /// Boolean, amount, or description such as "light rain".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,

    /// Free-text forecast for the next few hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,

    #[serde(default)]
    pub risk_level: WeatherRisk,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WeatherConditions {
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        load_document(path)
    }

    /// Whether any precipitation is reported.
    pub fn has_precipitation(&self) -> bool {
        match &self.precipitation {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v > 0.0),
            Some(Value::String(s)) => {
                let s = s.trim().to_lowercase();
                !(s.is_empty() || s == "none" || s == "0" || s == "false" || s == "no")
            }
            Some(_) => true,
        }
    }

    /// One-line summary, e.g. `Temp: 41°F, Wind: 18mph, Conditions: Overcast`.
    pub fn summary(&self) -> String {
        fn or_na(v: Option<f64>) -> String {
            v.map(|v| format!("{}", v)).unwrap_or_else(|| "N/A".to_string())
        }

        format!(
            "Temp: {}°F, Wind: {}mph, Conditions: {}",
            or_na(self.temperature),
            or_na(self.wind_speed),
            self.conditions.as_deref().unwrap_or("N/A")
        )
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Industry injury statistics the risk stage calibrates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceData {
    pub industry_name: String,
    pub naics_code: String,
    /// Injuries per 100 workers per year.
    pub injury_rate: f64,
    pub total_cases: u64,
    pub data_source: String,
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self {
            industry_name: "Specialty Trade Contractors".to_string(),
            naics_code: "238".to_string(),
            injury_rate: 35.0,
            total_cases: 198_400,
            data_source: "BLS_Table_1_2023".to_string(),
        }
    }
}

impl ReferenceData {
    /// Baseline construction injury rate that comparisons are made against.
    pub const CONSTRUCTION_BASELINE_RATE: f64 = 35.0;

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InputError> {
        load_document(path)
    }

    /// Base incident probability derived from the injury rate.
    pub fn base_probability(&self) -> f64 {
        self.injury_rate / 100.0
    }

    /// Injury rate as a percentage of the construction baseline.
    pub fn industry_comparison(&self) -> i64 {
        if self.injury_rate <= 0.0 {
            return 0;
        }
        ((self.injury_rate / Self::CONSTRUCTION_BASELINE_RATE) * 100.0).round() as i64
    }
}
