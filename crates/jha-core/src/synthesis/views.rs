//! Typed, default-valued views over stage outputs.
//!
//! Model output is untrusted. Every field here tolerates absence and wrong
//! types: a missing or ill-typed value reads as its default instead of
//! failing the whole view, and numeric fields also accept numeric strings.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::patterns::classify_hazard;
use crate::types::FatalFour;

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Finite number from a JSON number or numeric string.
pub(crate) fn number_from(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn view_from<T: DeserializeOwned + Default>(output: &Value, what: &str) -> T {
    match serde_json::from_value(output.clone()) {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!(stage = what, error = %e, "stage output unreadable, using defaults");
            T::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSummary {
    #[serde(deserialize_with = "lenient_number")]
    pub quality_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub data_quality: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub completeness: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub review_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationView {
    #[serde(deserialize_with = "lenient")]
    pub validation: ValidationSummary,
    /// Some models put the score at the top level instead of under `validation`.
    #[serde(deserialize_with = "lenient_number")]
    pub quality_score: Option<f64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub missing_critical: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub concerns: Value,
    #[serde(deserialize_with = "lenient_vec")]
    pub recommendations: Vec<String>,
}

impl ValidationView {
    pub fn from_output(output: &Value) -> Self {
        view_from(output, "validation")
    }

    /// Checklist quality on a 0-10 scale, 0 when unknown.
    pub fn quality_score(&self) -> f64 {
        self.validation
            .quality_score
            .or(self.quality_score)
            .unwrap_or(0.0)
    }

    pub fn data_quality(&self) -> &str {
        self.validation.data_quality.as_deref().unwrap_or("UNKNOWN")
    }
}

// ---------------------------------------------------------------------------
// Risk assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskSummary {
    #[serde(deserialize_with = "lenient_text")]
    pub overall_risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub highest_risk_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub industry_context: Option<String>,
}

/// One hazard from the risk stage. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hazard {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub consequence: Option<String>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub osha_context: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub inadequate_controls: Vec<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub recommended_controls: Vec<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub regulatory_requirement: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Hazard {
    pub fn risk_score(&self) -> f64 {
        self.risk_score.unwrap_or(0.0)
    }

    /// Fatal Four bucket from the declared category, else from the name.
    pub fn fatal_four(&self) -> FatalFour {
        self.category
            .as_deref()
            .and_then(FatalFour::from_label)
            .filter(|c| *c != FatalFour::Other)
            .unwrap_or_else(|| classify_hazard(&self.name))
    }

    pub fn is_fall_related(&self) -> bool {
        self.fatal_four() == FatalFour::Falls
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "identified hazard"
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskView {
    #[serde(deserialize_with = "lenient")]
    pub risk_summary: RiskSummary,
    #[serde(deserialize_with = "lenient_vec")]
    pub hazards: Vec<Hazard>,
    #[serde(deserialize_with = "lenient_vec")]
    pub top_threats: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub weather_impact: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub immediate_actions: Vec<String>,
}

impl RiskView {
    pub fn from_output(output: &Value) -> Self {
        view_from(output, "risk_assessment")
    }

    /// Hazard with the highest risk score. The earliest wins ties.
    pub fn top_hazard(&self) -> Option<&Hazard> {
        self.hazards.iter().fold(None, |best: Option<&Hazard>, h| match best {
            Some(b) if b.risk_score() >= h.risk_score() => Some(b),
            _ => Some(h),
        })
    }

    /// Top hazard score, else the summary's highest score, else 0.
    pub fn top_risk_score(&self) -> f64 {
        self.top_hazard()
            .and_then(|h| h.risk_score)
            .or(self.risk_summary.highest_risk_score)
            .unwrap_or(0.0)
    }

    pub fn overall_risk_level(&self) -> &str {
        self.risk_summary
            .overall_risk_level
            .as_deref()
            .unwrap_or("MEDIUM")
    }
}

// ---------------------------------------------------------------------------
// Incident prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentPrediction {
    #[serde(deserialize_with = "lenient_text")]
    pub incident_name: Option<String>,
    #[serde(rename = "probabilityNext4Hours", deserialize_with = "lenient_number")]
    pub probability_next_4_hours: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub severity: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub confidence: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub peak_risk_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Intervention {
    #[serde(deserialize_with = "lenient_text")]
    pub timeframe: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub action: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub effectiveness: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub responsibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictionView {
    #[serde(deserialize_with = "lenient")]
    pub incident_prediction: IncidentPrediction,
    #[serde(deserialize_with = "lenient")]
    pub causal_chain: Value,
    #[serde(deserialize_with = "lenient_vec")]
    pub leading_indicators: Vec<Value>,
    #[serde(deserialize_with = "lenient_vec")]
    pub interventions: Vec<Intervention>,
    #[serde(deserialize_with = "lenient")]
    pub swiss_cheese_alignment: Value,
    #[serde(deserialize_with = "lenient_vec")]
    pub risk_factors: Vec<String>,
}

impl PredictionView {
    pub fn from_output(output: &Value) -> Self {
        view_from(output, "incident_prediction")
    }

    /// Probability of the predicted incident in the next four hours, 0 when unknown.
    pub fn incident_probability(&self) -> f64 {
        self.incident_prediction
            .probability_next_4_hours
            .unwrap_or(0.0)
    }
}
