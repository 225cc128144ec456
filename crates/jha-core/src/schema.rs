//! JSON Schema checks for stage outputs.
//!
//! Each model-backed stage has a minimal schema under `schemas/`. It pins
//! only the keys downstream stages and the synthesizer rely on; everything
//! else a model returns is passed through untouched.

use std::sync::OnceLock;
use thiserror::Error;

use crate::types::Stage;

const VALIDATION_SCHEMA_JSON: &str = include_str!("../schemas/validation.schema.json");
const RISK_ASSESSMENT_SCHEMA_JSON: &str = include_str!("../schemas/risk_assessment.schema.json");
const INCIDENT_PREDICTION_SCHEMA_JSON: &str =
    include_str!("../schemas/incident_prediction.schema.json");

type Compiled = Result<jsonschema::Validator, String>;

static VALIDATION_SCHEMA: OnceLock<Compiled> = OnceLock::new();
static RISK_ASSESSMENT_SCHEMA: OnceLock<Compiled> = OnceLock::new();
static INCIDENT_PREDICTION_SCHEMA: OnceLock<Compiled> = OnceLock::new();

/// Errors from stage output validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Failed to load {stage} schema: {message}")]
    LoadError { stage: Stage, message: String },

    #[error("{stage} output failed schema validation: {}", .violations.join("; "))]
    Violations { stage: Stage, violations: Vec<String> },
}

fn compile(source: &str) -> Compiled {
    let schema_value: serde_json::Value = serde_json::from_str(source)
        .map_err(|e| format!("Invalid schema JSON: {}", e))?;

    jsonschema::options()
        .build(&schema_value)
        .map_err(|e| format!("Failed to compile schema: {}", e))
}

fn validator_for(stage: Stage) -> Option<Result<&'static jsonschema::Validator, SchemaError>> {
    let (cell, source) = match stage {
        Stage::Validation => (&VALIDATION_SCHEMA, VALIDATION_SCHEMA_JSON),
        Stage::RiskAssessment => (&RISK_ASSESSMENT_SCHEMA, RISK_ASSESSMENT_SCHEMA_JSON),
        Stage::IncidentPrediction => {
            (&INCIDENT_PREDICTION_SCHEMA, INCIDENT_PREDICTION_SCHEMA_JSON)
        }
        Stage::Synthesis => return None,
    };

    let compiled = cell.get_or_init(|| compile(source));
    Some(match compiled {
        Ok(v) => Ok(v),
        Err(message) => Err(SchemaError::LoadError {
            stage,
            message: message.clone(),
        }),
    })
}

/// Validate a stage's parsed output against its schema.
///
/// Synthesis has no schema; its output is a typed report.
pub fn validate_stage_output(stage: Stage, output: &serde_json::Value) -> Result<(), SchemaError> {
    let validator = match validator_for(stage) {
        None => return Ok(()),
        Some(v) => v?,
    };

    let violations: Vec<String> = validator
        .iter_errors(output)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::debug!(stage = %stage, count = violations.len(), "stage output rejected by schema");
        Err(SchemaError::Violations { stage, violations })
    }
}
