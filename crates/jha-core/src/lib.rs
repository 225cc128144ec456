//! # jha-core
//!
//! Deterministic domain logic for construction Job Hazard Analysis reports.
//!
//! This crate holds everything about a JHA run that does not need a model:
//! - run inputs (checklist, weather, OSHA reference data)
//! - extraction of a JSON object from free-form model text
//! - minimal JSON Schemas for each model-backed stage's output
//! - Fatal Four hazard classification and emergency keyword scans
//! - the decision classifier and report synthesis
//! - the conservative fallback report
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: synthesis is a pure function of its inputs and a timestamp
//! 2. **No LLM calls**: model access lives in `jha-runtime`
//! 3. **Tolerant**: ill-typed model output reads as defaults, never panics
//!
//! ## Example
//!
//! ```rust,ignore
//! use jha_core::{Checklist, WeatherConditions, SynthesisInput, Synthesizer};
//!
//! let checklist = Checklist::from_file("checklist.json")?;
//! let weather = WeatherConditions::from_file("weather.json")?;
//! let report = Synthesizer::new().synthesize(
//!     &SynthesisInput { validation: &v, risk: &r, prediction: &p, checklist: &checklist, weather: &weather },
//!     chrono::Utc::now(),
//! );
//! println!("{}", report.executive_summary.decision);
//! ```

pub mod extract;
pub mod input;
pub mod patterns;
pub mod reference;
pub mod schema;
pub mod synthesis;
pub mod types;

pub use extract::{extract_json_object, ExtractError};
pub use input::{load_document, Checklist, InputError, ReferenceData, WeatherConditions};
pub use patterns::{classify_hazard, scan_emergency_provisions, EmergencyProvisions};
pub use schema::{validate_stage_output, SchemaError};
pub use synthesis::{
    classify_decision, ActionItem, ComplianceGap, DecisionInputs, FallbackReport, FinalReport,
    Report, SynthesisInput, Synthesizer, FALLBACK_DECISION, FALLBACK_FINDING,
};
pub use types::{
    ActionPriority, ComplianceStatus, Decision, FatalFour, GapSeverity, RescueCapability, Stage,
    Urgency, WeatherRisk,
};
