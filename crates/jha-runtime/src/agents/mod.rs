//! Stage agents.
//!
//! Three stages call a model through [`LlmStageAgent`], each distinguished
//! only by its [`StagePrompt`] profile. Synthesis is pure logic.

mod incident_predictor;
mod llm;
mod risk_assessor;
mod synthesis;
mod traits;
mod validator;

pub use incident_predictor::{IncidentPredictorAgent, IncidentPredictorProfile};
pub use llm::LlmStageAgent;
pub use risk_assessor::{RiskAssessorAgent, RiskAssessorProfile};
pub use synthesis::{SynthesisAgent, SYNTHESIS_MODEL};
pub use traits::{StageAgent, StageError, StageErrorKind, StagePrompt};
pub use validator::{ValidatorAgent, ValidatorProfile};
