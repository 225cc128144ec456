//! Final report shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::views::{Hazard, IncidentPrediction, Intervention};
use crate::types::{
    ActionPriority, ComplianceStatus, Decision, GapSeverity, RescueCapability, Urgency,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub project_name: String,
    pub location: String,
    pub work_type: String,
    pub supervisor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub decision: Decision,
    pub urgency_level: Urgency,
    pub overall_risk_level: String,
    pub key_findings: Vec<String>,
    pub action_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardAnalysis {
    pub identified_hazards: Vec<Hazard>,
    pub top_threats: Vec<String>,
    pub weather_impact: String,
    /// Distinct lower-case Fatal Four buckets, `general_safety` when none.
    pub safety_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPredictionSection {
    pub predicted_incident: IncidentPrediction,
    pub causal_chain: Value,
    pub leading_indicators: Vec<Value>,
    pub interventions: Vec<Intervention>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceGap {
    pub standard: String,
    pub requirement: String,
    pub severity: GapSeverity,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSection {
    pub overall_status: ComplianceStatus,
    pub identified_gaps: Vec<ComplianceGap>,
    pub critical_issues: Vec<ComplianceGap>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyReadiness {
    pub rescue_capability: RescueCapability,
    pub first_aid: bool,
    pub communication: bool,
    pub evacuation_plan: bool,
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub priority: ActionPriority,
    pub action: String,
    pub timeframe: String,
    pub responsibility: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub data_quality_score: f64,
    pub risk_assessment_confidence: String,
    pub prediction_confidence: String,
    pub completeness: String,
}

/// Report produced by a fully successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub hazard_analysis: HazardAnalysis,
    pub incident_prediction: IncidentPredictionSection,
    pub compliance_status: ComplianceSection,
    pub emergency_readiness: EmergencyReadiness,
    pub action_items: Vec<ActionItem>,
    pub quality_metrics: QualityMetrics,
}

/// Decision every fallback report carries.
pub const FALLBACK_DECISION: Decision = Decision::StopWork;

/// Key finding every fallback report carries.
pub const FALLBACK_FINDING: &str = "System error - manual review required";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMetadata {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
}

/// Conservative report returned when any stage fails.
///
/// Its content is fixed; only the error text and timestamps vary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackReport {
    pub metadata: FallbackMetadata,
    pub executive_summary: ExecutiveSummary,
    pub error: String,
    pub fallback: bool,
}

impl FallbackReport {
    pub fn new(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            metadata: FallbackMetadata {
                report_id: format!("FALLBACK-{}", now.timestamp()),
                generated_at: now,
            },
            executive_summary: ExecutiveSummary {
                decision: FALLBACK_DECISION,
                urgency_level: FALLBACK_DECISION.urgency(),
                overall_risk_level: "UNKNOWN".to_string(),
                key_findings: vec![FALLBACK_FINDING.to_string()],
                action_required: true,
            },
            error: error.into(),
            fallback: true,
        }
    }
}

/// The terminal artifact of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Fallback(FallbackReport),
    Complete(Box<FinalReport>),
}

impl Report {
    pub fn decision(&self) -> Decision {
        self.executive_summary().decision
    }

    pub fn executive_summary(&self) -> &ExecutiveSummary {
        match self {
            Report::Complete(report) => &report.executive_summary,
            Report::Fallback(report) => &report.executive_summary,
        }
    }

    pub fn report_id(&self) -> &str {
        match self {
            Report::Complete(report) => &report.metadata.report_id,
            Report::Fallback(report) => &report.metadata.report_id,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Report::Fallback(_))
    }

    pub fn as_complete(&self) -> Option<&FinalReport> {
        match self {
            Report::Complete(report) => Some(report),
            Report::Fallback(_) => None,
        }
    }
}
