//! Core enumerations shared by the pipeline, the synthesizer and reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four sequential reasoning steps of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    RiskAssessment,
    IncidentPrediction,
    Synthesis,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::Validation,
        Stage::RiskAssessment,
        Stage::IncidentPrediction,
        Stage::Synthesis,
    ];

    /// Stable identifier used in configuration and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::RiskAssessment => "risk_assessment",
            Stage::IncidentPrediction => "incident_prediction",
            Stage::Synthesis => "synthesis",
        }
    }

    /// Whether the stage calls a model. Synthesis is pure logic.
    pub fn uses_model(&self) -> bool {
        !matches!(self, Stage::Synthesis)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Work authorization decision, from most to least conservative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    StopWork,
    NoGo,
    GoWithConditions,
    Go,
}

impl Decision {
    /// Urgency attached to the decision in the executive summary.
    pub fn urgency(&self) -> Urgency {
        match self {
            Decision::StopWork => Urgency::Critical,
            Decision::NoGo => Urgency::High,
            Decision::GoWithConditions => Urgency::Medium,
            Decision::Go => Urgency::Low,
        }
    }

    /// Decisions that withhold work authorization.
    pub fn is_conservative(&self) -> bool {
        matches!(self, Decision::StopWork | Decision::NoGo)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::StopWork => "STOP_WORK",
            Decision::NoGo => "NO_GO",
            Decision::GoWithConditions => "GO_WITH_CONDITIONS",
            Decision::Go => "GO",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Critical,
    High,
    Medium,
    Low,
}

/// Weather-driven risk level supplied with the run inputs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherRisk {
    #[default]
    #[serde(alias = "low", alias = "Low")]
    Low,
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "high", alias = "High")]
    High,
    #[serde(alias = "extreme", alias = "Extreme")]
    Extreme,
}

impl fmt::Display for WeatherRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeatherRisk::Low => "LOW",
            WeatherRisk::Medium => "MEDIUM",
            WeatherRisk::High => "HIGH",
            WeatherRisk::Extreme => "EXTREME",
        };
        f.write_str(s)
    }
}

/// OSHA "Fatal Four" hazard buckets plus a catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FatalFour {
    Falls,
    #[serde(rename = "Struck-By")]
    StruckBy,
    Electrocution,
    #[serde(rename = "Caught-Between")]
    CaughtBetween,
    Other,
}

impl FatalFour {
    /// Parse a category label as written by a model.
    ///
    /// Matching ignores case and punctuation, so `"Struck-By"`,
    /// `"struck by"` and `"STRUCK_BY"` are all accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "falls" | "fall" => Some(FatalFour::Falls),
            "struckby" => Some(FatalFour::StruckBy),
            "electrocution" | "electrical" => Some(FatalFour::Electrocution),
            "caughtbetween" | "caughtinbetween" => Some(FatalFour::CaughtBetween),
            "other" => Some(FatalFour::Other),
            _ => None,
        }
    }

    /// Lower-case identifier used for report safety categories.
    pub fn slug(&self) -> &'static str {
        match self {
            FatalFour::Falls => "falls",
            FatalFour::StruckBy => "struck_by",
            FatalFour::Electrocution => "electrocution",
            FatalFour::CaughtBetween => "caught_between",
            FatalFour::Other => "other",
        }
    }
}

/// Severity of a compliance gap. Ordering puts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GapSeverity {
    Critical,
    High,
    Medium,
}

/// Priority of a generated action item. Ordering puts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPriority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RescueCapability {
    Adequate,
    Inadequate,
    NotRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    GapsIdentified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("swiss_cheese".parse::<Stage>().is_err());
    }

    #[test]
    fn test_decision_serializes_screaming_snake() {
        let json = serde_json::to_string(&Decision::GoWithConditions).unwrap();
        assert_eq!(json, "\"GO_WITH_CONDITIONS\"");
        assert_eq!(Decision::StopWork.to_string(), "STOP_WORK");
    }

    #[test]
    fn test_decision_ordering_is_most_conservative_first() {
        assert!(Decision::StopWork < Decision::NoGo);
        assert!(Decision::NoGo < Decision::GoWithConditions);
        assert!(Decision::GoWithConditions < Decision::Go);
        assert!(Decision::StopWork.is_conservative());
        assert!(!Decision::GoWithConditions.is_conservative());
    }

    #[test]
    fn test_urgency_mapping() {
        assert_eq!(Decision::StopWork.urgency(), Urgency::Critical);
        assert_eq!(Decision::NoGo.urgency(), Urgency::High);
        assert_eq!(Decision::GoWithConditions.urgency(), Urgency::Medium);
        assert_eq!(Decision::Go.urgency(), Urgency::Low);
    }

    #[test]
    fn test_weather_risk_accepts_lowercase() {
        let risk: WeatherRisk = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(risk, WeatherRisk::High);
        let risk: WeatherRisk = serde_json::from_str("\"EXTREME\"").unwrap();
        assert_eq!(risk, WeatherRisk::Extreme);
        assert_eq!(WeatherRisk::default(), WeatherRisk::Low);
    }

    #[test]
    fn test_fatal_four_labels() {
        assert_eq!(FatalFour::from_label("Struck-By"), Some(FatalFour::StruckBy));
        assert_eq!(FatalFour::from_label("caught between"), Some(FatalFour::CaughtBetween));
        assert_eq!(FatalFour::from_label("FALLS"), Some(FatalFour::Falls));
        assert_eq!(FatalFour::from_label("ergonomic"), None);

        let json = serde_json::to_string(&FatalFour::CaughtBetween).unwrap();
        assert_eq!(json, "\"Caught-Between\"");
    }

    #[test]
    fn test_gap_severity_sorts_critical_first() {
        let mut severities = vec![GapSeverity::Medium, GapSeverity::Critical, GapSeverity::High];
        severities.sort();
        assert_eq!(
            severities,
            vec![GapSeverity::Critical, GapSeverity::High, GapSeverity::Medium]
        );
    }
}
