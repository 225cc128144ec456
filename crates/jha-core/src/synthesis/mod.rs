//! Synthesizer: folds the three stage outputs into the final report.
//!
//! Synthesis makes no model calls. Given the same upstream outputs, checklist,
//! weather and timestamp it always produces the same report.

pub mod decision;
pub mod report;
pub mod views;

use chrono::{DateTime, Utc};
use serde_json::Value;
use fnv::FnvHasher;
use std::collections::HashSet;
use std::hash::Hasher;

use crate::input::{Checklist, WeatherConditions};
use crate::patterns::scan_emergency_provisions;
use crate::types::{ActionPriority, ComplianceStatus, Decision, GapSeverity, RescueCapability};

pub use decision::{classify_decision, DecisionInputs};
pub use report::{
    ActionItem, ComplianceGap, ComplianceSection, EmergencyReadiness, ExecutiveSummary,
    FallbackReport, FinalReport, HazardAnalysis, IncidentPredictionSection, QualityMetrics,
    Report, ReportMetadata, FALLBACK_DECISION, FALLBACK_FINDING,
};
pub use views::{Hazard, Intervention, PredictionView, RiskView, ValidationView};

const MAX_INTERVENTION_ACTIONS: usize = 3;

/// Everything synthesis reads.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub validation: &'a Value,
    pub risk: &'a Value,
    pub prediction: &'a Value,
    pub checklist: &'a Checklist,
    pub weather: &'a WeatherConditions,
}

/// The Synthesizer builds a [`FinalReport`] from upstream stage outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, input: &SynthesisInput<'_>, now: DateTime<Utc>) -> FinalReport {
        let validation = ValidationView::from_output(input.validation);
        let risk = RiskView::from_output(input.risk);
        let prediction = PredictionView::from_output(input.prediction);

        let inputs = DecisionInputs {
            quality_score: validation.quality_score(),
            top_risk_score: risk.top_risk_score(),
            incident_probability: prediction.incident_probability(),
            weather_risk: input.weather.risk_level,
        };
        let decision = classify_decision(&inputs);

        tracing::debug!(
            decision = %decision,
            quality = inputs.quality_score,
            top_risk = inputs.top_risk_score,
            probability = inputs.incident_probability,
            weather = %inputs.weather_risk,
            "decision classified"
        );

        let compliance = self.compliance_section(&validation, &risk);
        let emergency = self.emergency_readiness(input.checklist, &risk);
        let action_items = self.action_items(decision, &compliance, &emergency, &prediction);

        FinalReport {
            metadata: self.metadata(input.checklist, now),
            executive_summary: ExecutiveSummary {
                decision,
                urgency_level: decision.urgency(),
                overall_risk_level: risk.overall_risk_level().to_string(),
                key_findings: key_findings(&validation, &inputs),
                action_required: decision != Decision::Go,
            },
            quality_metrics: QualityMetrics {
                data_quality_score: inputs.quality_score,
                risk_assessment_confidence: if risk.hazards.is_empty() {
                    "Low".to_string()
                } else {
                    "High".to_string()
                },
                prediction_confidence: prediction
                    .incident_prediction
                    .confidence
                    .clone()
                    .unwrap_or_else(|| "Medium".to_string()),
                completeness: format!("{:.0}%", inputs.quality_score * 10.0),
            },
            hazard_analysis: HazardAnalysis {
                safety_categories: safety_categories(&risk.hazards),
                identified_hazards: risk.hazards,
                top_threats: risk.top_threats,
                weather_impact: risk
                    .weather_impact
                    .unwrap_or_else(|| "No significant weather impact identified".to_string()),
            },
            incident_prediction: IncidentPredictionSection {
                predicted_incident: prediction.incident_prediction,
                causal_chain: prediction.causal_chain,
                leading_indicators: prediction.leading_indicators,
                interventions: prediction.interventions,
            },
            compliance_status: compliance,
            emergency_readiness: emergency,
            action_items,
        }
    }

    fn metadata(&self, checklist: &Checklist, now: DateTime<Utc>) -> ReportMetadata {
        ReportMetadata {
            report_id: report_id(checklist, now),
            generated_at: now,
            project_name: non_blank(&checklist.project_name, "Unnamed Project"),
            location: non_blank(&checklist.location, "Location not specified"),
            work_type: checklist.work_type_or_default().to_string(),
            supervisor: non_blank(&checklist.supervisor, "Not specified"),
        }
    }

    fn compliance_section(&self, validation: &ValidationView, risk: &RiskView) -> ComplianceSection {
        let mut gaps: Vec<ComplianceGap> = validation
            .missing_critical
            .iter()
            .map(|item| ComplianceGap {
                standard: "OSHA 1926.95".to_string(),
                requirement: item.clone(),
                severity: GapSeverity::Critical,
                action: format!("Document {} before work authorization", item),
            })
            .collect();

        for hazard in &risk.hazards {
            let severity = if hazard.risk_score() > 75.0 {
                GapSeverity::High
            } else {
                GapSeverity::Medium
            };
            let standard = hazard
                .regulatory_requirement
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "OSHA 1926".to_string());

            gaps.extend(hazard.inadequate_controls.iter().map(|control| ComplianceGap {
                standard: standard.clone(),
                requirement: control.clone(),
                severity,
                action: format!("Implement additional controls for {}", hazard.display_name()),
            }));
        }

        // Stable: equal severities keep discovery order.
        gaps.sort_by_key(|gap| gap.severity);

        let critical_issues = gaps
            .iter()
            .filter(|gap| gap.severity == GapSeverity::Critical)
            .cloned()
            .collect();

        ComplianceSection {
            overall_status: if gaps.is_empty() {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::GapsIdentified
            },
            identified_gaps: gaps,
            critical_issues,
        }
    }

    fn emergency_readiness(&self, checklist: &Checklist, risk: &RiskView) -> EmergencyReadiness {
        let provisions = scan_emergency_provisions(&checklist.searchable_text());
        let rescue_required = risk.top_hazard().is_some_and(Hazard::is_fall_related);

        let mut gaps = Vec::new();
        let rescue_capability = match (rescue_required, provisions.rescue) {
            (false, _) => RescueCapability::NotRequired,
            (true, true) => RescueCapability::Adequate,
            (true, false) => {
                gaps.push("No documented fall rescue plan".to_string());
                RescueCapability::Inadequate
            }
        };
        if !provisions.first_aid {
            gaps.push("First aid equipment not documented".to_string());
        }
        if !provisions.communication {
            gaps.push("Communication systems not documented".to_string());
        }
        if !provisions.evacuation {
            gaps.push("Evacuation plan not documented".to_string());
        }

        EmergencyReadiness {
            rescue_capability,
            first_aid: provisions.first_aid,
            communication: provisions.communication,
            evacuation_plan: provisions.evacuation,
            gaps,
        }
    }

    fn action_items(
        &self,
        decision: Decision,
        compliance: &ComplianceSection,
        emergency: &EmergencyReadiness,
        prediction: &PredictionView,
    ) -> Vec<ActionItem> {
        let mut items = Vec::new();

        match decision {
            Decision::StopWork => items.push(ActionItem {
                priority: ActionPriority::Critical,
                action: "STOP ALL WORK - Critical safety conditions identified".to_string(),
                timeframe: "Immediate".to_string(),
                responsibility: "Site supervisor".to_string(),
            }),
            Decision::NoGo => items.push(ActionItem {
                priority: ActionPriority::Critical,
                action: "Hold work authorization until high-risk conditions are resolved"
                    .to_string(),
                timeframe: "Before work authorization".to_string(),
                responsibility: "Site supervisor".to_string(),
            }),
            Decision::GoWithConditions | Decision::Go => {}
        }

        items.extend(compliance.identified_gaps.iter().map(|gap| {
            let (priority, timeframe) = match gap.severity {
                GapSeverity::Critical => (ActionPriority::Critical, "Before work authorization"),
                GapSeverity::High | GapSeverity::Medium => (ActionPriority::High, "Within 24 hours"),
            };
            ActionItem {
                priority,
                action: gap.action.clone(),
                timeframe: timeframe.to_string(),
                responsibility: "Safety manager".to_string(),
            }
        }));

        items.extend(emergency.gaps.iter().map(|gap| ActionItem {
            priority: ActionPriority::High,
            action: format!("Address emergency gap: {}", gap),
            timeframe: "Before work authorization".to_string(),
            responsibility: "Emergency coordinator".to_string(),
        }));

        items.extend(
            prediction
                .interventions
                .iter()
                .filter_map(|i| {
                    let action = i.action.as_deref()?.trim();
                    (!action.is_empty()).then(|| ActionItem {
                        priority: ActionPriority::Medium,
                        action: action.to_string(),
                        timeframe: i
                            .timeframe
                            .clone()
                            .unwrap_or_else(|| "Within 2 hours".to_string()),
                        responsibility: i
                            .responsibility
                            .clone()
                            .unwrap_or_else(|| "Site supervisor".to_string()),
                    })
                })
                .take(MAX_INTERVENTION_ACTIONS),
        );

        items
    }
}

fn key_findings(validation: &ValidationView, inputs: &DecisionInputs) -> Vec<String> {
    vec![
        format!(
            "Data quality: {} ({}/10)",
            validation.data_quality(),
            inputs.quality_score
        ),
        format!("Top risk score: {}/100", inputs.top_risk_score),
        format!(
            "Incident probability (4hrs): {:.1}%",
            inputs.incident_probability * 100.0
        ),
    ]
}

fn safety_categories(hazards: &[Hazard]) -> Vec<String> {
    let mut seen = HashSet::new();
    let categories: Vec<String> = hazards
        .iter()
        .filter_map(|h| h.category.as_deref())
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();

    if categories.is_empty() {
        vec!["general_safety".to_string()]
    } else {
        categories
    }
}

/// `JHA-<unix seconds>-<4 digits derived from the checklist>`.
fn report_id(checklist: &Checklist, now: DateTime<Utc>) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(checklist.searchable_text().as_bytes());
    format!("JHA-{}-{:04}", now.timestamp(), hasher.finish() % 10_000)
}

fn non_blank(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeatherRisk;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap()
    }

    fn checklist() -> Checklist {
        Checklist::from_json(
            r#"{
                "projectName": "Harbor Tower",
                "location": "Pier 4",
                "workType": "Steel erection",
                "supervisor": "R. Okafor",
                "responses": {
                    "fallProtection": "Harness with SRL at all edges",
                    "firstAid": "Kit in site trailer",
                    "radio": "Channel 3 for all crews"
                }
            }"#,
        )
        .unwrap()
    }

    fn validation(q: f64) -> Value {
        json!({
            "validation": {"qualityScore": q, "dataQuality": "GOOD"},
            "missingCritical": ["Rescue plan"]
        })
    }

    fn risk(top: f64) -> Value {
        json!({
            "riskSummary": {"overallRiskLevel": "HIGH"},
            "hazards": [
                {
                    "name": "Fall from steel beam",
                    "category": "Falls",
                    "riskScore": top,
                    "inadequateControls": ["Anchor points not certified"],
                    "regulatoryRequirement": "OSHA 1926.760"
                },
                {
                    "name": "Struck by swinging load",
                    "riskScore": 30,
                    "inadequateControls": ["No tag lines"]
                }
            ],
            "topThreats": ["Fall from steel beam"]
        })
    }

    fn prediction(p: f64) -> Value {
        json!({
            "incidentPrediction": {"incidentName": "Fall from height", "probabilityNext4Hours": p},
            "interventions": [
                {"action": "Certify anchors", "timeframe": "Immediate", "responsibility": "Foreman"},
                {"action": "Re-brief crew"},
                {"action": "  "},
                {"action": "Add spotter"},
                {"action": "Fourth action"}
            ]
        })
    }

    fn synthesize(q: f64, top: f64, p: f64, weather: WeatherRisk) -> FinalReport {
        let checklist = checklist();
        let weather = WeatherConditions {
            risk_level: weather,
            ..Default::default()
        };
        let (v, r, pr) = (validation(q), risk(top), prediction(p));
        Synthesizer::new().synthesize(
            &SynthesisInput {
                validation: &v,
                risk: &r,
                prediction: &pr,
                checklist: &checklist,
                weather: &weather,
            },
            now(),
        )
    }

    #[test]
    fn test_moderate_inputs_go_with_conditions() {
        let report = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        let summary = &report.executive_summary;

        assert_eq!(summary.decision, Decision::GoWithConditions);
        assert_eq!(summary.urgency_level, crate::types::Urgency::Medium);
        assert!(summary.action_required);
        assert_eq!(summary.overall_risk_level, "HIGH");
        assert_eq!(
            summary.key_findings,
            vec![
                "Data quality: GOOD (8/10)",
                "Top risk score: 60/100",
                "Incident probability (4hrs): 10.0%"
            ]
        );
    }

    #[test]
    fn test_metadata() {
        let report = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        let meta = &report.metadata;

        assert_eq!(meta.project_name, "Harbor Tower");
        assert_eq!(meta.work_type, "Steel erection");
        assert!(meta.report_id.starts_with(&format!("JHA-{}-", now().timestamp())));
        assert_eq!(meta.report_id.rsplit('-').next().unwrap().len(), 4);

        let again = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        assert_eq!(again.metadata.report_id, meta.report_id);
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let v = validation(8.0);
        let empty = json!({});
        let report = Synthesizer::new().synthesize(
            &SynthesisInput {
                validation: &v,
                risk: &empty,
                prediction: &empty,
                checklist: &Checklist::default(),
                weather: &WeatherConditions::default(),
            },
            now(),
        );

        assert_eq!(report.metadata.project_name, "Unnamed Project");
        assert_eq!(report.metadata.location, "Location not specified");
        assert_eq!(report.metadata.work_type, "General Construction");
        assert_eq!(report.metadata.supervisor, "Not specified");
        assert_eq!(report.hazard_analysis.safety_categories, vec!["general_safety"]);
        assert_eq!(report.quality_metrics.risk_assessment_confidence, "Low");
        assert_eq!(
            report.emergency_readiness.rescue_capability,
            RescueCapability::NotRequired
        );
    }

    #[test]
    fn test_compliance_gaps_ordered_by_severity() {
        let report = synthesize(8.0, 80.0, 0.1, WeatherRisk::Low);
        let gaps = &report.compliance_status.identified_gaps;

        assert_eq!(report.compliance_status.overall_status, ComplianceStatus::GapsIdentified);
        assert_eq!(gaps.len(), 3);

        assert_eq!(gaps[0].severity, GapSeverity::Critical);
        assert_eq!(gaps[0].standard, "OSHA 1926.95");
        assert_eq!(gaps[0].action, "Document Rescue plan before work authorization");

        assert_eq!(gaps[1].severity, GapSeverity::High);
        assert_eq!(gaps[1].standard, "OSHA 1926.760");
        assert_eq!(gaps[1].action, "Implement additional controls for Fall from steel beam");

        assert_eq!(gaps[2].severity, GapSeverity::Medium);
        assert_eq!(gaps[2].standard, "OSHA 1926");

        assert_eq!(report.compliance_status.critical_issues.len(), 1);
    }

    #[test]
    fn test_risk_score_at_75_is_medium_gap() {
        let report = synthesize(8.0, 75.0, 0.1, WeatherRisk::Low);
        let beam_gap = report
            .compliance_status
            .identified_gaps
            .iter()
            .find(|g| g.requirement == "Anchor points not certified")
            .unwrap();
        assert_eq!(beam_gap.severity, GapSeverity::Medium);
    }

    #[test]
    fn test_fall_rescue_flagged_only_for_fall_top_hazard() {
        let report = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        let emergency = &report.emergency_readiness;

        assert_eq!(emergency.rescue_capability, RescueCapability::Inadequate);
        assert!(emergency.first_aid);
        assert!(emergency.communication);
        assert!(!emergency.evacuation_plan);
        assert_eq!(
            emergency.gaps,
            vec!["No documented fall rescue plan", "Evacuation plan not documented"]
        );

        // With the struck-by hazard on top, rescue is not required.
        let report = synthesize(8.0, 10.0, 0.1, WeatherRisk::Low);
        assert_eq!(
            report.emergency_readiness.rescue_capability,
            RescueCapability::NotRequired
        );
        assert_eq!(report.emergency_readiness.gaps, vec!["Evacuation plan not documented"]);
    }

    #[test]
    fn test_rescue_plan_in_checklist_is_adequate() {
        let mut checklist = checklist();
        checklist
            .responses
            .insert("rescuePlan".to_string(), json!("Aerial lift on standby"));
        let (v, r, p) = (validation(8.0), risk(60.0), prediction(0.1));
        let report = Synthesizer::new().synthesize(
            &SynthesisInput {
                validation: &v,
                risk: &r,
                prediction: &p,
                checklist: &checklist,
                weather: &WeatherConditions::default(),
            },
            now(),
        );
        assert_eq!(
            report.emergency_readiness.rescue_capability,
            RescueCapability::Adequate
        );
    }

    #[test]
    fn test_action_items_order() {
        let report = synthesize(3.0, 60.0, 0.1, WeatherRisk::Low);
        let items = &report.action_items;

        assert_eq!(report.executive_summary.decision, Decision::StopWork);
        assert!(items[0].action.starts_with("STOP ALL WORK"));
        assert_eq!(items[0].timeframe, "Immediate");

        // Critical gap, then the high and medium gaps.
        assert_eq!(items[1].priority, ActionPriority::Critical);
        assert_eq!(items[1].timeframe, "Before work authorization");
        assert_eq!(items[2].priority, ActionPriority::High);
        assert_eq!(items[2].timeframe, "Within 24 hours");
        assert_eq!(items[3].priority, ActionPriority::High);

        // Two emergency gaps.
        assert!(items[4].action.starts_with("Address emergency gap"));
        assert_eq!(items[5].responsibility, "Emergency coordinator");

        // Top three non-blank interventions.
        let interventions: Vec<&ActionItem> = items[6..].iter().collect();
        assert_eq!(interventions.len(), 3);
        assert_eq!(interventions[0].action, "Certify anchors");
        assert_eq!(interventions[0].responsibility, "Foreman");
        assert_eq!(interventions[1].timeframe, "Within 2 hours");
        assert_eq!(interventions[2].action, "Add spotter");
    }

    #[test]
    fn test_no_go_adds_hold_action() {
        let report = synthesize(8.0, 80.0, 0.1, WeatherRisk::Low);
        assert_eq!(report.executive_summary.decision, Decision::NoGo);
        assert_eq!(report.action_items[0].priority, ActionPriority::Critical);
        assert!(report.action_items[0].action.starts_with("Hold work authorization"));
    }

    #[test]
    fn test_go_has_no_decision_action() {
        let report = synthesize(9.0, 20.0, 0.05, WeatherRisk::Low);
        assert_eq!(report.executive_summary.decision, Decision::Go);
        assert!(!report.executive_summary.action_required);
        assert!(!report
            .action_items
            .iter()
            .any(|i| i.action.starts_with("STOP ALL WORK") || i.action.starts_with("Hold")));
    }

    #[test]
    fn test_weather_drives_decision() {
        let report = synthesize(9.0, 20.0, 0.05, WeatherRisk::Extreme);
        assert_eq!(report.executive_summary.decision, Decision::StopWork);
    }

    #[test]
    fn test_quality_metrics_and_categories() {
        let report = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        assert_eq!(report.quality_metrics.completeness, "80%");
        assert_eq!(report.quality_metrics.risk_assessment_confidence, "High");
        assert_eq!(report.quality_metrics.prediction_confidence, "Medium");
        assert_eq!(report.hazard_analysis.safety_categories, vec!["falls"]);
        assert_eq!(
            report.hazard_analysis.weather_impact,
            "No significant weather impact identified"
        );
    }

    #[test]
    fn test_safety_categories_keep_declared_labels() {
        let hazards: Vec<Hazard> = serde_json::from_value(json!([
            {"name": "Dehydration", "category": "Heat Stress"},
            {"name": "Silica dust", "category": " Health "},
            {"name": "Heat cramps", "category": "heat stress"},
            {"name": "Unlabelled", "category": "  "},
            {"name": "No category"}
        ]))
        .unwrap();
        assert_eq!(safety_categories(&hazards), vec!["heat stress", "health"]);

        let uncategorized: Vec<Hazard> =
            serde_json::from_value(json!([{"name": "Trip hazard"}])).unwrap();
        assert_eq!(safety_categories(&uncategorized), vec!["general_safety"]);
    }

    #[test]
    fn test_report_id_digits_are_fixed_per_checklist() {
        let mut hasher = FnvHasher::default();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);

        let id = report_id(&checklist(), now());
        let mut expected = FnvHasher::default();
        expected.write(checklist().searchable_text().as_bytes());
        assert_eq!(
            id,
            format!("JHA-{}-{:04}", now().timestamp(), expected.finish() % 10_000)
        );
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = synthesize(8.0, 60.0, 0.1, WeatherRisk::Low);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["executiveSummary"]["decision"], "GO_WITH_CONDITIONS");
        assert_eq!(value["emergencyReadiness"]["rescueCapability"], "INADEQUATE");
        assert_eq!(value["complianceStatus"]["overallStatus"], "GAPS_IDENTIFIED");
        assert_eq!(value["complianceStatus"]["identifiedGaps"][0]["severity"], "Critical");
        assert_eq!(
            value["incidentPrediction"]["predictedIncident"]["probabilityNext4Hours"],
            0.1
        );
    }
}
