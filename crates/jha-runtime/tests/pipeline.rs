//! End-to-end pipeline runs against scripted adapters.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use jha_core::{Checklist, Decision, ReferenceData, Stage, WeatherConditions, FALLBACK_FINDING};
use jha_runtime::prompts::stage_marker;
use jha_runtime::{
    CapabilityRouter, ModelAdapter, PipelineInput, PipelineOrchestrator, PipelineState, Provider,
    ProviderError, ProviderRegistry, RuntimeConfig, ScriptedAdapter, ScriptedReply, StageErrorKind,
    StageOverride,
};

fn validation(quality: f64) -> Value {
    json!({
        "validation": {"qualityScore": quality, "dataQuality": "GOOD", "completeness": "90%"},
        "missingCritical": [],
        "concerns": {}
    })
}

fn risk(top: f64) -> Value {
    json!({
        "riskSummary": {"overallRiskLevel": "HIGH", "highestRiskScore": top},
        "hazards": [
            {"name": "Fall from leading edge", "category": "falls", "riskScore": top},
            {"name": "Struck by swinging load", "category": "struck_by", "riskScore": 35}
        ]
    })
}

fn prediction(probability: f64) -> Value {
    json!({
        "incidentPrediction": {
            "incidentName": "Fall from leading edge",
            "probabilityNext4Hours": probability,
            "severity": "Serious",
            "confidence": "Medium"
        },
        "interventions": [{"action": "Install guardrails", "priority": "HIGH"}]
    })
}

fn scripted(validation: Value, risk: Value, prediction: Value) -> ScriptedAdapter {
    ScriptedAdapter::new(Provider::Local, "fixture")
        .reply_for(Stage::Validation, ScriptedReply::json(&validation))
        .reply_for(Stage::RiskAssessment, ScriptedReply::json(&risk))
        .reply_for(Stage::IncidentPrediction, ScriptedReply::json(&prediction))
}

fn orchestrator(adapter: Arc<ScriptedAdapter>) -> PipelineOrchestrator {
    let router = CapabilityRouter::new(vec![adapter as Arc<dyn ModelAdapter>]).unwrap();
    PipelineOrchestrator::builder()
        .router(Arc::new(router))
        .build()
        .unwrap()
}

fn checklist(project: &str) -> Checklist {
    Checklist::from_json(&format!(
        r#"{{"projectName": "{}", "workType": "Steel erection", "responses": {{"fall_protection": "Harness, no anchorage"}}}}"#,
        project
    ))
    .unwrap()
}

fn input(project: &str) -> PipelineInput {
    PipelineInput::new(checklist(project), WeatherConditions::default(), ReferenceData::default())
        .at(Utc.with_ymd_and_hms(2026, 3, 13, 14, 30, 0).unwrap())
}

#[tokio::test]
async fn test_moderate_run_is_go_with_conditions() {
    let adapter = Arc::new(scripted(validation(8.0), risk(60.0), prediction(0.1)));
    let result = orchestrator(adapter.clone()).run(input("Harbor Tower")).await;

    assert!(!result.fallback, "{:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(result.state, PipelineState::Done);
    assert_eq!(result.decision(), Decision::GoWithConditions);

    let stages: Vec<Stage> = result.stage_outputs.keys().copied().collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    assert_eq!(result.stage_outputs[&Stage::Validation]["validation"]["qualityScore"], 8.0);

    let report = result.final_report.as_complete().unwrap();
    assert_eq!(report.metadata.project_name, "Harbor Tower");
    assert_eq!(report.executive_summary.key_findings[1], "Top risk score: 60/100");

    assert_eq!(result.timing.stages.len(), 4);
    assert!(result.timing.stages.iter().all(|s| s.success));
    assert_eq!(result.timing.usage.model_calls, 3);
    assert!(result.timing.usage.total_tokens > 0);
    assert_eq!(adapter.call_count(), 3);
}

#[tokio::test]
async fn test_stages_see_earlier_outputs_only() {
    let adapter = Arc::new(scripted(validation(8.0), risk(60.0), prediction(0.1)));
    orchestrator(adapter.clone()).run(input("Harbor Tower")).await;

    let calls = adapter.calls();
    assert!(calls[0].prompt.starts_with(stage_marker(Stage::Validation)));
    assert!(!calls[0].prompt.contains("Fall from leading edge"));
    assert!(calls[1].prompt.starts_with(stage_marker(Stage::RiskAssessment)));
    assert!(calls[1].prompt.contains("Quality: GOOD (8/10)"));
    assert!(!calls[1].prompt.contains("probabilityNext4Hours"));
    assert!(!calls[1].prompt.contains("Install guardrails"));
    assert!(calls[2].prompt.starts_with(stage_marker(Stage::IncidentPrediction)));
    assert!(calls[2].prompt.contains("Fall from leading edge"));
    assert!(calls[2].prompt.contains("2026-03-13 14:30 UTC (Friday)"));
}

#[tokio::test]
async fn test_every_stage_failing_falls_back() {
    let adapter = Arc::new(
        ScriptedAdapter::new(Provider::Local, "broken")
            .default_reply(ScriptedReply::error(ProviderError::HttpError("connection reset".into()))),
    );
    let result = orchestrator(adapter.clone()).run(input("Harbor Tower")).await;

    assert!(result.fallback);
    assert_eq!(result.state, PipelineState::Failed);
    assert_eq!(result.decision(), Decision::StopWork);
    assert_ne!(result.decision(), Decision::Go);
    assert!(result.stage_outputs.is_empty());

    let error = result.error.as_deref().unwrap();
    assert!(error.starts_with("validation stage failed"), "{}", error);
    assert!(error.contains("connection reset"));
    assert_eq!(
        result.final_report.executive_summary().key_findings,
        vec![FALLBACK_FINDING.to_string()]
    );

    assert_eq!(result.timing.stages.len(), 1);
    assert_eq!(result.timing.stages[0].error_kind, Some(StageErrorKind::Provider));
    assert_eq!(adapter.call_count(), 1);
}

#[tokio::test]
async fn test_unparseable_middle_stage_discards_partial_outputs() {
    let adapter = Arc::new(
        ScriptedAdapter::new(Provider::Local, "fixture")
            .reply_for(Stage::Validation, ScriptedReply::json(&validation(9.0)))
            .reply_for(Stage::RiskAssessment, ScriptedReply::text("Risk looks moderate overall.")),
    );
    let result = orchestrator(adapter.clone()).run(input("Harbor Tower")).await;

    assert!(result.fallback);
    assert!(result.stage_outputs.is_empty());
    assert!(result.error.unwrap().starts_with("risk_assessment stage failed"));

    let outcomes: Vec<(Stage, bool)> = result.timing.stages.iter().map(|s| (s.stage, s.success)).collect();
    assert_eq!(
        outcomes,
        vec![(Stage::Validation, true), (Stage::RiskAssessment, false)]
    );
    assert_eq!(result.timing.stages[1].error_kind, Some(StageErrorKind::Parse));
    assert_eq!(adapter.call_count(), 2);
}

#[tokio::test]
async fn test_schema_violation_falls_back() {
    let adapter = Arc::new(scripted(
        validation(8.0),
        json!({"riskSummary": {"overallRiskLevel": "LOW"}}),
        prediction(0.1),
    ));
    let result = orchestrator(adapter).run(input("Harbor Tower")).await;

    assert!(result.fallback);
    assert_eq!(result.timing.stages[1].error_kind, Some(StageErrorKind::Validation));
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout_falls_back() {
    let adapter = Arc::new(
        ScriptedAdapter::new(Provider::Local, "slow")
            .reply_for(Stage::Validation, ScriptedReply::json(&validation(8.0)))
            .reply_for(Stage::RiskAssessment, ScriptedReply::json(&risk(60.0)))
            .reply_for(
                Stage::IncidentPrediction,
                ScriptedReply::json(&prediction(0.1)).delayed(Duration::from_secs(300)),
            ),
    );
    let router = CapabilityRouter::new(vec![adapter as Arc<dyn ModelAdapter>]).unwrap();
    let orchestrator = PipelineOrchestrator::builder()
        .router(Arc::new(router))
        .default_timeout(Duration::from_secs(30))
        .build()
        .unwrap();

    let result = orchestrator.run(input("Harbor Tower")).await;

    assert!(result.fallback);
    assert_eq!(result.decision(), Decision::StopWork);
    assert!(result.error.unwrap().contains("Timeout after 30s"));
    assert_eq!(result.timing.stages[2].error_kind, Some(StageErrorKind::Timeout));
    assert_eq!(result.timing.stages[2].model.as_deref(), Some("slow"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_stage_falls_back() {
    let adapter = Arc::new(
        ScriptedAdapter::new(Provider::Local, "fixture")
            .reply_for(Stage::Validation, ScriptedReply::json(&validation(8.0)))
            .reply_for(
                Stage::RiskAssessment,
                ScriptedReply::json(&risk(60.0)).delayed(Duration::from_secs(60)),
            ),
    );
    let orchestrator = orchestrator(adapter);
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(
        orchestrator.run_pipeline_cancellable(input("Harbor Tower"), &cancel),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        }
    );

    assert!(result.fallback);
    assert_eq!(result.state, PipelineState::Failed);
    assert_eq!(result.error.as_deref(), Some("pipeline run cancelled"));
    assert!(result.stage_outputs.is_empty());
    assert_eq!(result.timing.stages.len(), 2);
    assert_eq!(result.timing.stages[1].error_kind, Some(StageErrorKind::Cancelled));
}

#[tokio::test]
async fn test_run_many_preserves_input_order() {
    let adapter = Arc::new(scripted(validation(8.0), risk(60.0), prediction(0.1)));
    let orchestrator = orchestrator(adapter.clone());

    let projects = ["North Pier", "Harbor Tower", "Depot 7", "Substation B"];
    let inputs = projects.iter().map(|p| input(p)).collect();
    let results = orchestrator.run_many(inputs, 2).await;

    let names: Vec<&str> = results
        .iter()
        .map(|r| r.final_report.as_complete().unwrap().metadata.project_name.as_str())
        .collect();
    assert_eq!(names, projects.to_vec());
    assert_eq!(adapter.call_count(), 12);
}

#[tokio::test]
async fn test_override_store_shapes_calls() {
    let adapter = Arc::new(scripted(validation(8.0), risk(60.0), prediction(0.1)));
    let router = CapabilityRouter::new(vec![adapter.clone() as Arc<dyn ModelAdapter>]).unwrap();

    let mut overrides = BTreeMap::new();
    overrides.insert(
        Stage::Validation,
        StageOverride {
            temperature: Some(0.1),
            max_tokens: Some(1200),
            ..Default::default()
        },
    );
    let orchestrator = PipelineOrchestrator::builder()
        .router(Arc::new(router))
        .override_store(Arc::new(overrides))
        .build()
        .unwrap();

    let result = orchestrator.run(input("Harbor Tower")).await;
    assert!(!result.fallback, "{:?}", result.error);

    let calls = adapter.calls();
    assert_eq!(calls[0].temperature, 0.1);
    assert_eq!(calls[0].max_tokens, Some(1200));
    assert_eq!(calls[1].temperature, 0.7);
    assert_eq!(calls[1].max_tokens, Some(4000));
    assert_eq!(calls[2].temperature, 1.0);
    assert_eq!(calls[2].max_tokens, Some(5000));
}

#[tokio::test]
async fn test_orchestrator_from_config() {
    let yaml = format!(
        r#"
default_timeout: 45s
adapters:
  - type: scripted
    model: offline-fixture
    replies:
      validation: '{}'
      risk_assessment: '{}'
      incident_prediction: '{}'
stages:
  risk_assessment: {{ temperature: 0.5 }}
"#,
        validation(3.0),
        risk(40.0),
        prediction(0.05)
    );
    let config = RuntimeConfig::from_yaml(&yaml).unwrap();
    let orchestrator =
        PipelineOrchestrator::from_config(&config, &ProviderRegistry::with_defaults()).unwrap();

    let result = orchestrator.run_pipeline(checklist("Depot 7"), WeatherConditions::default(), ReferenceData::default()).await;

    assert!(!result.fallback, "{:?}", result.error);
    assert_eq!(result.decision(), Decision::StopWork);
    assert_eq!(result.timing.stages[0].model.as_deref(), Some("offline-fixture"));
}
