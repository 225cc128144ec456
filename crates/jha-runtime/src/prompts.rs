//! Stage prompts for the model-backed stages.
//!
//! Every prompt is plain string construction over the run inputs, upstream
//! outputs and the static reference in [`jha_core::reference`]. Templates
//! use `{name}` placeholders, filled in a single pass so that text inside
//! a substituted value is never expanded again.
//!
//! Each prompt opens with its [`stage_marker`] line.

use chrono::{DateTime, Utc};
use serde_json::Value;

use jha_core::reference::{
    trade_specific_fields, weather_multipliers, FATAL_FOUR, HIGH_RISK_PERIODS,
    UNIVERSAL_CRITICAL_FIELDS,
};
use jha_core::synthesis::views::{RiskView, ValidationView};
use jha_core::{Checklist, FatalFour, ReferenceData, Stage, WeatherConditions};

/// Heading the prompt for `stage` starts with.
pub fn stage_marker(stage: Stage) -> &'static str {
    match stage {
        Stage::Validation => "## TASK: JHA CHECKLIST VALIDATION",
        Stage::RiskAssessment => "## TASK: QUANTITATIVE RISK ASSESSMENT",
        Stage::IncidentPrediction => "## TASK: INCIDENT PREDICTION",
        Stage::Synthesis => "## TASK: REPORT SYNTHESIS",
    }
}

const JSON_ONLY: &str =
    "CRITICAL: Output ONLY valid JSON. Any text outside the JSON object will cause a parsing failure.";

const VALIDATION_TEMPLATE: &str = r#"{marker}

You are a construction safety data validator with expertise in OSHA 1926 standards.
Analyze the checklist and weather data for completeness, quality and safety adequacy.

INPUT DATA:
Checklist: {checklist_data}
Weather: {weather_data}
Industry: NAICS {naics_code} ({industry_name})
Baseline Injury Rate: {injury_rate} per 100 workers

VALIDATION REQUIREMENTS:

1. CRITICAL FIELD VERIFICATION
   Universal critical fields:
{universal_fields}

   {trade_specific_fields}

2. RESPONSE QUALITY CHECK
   - Flag "No response", "N/A", "Same" and bare Yes/No answers
   - Flag responses under 3 words for critical fields
   - Flag contradictory answers, such as "no hazards" alongside PPE requirements
   - Flag generic responses ("be careful") in place of specific control measures

3. WEATHER DATA INTEGRATION
   Current conditions: {weather_summary}
   - Wind above 15 mph: wind monitoring procedures must be documented
   - Temperature below 32°F or above 95°F: temperature protection must be documented
   - Precipitation: wet weather suspension criteria must be documented
   - Poor visibility: visibility monitoring must be documented

4. TRADE-SPECIFIC VALIDATION
   Work type: {work_type}
   Apply additional scrutiny to the trade-specific fields above.

5. SCORING
   10   = all critical fields present with specific responses, weather risks addressed
   8-9  = 90%+ of critical fields present, minor brevity elsewhere
   6-7  = 70-89% of critical fields present, some generic responses
   4-5  = 50-69% of critical fields present, multiple vague responses
   1-3  = under 50% of critical fields present, insufficient for safe analysis
   0    = checklist empty or malformed

6. DATA QUALITY: EXCELLENT | GOOD | MEDIUM | POOR | UNACCEPTABLE

7. MISSING CRITICAL: list each missing or inadequate critical field
   (emergency procedures, worker qualifications, equipment and PPE, hazard
   controls, weather considerations).

8. SAFETY CONCERNS: life safety, environmental, regulatory and resource gaps.

OUTPUT FORMAT (ONLY VALID JSON):
{
  "validation": {
    "qualityScore": <0-10>,
    "dataQuality": "EXCELLENT|GOOD|MEDIUM|POOR|UNACCEPTABLE",
    "completeness": "<percentage>% complete",
    "reviewStatus": "APPROVED|CONDITIONAL|REJECTED"
  },
  "missingCritical": ["Specific missing critical field"],
  "concerns": {
    "lifeSafety": ["Fall protection plan incomplete"],
    "environmental": ["No wind monitoring procedures"],
    "regulatory": ["OSHA 1926.502 compliance gap: fall protection"],
    "resources": ["Equipment certification expired"]
  },
  "weatherIntegration": {
    "currentConditions": "Summary of weather impact on work",
    "weatherRisks": ["High wind risk for overhead work"],
    "weatherControls": ["Wind monitoring every 30 minutes"]
  },
  "recommendations": ["Complete fall protection plan before work authorization"],
  "tradeSpecificFindings": {
    "workType": "{work_type}",
    "specificGaps": ["Trade-specific gap"],
    "additionalRequirements": ["Trade-specific requirement"]
  }
}

{json_only}"#;

const RISK_TEMPLATE: &str = r#"{marker}

You are a construction risk assessor certified in OSHA 1926 standards with expertise in quantitative risk analysis.

VALIDATED DATA SUMMARY:
Quality: {data_quality} ({quality_score}/10)
Missing Critical: {missing_critical}
Key Concerns: {concerns}

FULL CHECKLIST:
{checklist_data}

OSHA INDUSTRY DATA:
Industry: {industry_name}
NAICS Code: {naics_code}
Injury Rate: {injury_rate} per 100 workers annually
Total Cases: {total_cases}
Data Source: {data_source}

WEATHER CONDITIONS:
{weather_data}

METHODOLOGY:

1. IDENTIFY THE TOP 3 SPECIFIC HAZARDS
   Be specific ("Fall from 30ft swing stage during 35mph winds", not "Fall hazard")
   and ground every hazard in the checklist content.

2. PROBABILITY (0.0 to 1.0)
   Base = injury rate {injury_rate}/100 = {base_probability}

   Hazard type multiplier:
{fatal_four_multipliers}
   - Other: ×1.0

   Control adequacy multiplier:
   - Comprehensive (3+ hierarchy levels): ×0.3
   - Adequate (2 levels): ×0.7
   - Minimal (PPE only): ×1.5
   - None identified: ×3.0

   Weather multiplier:
{weather_multipliers}

   Worker experience multiplier:
   - Expert (>5 years): ×0.6
   - Experienced (2-5 years): ×1.0
   - New (<1 year): ×2.1
   - Unknown: ×1.0

   Final probability = Base × HazardType × Controls × Weather × Experience, capped at 1.0

3. CONSEQUENCE SEVERITY
   Fatal ×10 (death likely within 30 days), Critical ×7 (hospitalization,
   amputation), Serious ×4 (days away from work), Minor ×1 (first aid only)

4. RISK SCORE (1-100)
   Risk score = (Probability × 100) × Severity multiplier, capped at 100
   95-100 EXTREME (stop work), 75-94 HIGH (additional controls),
   50-74 MEDIUM (enhanced monitoring), 25-49 LOW, 0-24 MINIMAL

5. CONTROL EVALUATION
   Elimination > Substitution > Engineering > Administrative > PPE.
   Flag PPE-only approaches, missing competent person, missing emergency
   response plan and controls not specific to the hazard.

6. STATISTICAL CONTEXT
   Cite a relevant statistic for each hazard. This trade's injury rate is
   {industry_comparison}% of the construction average.

OUTPUT FORMAT (ONLY VALID JSON):
{
  "riskSummary": {
    "overallRiskLevel": "EXTREME|HIGH|MEDIUM|LOW",
    "highestRiskScore": <number>,
    "industryContext": "Brief comparison to the {industry_name} baseline"
  },
  "hazards": [
    {
      "name": "Specific hazard with context",
      "category": "Falls|Struck-By|Electrocution|Caught-Between|Other",
      "probability": <0.0-1.0>,
      "probabilityCalculation": {
        "base": <number>,
        "hazardMultiplier": <number>,
        "controlMultiplier": <number>,
        "weatherMultiplier": <number>,
        "experienceMultiplier": <number>,
        "final": <number>
      },
      "consequence": "Fatal|Critical|Serious|Minor",
      "riskScore": <1-100>,
      "riskLevel": "EXTREME|HIGH|MEDIUM|LOW",
      "oshaContext": "OSHA statistic or regulation reference",
      "inadequateControls": ["Specific control gap"],
      "recommendedControls": ["L3-Engineering: Specific recommendation"],
      "regulatoryRequirement": "OSHA 1926.xxx citation if applicable"
    }
  ],
  "topThreats": ["Threat 1 (Risk Score: XX)"],
  "weatherImpact": "How current weather affects risk levels",
  "immediateActions": ["Action required for EXTREME or HIGH risk"]
}

{json_only}"#;

const PREDICTION_TEMPLATE: &str = r#"{marker}

You are an incident prediction specialist using the Swiss Cheese Model and Bow-Tie Analysis.
You identify latent organizational failures that combine with active errors to create incidents.

TOP IDENTIFIED RISK:
{top_hazard}

FULL CHECKLIST DATA:
{checklist_data}

TEMPORAL CONTEXT:
Current Time: {current_time}
High-Risk Periods: {high_risk_periods}
Weather Forecast (next 4 hours): {weather_forecast}

INDUSTRY INCIDENT HISTORY:
{industry_name} (NAICS {naics_code})
Common incident types: {fatal_four_shares}

TASK:
Predict the specific causal chain that leads to this incident in the NEXT 4 HOURS if conditions do not change.

FRAMEWORK:
1. Organizational influences: schedule pressure, resource constraints, safety culture, communication breakdowns
2. Unsafe supervision: competent person, oversight, training, planning failures
3. Preconditions: worker state, equipment state, environmental state
4. Unsafe act: skill-based slip, rule-based mistake, knowledge-based mistake, routine or situational violation
5. Accident sequence: the 30 seconds from unsafe act to injury
6. Defense failures: engineering, administrative and PPE barriers, with checklist quotes as evidence
7. Injury mechanism: energy type, magnitude, body part, severity, time to injury
8. Leading indicators: 5-7 conditions a supervisor can observe today
9. Interventions: immediate (30 min), short-term (2 hours), systemic (this project), long-term

OUTPUT FORMAT (ONLY VALID JSON):
{
  "incidentPrediction": {
    "incidentName": "Specific incident description with context",
    "probabilityNext4Hours": <0.0-1.0>,
    "severity": "Fatal|Critical|Serious|Minor",
    "confidence": "High|Medium|Low",
    "peakRiskTime": "Time window when risk is highest"
  },
  "causalChain": {
    "organizationalInfluences": [{"factor": "", "evidence": "", "contribution": ""}],
    "unsafeSupervision": [{"gap": "", "evidence": "", "enablement": ""}],
    "preconditions": {"workerState": [], "equipmentState": [], "environmentalState": []},
    "unsafeAct": {"type": "", "description": "", "trigger": ""},
    "defenseFailures": [{"barrier": "", "failureMode": "", "evidence": ""}]
  },
  "injuryMechanism": {
    "energyType": "Kinetic|Electrical|Thermal|Chemical|Radiation",
    "energyMagnitude": "",
    "bodyPart": "",
    "injurySeverity": "",
    "timeToInjury": ""
  },
  "leadingIndicators": [
    {"category": "Behavioral|Environmental|Organizational|Equipment", "indicator": "", "observability": "", "urgency": ""}
  ],
  "interventions": [
    {"timeframe": "Immediate (30 min)", "action": "", "effectiveness": "High|Medium|Low", "responsibility": "Site supervisor"}
  ],
  "swissCheeseAlignment": {
    "organizationalHole": "",
    "supervisionHole": "",
    "preconditionHole": "",
    "actHole": "",
    "defenseHole": ""
  },
  "riskFactors": ["Specific contributing factor"]
}

{json_only}
Include specific quotes from the checklist as evidence."#;

/// Fill `{name}` placeholders in one pass. Unknown placeholders stay verbatim.
fn render(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let key_len = after
            .find(|c: char| !(c.is_ascii_lowercase() || c == '_'))
            .unwrap_or(after.len());
        let key = &after[..key_len];

        if key_len > 0 && after[key_len..].starts_with('}') {
            if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
                out.push_str(value);
                rest = &after[key_len + 1..];
                continue;
            }
        }
        out.push('{');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn bullets(lines: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    lines
        .into_iter()
        .map(|line| format!("   - {}", line.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn category_label(category: FatalFour) -> &'static str {
    match category {
        FatalFour::Falls => "Falls",
        FatalFour::StruckBy => "Struck-By",
        FatalFour::Electrocution => "Electrocution",
        FatalFour::CaughtBetween => "Caught-Between",
        FatalFour::Other => "Other",
    }
}

fn reference_vars(reference: &ReferenceData) -> Vec<(&'static str, String)> {
    vec![
        ("industry_name", reference.industry_name.clone()),
        ("naics_code", reference.naics_code.clone()),
        ("injury_rate", reference.injury_rate.to_string()),
    ]
}

pub fn validation_prompt(
    checklist: &Checklist,
    weather: &WeatherConditions,
    reference: &ReferenceData,
) -> String {
    let work_type = checklist.work_type_or_default();
    let mut vars = vec![
        ("marker", stage_marker(Stage::Validation).to_string()),
        ("checklist_data", checklist.to_pretty_json()),
        ("weather_data", weather.to_pretty_json()),
        ("universal_fields", bullets(UNIVERSAL_CRITICAL_FIELDS)),
        ("trade_specific_fields", trade_specific_fields(work_type).to_string()),
        ("weather_summary", weather.summary()),
        ("work_type", work_type.to_string()),
        ("json_only", JSON_ONLY.to_string()),
    ];
    vars.extend(reference_vars(reference));
    render(VALIDATION_TEMPLATE, &vars)
}

pub fn risk_prompt(
    validation: &Value,
    checklist: &Checklist,
    weather: &WeatherConditions,
    reference: &ReferenceData,
) -> String {
    let view = ValidationView::from_output(validation);
    let missing = serde_json::to_string(&view.missing_critical).unwrap_or_else(|_| "[]".into());
    let concerns = if view.concerns.is_null() {
        "{}".to_string()
    } else {
        view.concerns.to_string()
    };
    let fatal_four = bullets(FATAL_FOUR.iter().map(|s| {
        format!(
            "{}: ×{} (OSHA Fatal Four: {}% of deaths)",
            s.label, s.multiplier, s.fatality_share
        )
    }));

    let mut vars = vec![
        ("marker", stage_marker(Stage::RiskAssessment).to_string()),
        ("data_quality", view.data_quality().to_string()),
        ("quality_score", view.quality_score().to_string()),
        ("missing_critical", missing),
        ("concerns", concerns),
        ("checklist_data", checklist.to_pretty_json()),
        ("total_cases", reference.total_cases.to_string()),
        ("data_source", reference.data_source.clone()),
        ("weather_data", weather.to_pretty_json()),
        ("base_probability", reference.base_probability().to_string()),
        ("fatal_four_multipliers", fatal_four),
        ("weather_multipliers", bullets(weather_multipliers(weather))),
        ("industry_comparison", reference.industry_comparison().to_string()),
        ("json_only", JSON_ONLY.to_string()),
    ];
    vars.extend(reference_vars(reference));
    render(RISK_TEMPLATE, &vars)
}

pub fn prediction_prompt(
    risk: &Value,
    checklist: &Checklist,
    weather: &WeatherConditions,
    reference: &ReferenceData,
    current_time: DateTime<Utc>,
) -> String {
    let view = RiskView::from_output(risk);
    let top_hazard = view
        .top_hazard()
        .and_then(|h| serde_json::to_string_pretty(h).ok())
        .unwrap_or_else(|| "{}".to_string());
    let shares = FATAL_FOUR
        .iter()
        .map(|s| format!("{} ({}%)", category_label(s.category), s.fatality_share))
        .collect::<Vec<_>>()
        .join(", ");

    let mut vars = vec![
        ("marker", stage_marker(Stage::IncidentPrediction).to_string()),
        ("top_hazard", top_hazard),
        ("checklist_data", checklist.to_pretty_json()),
        ("current_time", current_time.format("%Y-%m-%d %H:%M UTC (%A)").to_string()),
        ("high_risk_periods", HIGH_RISK_PERIODS.to_string()),
        (
            "weather_forecast",
            weather.forecast.clone().unwrap_or_else(|| "Not available".to_string()),
        ),
        ("fatal_four_shares", shares),
        ("json_only", JSON_ONLY.to_string()),
    ];
    vars.extend(reference_vars(reference));
    render(PREDICTION_TEMPLATE, &vars)
}
