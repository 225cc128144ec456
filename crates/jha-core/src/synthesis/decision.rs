//! Work authorization decision classifier.
//!
//! Rules are evaluated in strict priority order and the first tier that
//! matches wins:
//!
//! | Decision             | quality | top risk | incident p | weather  |
//! |----------------------|---------|----------|------------|----------|
//! | `STOP_WORK`          | < 4     | ≥ 95     | > 0.8      | EXTREME  |
//! | `NO_GO`              | < 6     | ≥ 75     | > 0.4      | HIGH     |
//! | `GO_WITH_CONDITIONS` | < 7     | ≥ 50     | > 0.2      | MEDIUM   |
//! | `GO`                 | otherwise                                  |
//!
//! These thresholds are policy, not configuration.

use serde::{Deserialize, Serialize};

use crate::types::{Decision, WeatherRisk};

/// The four signals a decision is made from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInputs {
    pub quality_score: f64,
    pub top_risk_score: f64,
    pub incident_probability: f64,
    pub weather_risk: WeatherRisk,
}

struct Tier {
    decision: Decision,
    quality_below: f64,
    risk_at_least: f64,
    probability_above: f64,
    weather: WeatherRisk,
}

const TIERS: [Tier; 3] = [
    Tier {
        decision: Decision::StopWork,
        quality_below: 4.0,
        risk_at_least: 95.0,
        probability_above: 0.8,
        weather: WeatherRisk::Extreme,
    },
    Tier {
        decision: Decision::NoGo,
        quality_below: 6.0,
        risk_at_least: 75.0,
        probability_above: 0.4,
        weather: WeatherRisk::High,
    },
    Tier {
        decision: Decision::GoWithConditions,
        quality_below: 7.0,
        risk_at_least: 50.0,
        probability_above: 0.2,
        weather: WeatherRisk::Medium,
    },
];

impl Tier {
    fn triggered_by(&self, inputs: &DecisionInputs) -> bool {
        inputs.quality_score < self.quality_below
            || inputs.top_risk_score >= self.risk_at_least
            || inputs.incident_probability > self.probability_above
            || inputs.weather_risk == self.weather
    }
}

/// Classify the inputs into a work authorization decision.
///
/// A NaN quality score is treated as 0, which stops work.
pub fn classify_decision(inputs: &DecisionInputs) -> Decision {
    let mut inputs = *inputs;
    if inputs.quality_score.is_nan() {
        inputs.quality_score = 0.0;
    }

    TIERS
        .iter()
        .find(|tier| tier.triggered_by(&inputs))
        .map(|tier| tier.decision)
        .unwrap_or(Decision::Go)
}
