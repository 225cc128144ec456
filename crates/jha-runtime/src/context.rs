//! Per-run pipeline context.
//!
//! Run inputs are shared behind an `Arc`; stage outputs only grow, and each
//! addition produces a new snapshot. A stage therefore sees exactly the
//! outputs of the stages before it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use jha_core::{Checklist, ReferenceData, Stage, WeatherConditions};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInputs {
    pub checklist: Checklist,
    pub weather: WeatherConditions,
    pub reference: ReferenceData,
    pub current_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PipelineContext {
    inputs: Arc<PipelineInputs>,
    outputs: BTreeMap<Stage, Value>,
}

impl PipelineContext {
    pub fn new(inputs: PipelineInputs) -> Self {
        Self {
            inputs: Arc::new(inputs),
            outputs: BTreeMap::new(),
        }
    }

    pub fn inputs(&self) -> &PipelineInputs {
        &self.inputs
    }

    pub fn checklist(&self) -> &Checklist {
        &self.inputs.checklist
    }

    pub fn weather(&self) -> &WeatherConditions {
        &self.inputs.weather
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.inputs.reference
    }

    pub fn current_time(&self) -> DateTime<Utc> {
        self.inputs.current_time
    }

    pub fn output(&self, stage: Stage) -> Option<&Value> {
        self.outputs.get(&stage)
    }

    pub fn outputs(&self) -> &BTreeMap<Stage, Value> {
        &self.outputs
    }

    /// New snapshot with `stage`'s output added. `self` is unchanged.
    pub fn with_output(&self, stage: Stage, output: Value) -> Self {
        let mut outputs = self.outputs.clone();
        outputs.insert(stage, output);
        Self {
            inputs: Arc::clone(&self.inputs),
            outputs,
        }
    }

    pub fn into_outputs(self) -> BTreeMap<Stage, Value> {
        self.outputs
    }
}
