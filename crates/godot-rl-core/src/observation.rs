//! Observation types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Key holding the primary observation in structured observations
pub const OBS_KEY: &str = "obs";

/// Agent observation (engine-specific contents)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observation {
    /// Raw vector observation
    Vector(Vec<f64>),
    /// Structured observation
    Structured(HashMap<String, Value>),
    /// Anything else (nested lists, per-agent batches)
    Custom(Value),
}

impl Observation {
    /// Look up a key in a structured observation
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Observation::Structured(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for Observation {
    fn from(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Observation::Custom(value))
    }
}

/// Result of one environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    /// Episode ended
    pub terminated: bool,
    /// One entry per agent
    pub info: Vec<Value>,
}

/// Observation reply sent by the engine after an action or reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResponse {
    pub obs: Value,
    #[serde(default)]
    pub reward: f64,
    #[serde(default, alias = "terminal")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

impl ObservationResponse {
    /// Unpack into a step result, padding info to one entry per agent
    pub fn into_step_result(self, n_agents: usize) -> StepResult {
        let info = match self.info {
            Some(Value::Array(entries)) => entries,
            Some(entry) => vec![entry],
            None => vec![Value::Object(Default::default()); n_agents.max(1)],
        };

        StepResult {
            observation: Observation::from(self.obs),
            reward: self.reward,
            terminated: self.done,
            info,
        }
    }
}

/// Turn a list of maps into a map of lists
///
/// Keys are taken from the first map; maps missing a key contribute `null`.
pub fn lod_to_dol(lod: &[HashMap<String, Value>]) -> HashMap<String, Vec<Value>> {
    let Some(first) = lod.first() else {
        return HashMap::new();
    };

    first
        .keys()
        .map(|key| {
            let column = lod
                .iter()
                .map(|dict| dict.get(key).cloned().unwrap_or(Value::Null))
                .collect();
            (key.clone(), column)
        })
        .collect()
}

/// Turn a map of lists into a list of maps, truncated to the shortest list
pub fn dol_to_lod(dol: &HashMap<String, Vec<Value>>) -> Vec<HashMap<String, Value>> {
    let len = dol.values().map(Vec::len).min().unwrap_or(0);

    (0..len)
        .map(|i| {
            dol.iter()
                .map(|(key, column)| (key.clone(), column[i].clone()))
                .collect()
        })
        .collect()
}
