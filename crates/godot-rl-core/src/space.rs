//! Observation/action spaces and the env-info metadata they are derived from

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{GodotRlError, Result};

/// Bounds of a continuous action component
pub const ACTION_LOW: f64 = -1.0;
pub const ACTION_HIGH: f64 = 1.0;

/// A space of observations or actions
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    /// Continuous box with uniform scalar bounds
    Box {
        low: f64,
        high: f64,
        shape: Vec<usize>,
    },
    /// Integer choice in `0..n`
    Discrete { n: usize },
    /// Ordered product of subspaces
    Tuple(Vec<Space>),
    /// Named subspaces
    Dict(BTreeMap<String, Space>),
}

impl Space {
    /// Unbounded box, as used for observations
    pub fn unbounded(shape: Vec<usize>) -> Self {
        Space::Box {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            shape,
        }
    }

    /// Box bounded to the continuous action range
    pub fn action_box(shape: Vec<usize>) -> Self {
        Space::Box {
            low: ACTION_LOW,
            high: ACTION_HIGH,
            shape,
        }
    }

    /// Number of scalars needed to represent one sample
    pub fn flat_dim(&self) -> usize {
        match self {
            Space::Box { shape, .. } => shape.iter().product(),
            Space::Discrete { .. } => 1,
            Space::Tuple(spaces) => spaces.iter().map(Space::flat_dim).sum(),
            Space::Dict(spaces) => spaces.values().map(Space::flat_dim).sum(),
        }
    }

    /// Build an observation space from an env-info descriptor
    ///
    /// Accepts a bare shape (`[4]`) or the plugin's keyed form
    /// (`{"obs": {"size": [4], "space": "box"}}`).
    pub fn from_observation_descriptor(descriptor: &Value) -> Result<Self> {
        if let Some(shape) = parse_shape(descriptor) {
            return Ok(Space::unbounded(shape));
        }

        let entries = descriptor.as_object().ok_or_else(|| {
            GodotRlError::UnsupportedSpaceShape(format!(
                "observation descriptor must be a shape or mapping, got {}",
                descriptor
            ))
        })?;

        let mut spaces = BTreeMap::new();
        for (key, entry) in entries {
            let shape = entry_size(key, entry)?;
            let space = match entry.get("space").and_then(Value::as_str) {
                None | Some("box") => Space::unbounded(shape),
                Some("discrete") => Space::Discrete {
                    n: single_dim(key, &shape)?,
                },
                Some(other) => {
                    return Err(GodotRlError::UnsupportedSpaceShape(format!(
                        "observation '{}' has unknown space '{}'",
                        key, other
                    )));
                }
            };
            spaces.insert(key.clone(), space);
        }

        Ok(Space::Dict(spaces))
    }

    /// Build an action space from an env-info descriptor
    ///
    /// A bare shape uses `action_type` for every component; the keyed form
    /// carries its own `action_type` per entry and becomes a tuple ordered
    /// by key.
    pub fn from_action_descriptor(descriptor: &Value, action_type: ActionType) -> Result<Self> {
        if let Some(shape) = parse_shape(descriptor) {
            return Ok(match action_type {
                ActionType::Continuous => Space::action_box(shape),
                ActionType::Discrete if shape.len() == 1 => Space::Discrete { n: shape[0] },
                ActionType::Discrete => {
                    Space::Tuple(shape.into_iter().map(|n| Space::Discrete { n }).collect())
                }
            });
        }

        let entries = descriptor.as_object().ok_or_else(|| {
            GodotRlError::UnsupportedSpaceShape(format!(
                "action descriptor must be a shape or mapping, got {}",
                descriptor
            ))
        })?;

        let mut spaces = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            let shape = entry_size(key, entry)?;
            let entry_type = match entry.get("action_type") {
                Some(v) => ActionType::deserialize(v).map_err(|e| {
                    GodotRlError::UnsupportedSpaceShape(format!("action '{}': {}", key, e))
                })?,
                None => action_type,
            };
            spaces.push(match entry_type {
                ActionType::Continuous => Space::action_box(shape),
                ActionType::Discrete => Space::Discrete {
                    n: single_dim(key, &shape)?,
                },
            });
        }

        Ok(Space::Tuple(spaces))
    }
}

fn parse_shape(value: &Value) -> Option<Vec<usize>> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| vec![n as usize]),
        Value::Array(dims) => dims
            .iter()
            .map(|d| d.as_u64().map(|d| d as usize))
            .collect(),
        _ => None,
    }
}

fn entry_size(key: &str, entry: &Value) -> Result<Vec<usize>> {
    entry
        .get("size")
        .and_then(parse_shape)
        .ok_or_else(|| {
            GodotRlError::UnsupportedSpaceShape(format!("entry '{}' has no valid size", key))
        })
}

fn single_dim(key: &str, shape: &[usize]) -> Result<usize> {
    match shape {
        [n] => Ok(*n),
        _ => Err(GodotRlError::UnsupportedSpaceShape(format!(
            "discrete entry '{}' must have one dimension, got {:?}",
            key, shape
        ))),
    }
}

/// Whether actions are continuous vectors or discrete indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    Continuous,
    Discrete,
}

/// Environment metadata sent by the engine once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvInfo {
    /// Observation space descriptor, passed through as sent
    pub observation_space: Value,
    /// Action space descriptor, passed through as sent
    pub action_space: Value,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default = "default_n_agents")]
    pub n_agents: usize,
    /// Any other keys the engine included
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_n_agents() -> usize {
    1
}

impl EnvInfo {
    /// Derived observation space
    pub fn observation_space(&self) -> Result<Space> {
        Space::from_observation_descriptor(&self.observation_space)
    }

    /// Derived action space
    pub fn action_space(&self) -> Result<Space> {
        Space::from_action_descriptor(&self.action_space, self.action_type)
    }
}
