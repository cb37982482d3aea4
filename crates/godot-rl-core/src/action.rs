//! Action types and tuple action space flattening

use serde::{Deserialize, Serialize};

use crate::error::{GodotRlError, Result};
use crate::space::Space;

/// An action for one subspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// Discrete action index
    Discrete(i64),
    /// Continuous action vector
    Continuous(Vec<f64>),
}

impl Action {
    /// Concatenate per-subspace actions into the flat vector sent on the wire
    pub fn to_wire(actions: &[Action]) -> Vec<f64> {
        let mut out = Vec::new();
        for action in actions {
            match action {
                Action::Discrete(i) => out.push(*i as f64),
                Action::Continuous(v) => out.extend_from_slice(v),
            }
        }
        out
    }
}

/// Check that `value` names one of the `n` choices of a discrete space
pub fn discrete_index(value: f64, n: usize) -> Result<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(GodotRlError::InvalidAction(format!(
            "discrete index must be a whole number, got {}",
            value
        )));
    }
    if value < 0.0 || value >= n as f64 {
        return Err(GodotRlError::InvalidAction(format!(
            "discrete index {} out of range 0..{}",
            value, n
        )));
    }
    Ok(value as i64)
}

/// Converts a tuple action space into a single space for algorithms that
/// only handle one space type, and maps actions back.
///
/// Only tuples whose subspaces are all `Discrete(n)` with the same `n` can be
/// flattened. They are exposed as `Discrete(n)` and the chosen index is
/// copied into every slot of the tuple. Any other tuple shape is rejected.
#[derive(Debug, Clone)]
pub struct ActionSpaceProcessor {
    original: Space,
    converted: Space,
    /// Number of tuple slots each action is copied into, `None` when passing through
    slots: Option<usize>,
}

impl ActionSpaceProcessor {
    pub fn new(action_space: Space, convert: bool) -> Result<Self> {
        if !convert {
            return Ok(Self {
                converted: action_space.clone(),
                original: action_space,
                slots: None,
            });
        }

        let spaces = match &action_space {
            Space::Tuple(spaces) => spaces,
            other => {
                return Err(GodotRlError::UnsupportedSpaceShape(format!(
                    "only tuple spaces can be flattened, got {:?}",
                    other
                )));
            }
        };

        let n = match spaces.first() {
            Some(Space::Discrete { n }) => *n,
            Some(other) => {
                return Err(GodotRlError::UnsupportedSpaceShape(format!(
                    "cannot flatten subspace {:?}: only discrete tuples are supported",
                    other
                )));
            }
            None => {
                return Err(GodotRlError::UnsupportedSpaceShape(
                    "cannot flatten an empty tuple".to_string(),
                ));
            }
        };

        for space in spaces {
            match space {
                Space::Discrete { n: m } if *m == n => {}
                Space::Discrete { n: m } => {
                    return Err(GodotRlError::UnsupportedSpaceShape(format!(
                        "discrete subspaces differ in size ({} vs {})",
                        n, m
                    )));
                }
                other => {
                    return Err(GodotRlError::UnsupportedSpaceShape(format!(
                        "cannot flatten subspace {:?}: only discrete tuples are supported",
                        other
                    )));
                }
            }
        }

        Ok(Self {
            converted: Space::Discrete { n },
            slots: Some(spaces.len()),
            original: action_space,
        })
    }

    /// Space exposed to the algorithm
    pub fn action_space(&self) -> &Space {
        &self.converted
    }

    /// Space the engine declared
    pub fn original_space(&self) -> &Space {
        &self.original
    }

    /// Whether actions are rewritten before being sent
    pub fn converts(&self) -> bool {
        self.slots.is_some()
    }

    /// Map an action in the exposed space back to the engine's layout
    pub fn to_original(&self, action: &Action) -> Result<Vec<Action>> {
        let (Some(slots), Space::Discrete { n }) = (self.slots, &self.converted) else {
            return Ok(vec![action.clone()]);
        };

        let index = match action {
            Action::Discrete(i) if (0..*n as i64).contains(i) => *i,
            Action::Discrete(i) => {
                return Err(GodotRlError::InvalidAction(format!(
                    "discrete index {} out of range 0..{}",
                    i, n
                )));
            }
            Action::Continuous(v) if v.len() == 1 => discrete_index(v[0], *n)?,
            Action::Continuous(v) => {
                return Err(GodotRlError::InvalidAction(format!(
                    "expected a single discrete index, got {} values",
                    v.len()
                )));
            }
        };

        Ok(vec![Action::Discrete(index); slots])
    }
}
