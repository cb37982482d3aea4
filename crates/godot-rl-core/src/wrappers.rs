//! Environment wrappers

use crate::environment::Environment;
use crate::error::{GodotRlError, Result};
use crate::observation::{OBS_KEY, Observation, StepResult};
use crate::space::Space;

/// Exposes only the `"obs"` entry of a structured observation, so policies
/// that expect a single observation space can be used.
pub struct SingleObsEnv<E: Environment> {
    inner: E,
    observation_space: Space,
}

impl<E: Environment> SingleObsEnv<E> {
    /// Wrap an environment whose observation space is a dict with an `"obs"` entry
    pub fn new(inner: E) -> Result<Self> {
        let observation_space = match inner.observation_space() {
            Space::Dict(entries) => entries.get(OBS_KEY).cloned(),
            _ => None,
        }
        .ok_or_else(|| {
            GodotRlError::UnsupportedSpaceShape(format!(
                "observation space has no '{}' entry: {:?}",
                OBS_KEY,
                inner.observation_space()
            ))
        })?;

        Ok(Self {
            inner,
            observation_space,
        })
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

fn extract(observation: Observation) -> Result<Observation> {
    observation
        .get(OBS_KEY)
        .cloned()
        .map(Observation::from)
        .ok_or_else(|| {
            GodotRlError::MalformedMessage(format!("observation has no '{}' key", OBS_KEY))
        })
}

impl<E: Environment> Environment for SingleObsEnv<E> {
    fn reset(&mut self) -> Result<Observation> {
        extract(self.inner.reset()?)
    }

    fn step(&mut self, action: &[f64]) -> Result<StepResult> {
        let mut result = self.inner.step(action)?;
        result.observation = extract(result.observation)?;
        Ok(result)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn action_space(&self) -> &Space {
        self.inner.action_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct ScriptedEnv {
        observation_space: Space,
        action_space: Space,
        closed: bool,
    }

    impl ScriptedEnv {
        fn new() -> Self {
            Self {
                observation_space: Space::Dict(BTreeMap::from([
                    ("obs".to_string(), Space::unbounded(vec![2])),
                    ("camera".to_string(), Space::unbounded(vec![4, 4])),
                ])),
                action_space: Space::action_box(vec![1]),
                closed: false,
            }
        }
    }

    impl Environment for ScriptedEnv {
        fn reset(&mut self) -> Result<Observation> {
            Ok(Observation::from(json!({"obs": [0.0, 0.0], "camera": [[0.0]]})))
        }

        fn step(&mut self, action: &[f64]) -> Result<StepResult> {
            Ok(StepResult {
                observation: Observation::from(json!({"obs": [action[0], 1.0]})),
                reward: 1.0,
                terminated: false,
                info: vec![json!({})],
            })
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        fn observation_space(&self) -> &Space {
            &self.observation_space
        }

        fn action_space(&self) -> &Space {
            &self.action_space
        }
    }

    #[test]
    fn test_single_obs_extraction() {
        let mut env = SingleObsEnv::new(ScriptedEnv::new()).unwrap();
        assert_eq!(env.observation_space(), &Space::unbounded(vec![2]));
        assert_eq!(env.action_space(), &Space::action_box(vec![1]));

        assert_eq!(env.reset().unwrap(), Observation::Vector(vec![0.0, 0.0]));

        let result = env.step(&[0.5]).unwrap();
        assert_eq!(result.observation, Observation::Vector(vec![0.5, 1.0]));
        assert_eq!(result.reward, 1.0);

        env.close().unwrap();
        assert!(env.into_inner().closed);
    }

    #[test]
    fn test_requires_obs_entry() {
        let mut inner = ScriptedEnv::new();
        inner.observation_space = Space::unbounded(vec![4]);
        assert!(matches!(
            SingleObsEnv::new(inner),
            Err(GodotRlError::UnsupportedSpaceShape(_))
        ));
    }
}
