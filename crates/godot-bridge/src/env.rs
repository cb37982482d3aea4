//! `Environment` implementation backed by a Godot session

use crate::session::{Session, SessionConfig, SessionState};
use godot_rl_core::{
    Action, ActionSpaceProcessor, EnvInfo, Environment, GodotRlError, Observation, Result, Space,
    StepResult, discrete_index,
};
use tracing::info;

/// A ready Godot session exposed through the standard environment interface
pub struct GodotEnv {
    session: Session,
    processor: ActionSpaceProcessor,
    observation_space: Space,
}

impl GodotEnv {
    /// Listen, accept the engine, and run the startup exchange
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut session = Session::listen(&config)?;
        session.start()?;
        Self::from_session(session, config.convert_action_space)
    }

    /// Wrap a session that has completed its startup exchange
    pub fn from_session(session: Session, convert_action_space: bool) -> Result<Self> {
        let (observation_space, action_space) =
            match (session.observation_space(), session.action_space()) {
                (Some(obs), Some(act)) if session.state() == SessionState::Ready => {
                    (obs.clone(), act.clone())
                }
                _ => {
                    return Err(GodotRlError::NotReady {
                        state: session.state().to_string(),
                    });
                }
            };

        let processor = ActionSpaceProcessor::new(action_space, convert_action_space)?;
        if processor.converts() {
            info!(
                "Action space {:?} exposed as {:?}",
                processor.original_space(),
                processor.action_space()
            );
        }

        Ok(Self {
            session,
            processor,
            observation_space,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn env_info(&self) -> Option<&EnvInfo> {
        self.session.env_info()
    }

    /// Map an action in the exposed space onto the engine's wire layout
    fn to_wire(&self, action: &[f64]) -> Result<Vec<f64>> {
        if !self.processor.converts() {
            return Ok(action.to_vec());
        }

        let exposed = match (self.processor.action_space(), action) {
            (Space::Discrete { n }, [index]) => Action::Discrete(discrete_index(*index, *n)?),
            (Space::Discrete { .. }, _) => {
                return Err(GodotRlError::InvalidAction(format!(
                    "discrete action expects one index, got {} values",
                    action.len()
                )));
            }
            _ => Action::Continuous(action.to_vec()),
        };

        Ok(Action::to_wire(&self.processor.to_original(&exposed)?))
    }
}

impl Environment for GodotEnv {
    fn reset(&mut self) -> Result<Observation> {
        self.session.reset()
    }

    fn step(&mut self, action: &[f64]) -> Result<StepResult> {
        let wire = self.to_wire(action)?;
        self.session.step(&wire)
    }

    fn close(&mut self) -> Result<()> {
        self.session.close();
        Ok(())
    }

    fn observation_space(&self) -> &Space {
        &self.observation_space
    }

    fn action_space(&self) -> &Space {
        self.processor.action_space()
    }
}
