//! Environment trait

use crate::error::Result;
use crate::observation::{Observation, StepResult};
use crate::space::Space;

/// Standard RL environment interface
///
/// Implement this trait to expose an engine process to a training loop.
pub trait Environment {
    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Observation>;

    /// Apply an action and advance by one step
    fn step(&mut self, action: &[f64]) -> Result<StepResult>;

    /// Release the underlying resources. Calling twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Space of observations returned by `reset` and `step`
    fn observation_space(&self) -> &Space;

    /// Space of actions accepted by `step`
    fn action_space(&self) -> &Space;
}
