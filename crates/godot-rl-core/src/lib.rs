//! # godot-rl-core
//!
//! Core types and traits for Godot RL environments.
//!
//! This crate provides the foundational types shared by the bridge and its callers:
//! - Error taxonomy
//! - Observation/action spaces and env-info metadata
//! - Actions and tuple action space flattening
//! - The `Environment` trait and wrappers
//! - Engine path helpers

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod path;
pub mod space;
pub mod wrappers;

pub use action::{Action, ActionSpaceProcessor, discrete_index};
pub use environment::Environment;
pub use error::{GodotRlError, Result};
pub use observation::{Observation, ObservationResponse, StepResult, dol_to_lod, lod_to_dol};
pub use path::convert_macos_path;
pub use space::{ActionType, EnvInfo, Space};
pub use wrappers::SingleObsEnv;
