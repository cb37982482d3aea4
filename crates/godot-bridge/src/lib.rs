//! Bridge between RL training loops and a Godot engine process
//!
//! This crate provides:
//! - Length-prefixed framing over a byte stream
//! - Wire protocol messages (handshake, env-info, action, reset, close)
//! - A single-client TCP listener and connection
//! - The session state machine and an `Environment` implementation on top of it

pub mod env;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod tcp;

pub use env::GodotEnv;
pub use protocol::{MAJOR_VERSION, MINOR_VERSION, Message, decode_message, encode_message};
pub use session::{ResetMode, Session, SessionConfig, SessionState};
pub use tcp::{Connection, DEFAULT_PORT, GodotListener, ServerConfig, listen_and_accept};
