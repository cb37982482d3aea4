//! Environment session state machine
//!
//! `Connected → Handshaking → InfoExchanged → Ready → Closed`. The session
//! owns the engine connection exclusively; `step`/`reset` are only valid in
//! `Ready`.

use crate::protocol::{MAJOR_VERSION, MINOR_VERSION, Message, decode_message, decode_reply, message_type};
use crate::tcp::{Connection, GodotListener, ServerConfig};
use godot_rl_core::{EnvInfo, GodotRlError, Observation, ObservationResponse, Result, Space, StepResult};
use std::fmt;
use tracing::{debug, info, warn};

/// How `reset` obtains the first observation of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Send a `reset` message, then wait for the observation
    #[default]
    Request,
    /// Only wait for the observation the engine pushes on its own
    ReceiveOnly,
}

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub server: ServerConfig,
    pub reset_mode: ResetMode,
    /// Expose tuple action spaces as a single flattened space
    pub convert_action_space: bool,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Connected,
    Handshaking,
    InfoExchanged,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Connected => "connected",
            SessionState::Handshaking => "handshaking",
            SessionState::InfoExchanged => "info_exchanged",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Env-info plus the spaces derived from it
#[derive(Debug, Clone)]
struct Declared {
    info: EnvInfo,
    observation_space: Space,
    action_space: Space,
}

/// One engine connection through its whole lifecycle
pub struct Session {
    conn: Connection,
    state: SessionState,
    reset_mode: ResetMode,
    declared: Option<Declared>,
    peer_version: Option<(String, String)>,
}

impl Session {
    /// Accept the engine on an already bound listener
    pub fn accept(listener: GodotListener, config: &SessionConfig) -> Result<Self> {
        let conn = listener.accept()?;
        Ok(Self::from_connection(conn, config.reset_mode))
    }

    /// Bind the configured address and accept the engine
    pub fn listen(config: &SessionConfig) -> Result<Self> {
        Self::accept(GodotListener::bind(&config.server)?, config)
    }

    /// Wrap an accepted connection
    pub fn from_connection(conn: Connection, reset_mode: ResetMode) -> Self {
        debug!("Session {} → {}", SessionState::Uninitialized, SessionState::Connected);
        Self {
            conn,
            state: SessionState::Connected,
            reset_mode,
            declared: None,
            peer_version: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Version announced by the engine, if it sent one
    pub fn peer_version(&self) -> Option<(&str, &str)> {
        self.peer_version
            .as_ref()
            .map(|(major, minor)| (major.as_str(), minor.as_str()))
    }

    /// Env-info received during startup
    pub fn env_info(&self) -> Option<&EnvInfo> {
        self.declared.as_ref().map(|d| &d.info)
    }

    pub fn observation_space(&self) -> Option<&Space> {
        self.declared.as_ref().map(|d| &d.observation_space)
    }

    pub fn action_space(&self) -> Option<&Space> {
        self.declared.as_ref().map(|d| &d.action_space)
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} → {}", self.state, next);
        self.state = next;
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        match self.state {
            s if s == expected => Ok(()),
            SessionState::Closed => Err(GodotRlError::SessionClosed),
            s => Err(GodotRlError::NotReady {
                state: s.to_string(),
            }),
        }
    }

    /// Run the handshake and env-info exchange
    pub fn start(&mut self) -> Result<&EnvInfo> {
        self.handshake()?;
        self.exchange_env_info()
    }

    /// Announce our protocol version
    pub fn handshake(&mut self) -> Result<()> {
        self.expect_state(SessionState::Connected)?;
        self.transition(SessionState::Handshaking);
        self.conn.send_message(&Message::handshake())
    }

    /// Request env-info and cache it along with the derived spaces
    ///
    /// The engine may answer our handshake with its own before the env-info
    /// reply. A differing major version fails the session; a differing minor
    /// version is only logged.
    pub fn exchange_env_info(&mut self) -> Result<&EnvInfo> {
        self.expect_state(SessionState::Handshaking)?;
        self.conn.send_message(&Message::EnvInfo)?;

        let info: EnvInfo = loop {
            let payload = self.conn.receive_payload()?;
            match message_type(&payload).as_deref() {
                Some("handshake") => self.check_peer_version(decode_message(&payload)?)?,
                None | Some("env_info") => break decode_reply(&payload)?,
                Some(other) => {
                    return Err(GodotRlError::MalformedMessage(format!(
                        "expected env_info reply, got '{}'",
                        other
                    )));
                }
            }
        };

        let observation_space = info.observation_space()?;
        let action_space = info.action_space()?;
        info!(
            "Env info: observation_space={:?}, action_space={:?}, n_agents={}",
            observation_space, action_space, info.n_agents
        );
        self.declared = Some(Declared {
            info,
            observation_space,
            action_space,
        });
        self.transition(SessionState::InfoExchanged);
        self.transition(SessionState::Ready);

        self.env_info()
            .ok_or_else(|| GodotRlError::NotReady {
                state: self.state.to_string(),
            })
    }

    fn check_peer_version(&mut self, msg: Message) -> Result<()> {
        let (major_version, minor_version) = match msg {
            Message::Handshake {
                major_version,
                minor_version,
            } => (major_version, minor_version),
            other => {
                return Err(GodotRlError::MalformedMessage(format!(
                    "expected handshake, got '{}'",
                    other.kind()
                )));
            }
        };

        if major_version != MAJOR_VERSION {
            return Err(GodotRlError::VersionMismatch {
                expected: MAJOR_VERSION.into(),
                found: major_version,
            });
        }
        if minor_version != MINOR_VERSION {
            warn!(
                "Godot minor version {} differs from ours ({}), continuing",
                minor_version, MINOR_VERSION
            );
        }

        info!("Godot protocol version {}.{}", major_version, minor_version);
        self.peer_version = Some((major_version, minor_version));
        Ok(())
    }

    fn n_agents(&self) -> usize {
        self.declared.as_ref().map_or(1, |d| d.info.n_agents)
    }

    /// Send an action and block for the resulting observation
    pub fn step(&mut self, action: &[f64]) -> Result<StepResult> {
        self.expect_state(SessionState::Ready)?;
        self.conn.send_message(&Message::Action {
            action: action.to_vec(),
        })?;
        let response: ObservationResponse = self.conn.receive_reply()?;
        Ok(response.into_step_result(self.n_agents()))
    }

    /// Start a new episode and return its first observation
    pub fn reset(&mut self) -> Result<Observation> {
        self.expect_state(SessionState::Ready)?;
        if self.reset_mode == ResetMode::Request {
            self.conn.send_message(&Message::Reset)?;
        }
        let response: ObservationResponse = self.conn.receive_reply()?;
        Ok(Observation::from(response.obs))
    }

    /// Tell the engine we are leaving and release the connection
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.conn.send_message(&Message::Close) {
            debug!("Close notification not delivered: {}", e);
        }
        self.conn.close();
        self.transition(SessionState::Closed);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
