//! Wire protocol for Rust <-> Godot communication
//!
//! Messages are JSON with an internally-tagged `type` field:
//! `{"type": "handshake", "major_version": "0", "minor_version": "1"}`.
//! Engine replies (env-info, observations) carry no tag and are decoded
//! against the shape the current request expects.

use godot_rl_core::{GodotRlError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Protocol major version; peers must agree on it
pub const MAJOR_VERSION: &str = "0";
/// Protocol minor version
pub const MINOR_VERSION: &str = "1";

/// Tagged messages exchanged with the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Protocol version announcement
    Handshake {
        major_version: String,
        minor_version: String,
    },

    /// Request for environment metadata
    EnvInfo,

    /// Action for the current step
    Action { action: Vec<f64> },

    /// Start a new episode
    Reset,

    /// Session is ending
    Close,
}

impl Message {
    /// Handshake carrying this crate's protocol version
    pub fn handshake() -> Self {
        Message::Handshake {
            major_version: MAJOR_VERSION.into(),
            minor_version: MINOR_VERSION.into(),
        }
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "handshake",
            Message::EnvInfo => "env_info",
            Message::Action { .. } => "action",
            Message::Reset => "reset",
            Message::Close => "close",
        }
    }
}

/// Serialize a message to JSON bytes
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a tagged message, failing on a missing or unknown `type`
pub fn decode_message(payload: &[u8]) -> Result<Message> {
    let text = utf8(payload)?;
    serde_json::from_str(text)
        .map_err(|e| GodotRlError::MalformedMessage(format!("{}: {}", e, preview(text))))
}

/// Deserialize an untagged engine reply
pub fn decode_reply<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let text = utf8(payload)?;
    serde_json::from_str(text)
        .map_err(|e| GodotRlError::MalformedMessage(format!("{}: {}", e, preview(text))))
}

/// Peek at the `type` field of a payload without decoding the rest
pub fn message_type(payload: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Tag {
        #[serde(rename = "type")]
        kind: Option<String>,
    }

    serde_json::from_slice::<Tag>(payload).ok()?.kind
}

/// First 200 characters of a payload, for logs and errors
pub fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

fn utf8(payload: &[u8]) -> Result<&str> {
    std::str::from_utf8(payload)
        .map_err(|e| GodotRlError::MalformedMessage(format!("payload is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use godot_rl_core::{EnvInfo, ObservationResponse};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn arb_message() -> impl Strategy<Value = Message> {
        let finite = prop::num::f64::NORMAL | prop::num::f64::ZERO;
        prop_oneof![
            (any::<String>(), any::<String>()).prop_map(|(major_version, minor_version)| {
                Message::Handshake {
                    major_version,
                    minor_version,
                }
            }),
            Just(Message::EnvInfo),
            prop::collection::vec(finite, 0..32).prop_map(|action| Message::Action { action }),
            Just(Message::Reset),
            Just(Message::Close),
        ]
    }

    #[test]
    fn test_roundtrip() {
        let messages = vec![
            Message::handshake(),
            Message::EnvInfo,
            Message::Action {
                action: vec![0.5, -0.3],
            },
            Message::Reset,
            Message::Close,
        ];

        for msg in messages {
            let bytes = encode_message(&msg).unwrap();
            assert_eq!(decode_message(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn test_handshake_format() {
        let bytes = encode_message(&Message::handshake()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"type": "handshake", "major_version": "0", "minor_version": "1"})
        );
    }

    #[test]
    fn test_action_format() {
        let msg = Message::Action {
            action: vec![0.5, -0.3],
        };
        let bytes = encode_message(&msg).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"type": "action", "action": [0.5, -0.3]}));
        assert_eq!(msg.kind(), "action");
    }

    #[test]
    fn test_env_info_request_format() {
        let bytes = encode_message(&Message::EnvInfo).unwrap();
        assert_eq!(bytes, br#"{"type":"env_info"}"#);
    }

    #[test]
    fn test_malformed_messages() {
        let payloads: [&[u8]; 5] = [
            b"not json",
            br#"{"major_version": "0"}"#,
            br#"{"type": "teleport"}"#,
            br#"{"type": "action"}"#,
            &[0xff, 0xfe, 0x00],
        ];
        for payload in payloads {
            assert!(
                matches!(decode_message(payload), Err(GodotRlError::MalformedMessage(_))),
                "expected {:?} to be rejected",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_decode_replies() {
        let info: EnvInfo = decode_reply(
            br#"{"observation_space": [4], "action_space": [2], "action_type": "continuous", "n_agents": 1}"#,
        )
        .unwrap();
        assert_eq!(info.n_agents, 1);

        let obs: ObservationResponse =
            decode_reply(br#"{"obs": [1.0, 2.0], "reward": 0.5, "done": false}"#).unwrap();
        assert_eq!(obs.reward, 0.5);

        let err = decode_reply::<ObservationResponse>(br#"{"reward": 0.5}"#).unwrap_err();
        assert!(matches!(err, GodotRlError::MalformedMessage(_)));
    }

    #[test]
    fn test_message_type_peek() {
        assert_eq!(
            message_type(br#"{"type": "handshake", "major_version": "0"}"#).as_deref(),
            Some("handshake")
        );
        assert_eq!(message_type(br#"{"obs": []}"#), None);
        assert_eq!(message_type(b"[1, 2]"), None);
    }

    proptest! {
        #[test]
        fn prop_message_roundtrip(msg in arb_message()) {
            let bytes = encode_message(&msg).unwrap();
            prop_assert_eq!(decode_message(&bytes).unwrap(), msg);
        }
    }
}
