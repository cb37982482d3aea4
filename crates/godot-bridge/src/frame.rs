//! Length-prefixed framing
//!
//! Frame = 4-byte little-endian payload length + payload. Readers accumulate
//! short reads until the whole frame is present. An idle socket (no data yet)
//! is waited out with backoff; end-of-stream is a disconnect and is never
//! retried.

use godot_rl_core::{GodotRlError, Result};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Size of the length prefix
pub const HEADER_LEN: usize = 4;

/// Largest payload accepted by default (64MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// How long to keep waiting on an idle socket
#[derive(Debug, Clone, PartialEq)]
pub struct IdlePolicy {
    /// Sleep after the first empty read
    pub initial_backoff: Duration,
    /// Upper bound for the doubled sleep
    pub max_backoff: Duration,
    /// Consecutive empty reads tolerated before giving up (`None` waits forever)
    pub max_idle_retries: Option<u32>,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(100),
            max_idle_retries: None,
        }
    }
}

/// Length header value for a payload of `len` bytes
pub fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| GodotRlError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

/// Prepend the length header to a payload.
///
/// The payload must be shorter than 4 GiB; `write_frame` checks this.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Write one complete frame and flush
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    frame_len(payload.len())?;
    writer
        .write_all(&encode(payload))
        .map_err(|e| classify(e, "write frame"))?;
    writer.flush().map_err(|e| classify(e, "flush"))?;
    Ok(())
}

/// Read the next complete frame and return its payload
pub fn decode_next<R: Read>(reader: &mut R, policy: &IdlePolicy, max_len: usize) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    read_full(reader, &mut header, policy, "length")?;
    let len = u32::from_le_bytes(header) as usize;

    if len > max_len {
        return Err(GodotRlError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload, policy, "payload")?;
    Ok(payload)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8], policy: &IdlePolicy, what: &str) -> Result<()> {
    let mut filled = 0;
    let mut idle_reads = 0u32;
    let mut backoff = policy.initial_backoff;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(GodotRlError::ConnectionClosed(format!(
                    "peer closed while reading {} ({}/{} bytes)",
                    what,
                    filled,
                    buf.len()
                )));
            }
            Ok(n) => {
                filled += n;
                idle_reads = 0;
                backoff = policy.initial_backoff;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                idle_reads += 1;
                if let Some(max) = policy.max_idle_retries {
                    if idle_reads > max {
                        return Err(GodotRlError::IdleTimeout { retries: max });
                    }
                }
                trace!("No data yet for {}, retrying in {:?}", what, backoff);
                thread::sleep(backoff);
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(e) => return Err(classify(e, what)),
        }
    }

    Ok(())
}

fn classify(err: std::io::Error, what: &str) -> GodotRlError {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::WriteZero
        | ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected => {
            GodotRlError::ConnectionClosed(format!("{} failed: {}", what, err))
        }
        _ => GodotRlError::Io(err),
    }
}
