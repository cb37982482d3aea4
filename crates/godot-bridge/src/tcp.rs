//! TCP connection to the engine process
//!
//! The trainer side listens; the engine connects. Exactly one client is
//! accepted per listener and the listening socket is released right after.

use crate::frame::{DEFAULT_MAX_FRAME_LEN, IdlePolicy, decode_next, write_frame};
use crate::protocol::{Message, decode_message, decode_reply, encode_message, preview};
use godot_rl_core::{GodotRlError, Result};
use serde::de::DeserializeOwned;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default port the engine plugin connects to
pub const DEFAULT_PORT: u16 = 10008;

/// Pending connections the listening socket queues before `accept`
pub const LISTEN_BACKLOG: i32 = 1;

/// Configuration for the listening side of the bridge
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind (default: 127.0.0.1)
    pub host: String,
    /// Port to listen on (default: 10008, 0 picks a free port)
    pub port: u16,
    /// Disable Nagle's algorithm on the accepted socket
    pub nodelay: bool,
    /// Socket read timeout; each expiry counts as one idle read
    pub read_timeout: Option<Duration>,
    /// Retry policy for idle reads
    pub idle: IdlePolicy,
    /// Largest accepted frame payload
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            nodelay: true,
            read_timeout: None,
            idle: IdlePolicy::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn listen_socket(addr: &str) -> io::Result<TcpListener> {
    let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// Bound listener waiting for the engine
pub struct GodotListener {
    listener: TcpListener,
    config: ServerConfig,
}

impl GodotListener {
    /// Bind the configured address and listen with a backlog of one
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = config.addr();
        let listener = listen_socket(&addr).map_err(|source| GodotRlError::Bind {
            addr: addr.clone(),
            source,
        })?;
        info!("Listening for Godot on {}", addr);

        Ok(Self {
            listener,
            config: config.clone(),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until one engine connects, then stop listening
    pub fn accept(self) -> Result<Connection> {
        info!("Waiting for remote Godot connection");
        let (stream, peer) = self.listener.accept()?;
        info!("Connection established with {}", peer);

        if self.config.nodelay {
            stream.set_nodelay(true)?;
        }
        stream.set_read_timeout(self.config.read_timeout)?;

        Ok(Connection {
            stream: Some(stream),
            peer,
            idle: self.config.idle,
            max_frame_len: self.config.max_frame_len,
        })
    }
}

/// Bind, then block until exactly one client connects
pub fn listen_and_accept(config: &ServerConfig) -> Result<Connection> {
    GodotListener::bind(config)?.accept()
}

/// The single accepted engine connection
pub struct Connection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    idle: IdlePolicy,
    max_frame_len: usize,
}

impl Connection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| GodotRlError::ConnectionClosed("connection already closed".into()))
    }

    /// Send raw payload bytes as one frame
    pub fn send_payload(&mut self, data: &[u8]) -> Result<()> {
        debug!(
            "[Rust→Godot] len={} json={}",
            data.len(),
            preview(&String::from_utf8_lossy(data))
        );
        write_frame(self.stream()?, data)
    }

    /// Encode and send a message
    pub fn send_message(&mut self, msg: &Message) -> Result<()> {
        let data = encode_message(msg)?;
        self.send_payload(&data)
    }

    /// Block for the next frame and return its payload
    pub fn receive_payload(&mut self) -> Result<Vec<u8>> {
        let idle = self.idle.clone();
        let max_frame_len = self.max_frame_len;
        let data = decode_next(self.stream()?, &idle, max_frame_len)?;
        debug!(
            "[Godot→Rust] len={} json={}",
            data.len(),
            preview(&String::from_utf8_lossy(&data))
        );
        Ok(data)
    }

    /// Block for the next tagged message
    pub fn receive_message(&mut self) -> Result<Message> {
        decode_message(&self.receive_payload()?)
    }

    /// Block for the next untagged reply
    pub fn receive_reply<T: DeserializeOwned>(&mut self) -> Result<T> {
        decode_reply(&self.receive_payload()?)
    }

    /// Release the socket; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // Peer may already be gone
                warn!("Shutdown of connection to {} failed: {}", self.peer, e);
            }
            info!("Connection to {} closed", self.peer);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
