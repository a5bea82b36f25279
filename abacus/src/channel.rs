use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
};

use log::{debug, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Result, SessionError};

/// Receive capacity for the textual messages of the handshake (salt, acknowledgment).
pub const TEXT_CAPACITY: usize = 1024;

/// Blocking byte pipe to the server.
///
/// Messages are not framed: a single `receive` is assumed to return exactly one
/// logical message. That holds for a server answering one request at a time on a
/// quiet link, it is not guaranteed by TCP.
pub trait Transport {
    /// Write all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// One read of at most `max_bytes`.
    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self);
}

/// Owns the TCP connection of one session.
#[derive(Debug)]
pub struct Channel {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl Channel {
    /// Resolve `address:port` and connect to the first address that accepts.
    ///
    /// The port is handed to the resolver as is, so anything outside the `u16`
    /// range fails here just like an unresolvable address does.
    pub fn connect(address: &str, port: i32) -> Result<Self> {
        let port = u16::try_from(port).map_err(|_| {
            SessionError::network(
                "resolving server address",
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("port {port} is not a valid TCP port"),
                ),
            )
        })?;

        let candidates: Vec<SocketAddr> = (address, port)
            .to_socket_addrs()
            .map_err(|e| SessionError::network("resolving server address", e))?
            .collect();

        let mut last_err = None;
        for addr in candidates {
            match Self::connect_addr(addr) {
                Ok(channel) => return Ok(channel),
                Err(e) => {
                    warn!("Could not connect to {addr}: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SessionError::network(
                "resolving server address",
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("{address} did not resolve to any address"),
                ),
            )
        }))
    }

    fn connect_addr(addr: SocketAddr) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| SessionError::network("creating socket", e))?;
        socket
            .connect(&SockAddr::from(addr))
            .map_err(|e| SessionError::network("connecting", e))?;
        debug!("Connected to {addr}");
        Ok(Self {
            stream: Some(socket.into()),
            peer: addr,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self, stage: &'static str) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            SessionError::network(stage, io::Error::from(io::ErrorKind::NotConnected))
        })
    }
}

impl Transport for Channel {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream("sending")?
            .write_all(bytes)
            .map_err(|e| SessionError::network("sending", e))
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; max_bytes];
        let n = self
            .stream("receiving")?
            .read(&mut buf)
            .map_err(|e| SessionError::network("receiving", e))?;
        if n == 0 && max_bytes > 0 {
            return Err(SessionError::network(
                "receiving",
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                ),
            ));
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // the peer may already be gone, the descriptor is released either way
                debug!("Shutdown of connection to {} failed: {e}", self.peer);
            }
            debug!("Closed connection to {}", self.peer);
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
