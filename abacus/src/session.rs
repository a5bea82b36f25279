use std::{fmt::Display, io, io::Write};

use log::{debug, error, info};

use crate::{
    SessionParams,
    auth::authenticate,
    channel::{Channel, Transport},
    error::{Result, SessionError},
    files::{Credentials, ResultSink, VectorBatch},
    stream::stream_batch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticating,
    Authenticated,
    Streaming,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    fn order(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connected => 1,
            Self::Authenticating => 2,
            Self::Authenticated => 3,
            Self::Streaming => 4,
            Self::Closed | Self::Failed => 5,
        }
    }

    /// Transitions only move forward, `Failed` is reachable from every live state.
    pub fn can_advance_to(&self, next: SessionState) -> bool {
        !self.is_terminal() && (next == Self::Failed || next.order() > self.order())
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One login plus one batch over one connection.
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    state: SessionState,
}

impl Session<Channel> {
    pub fn connect(address: &str, port: i32) -> Result<Self> {
        debug!("Connecting to {address}:{port}");
        let channel = Channel::connect(address, port).inspect_err(|e| {
            error!("Could not connect to {address}:{port}: {e}");
        })?;
        info!("Connected to {}", channel.peer());
        Ok(Self::new(channel))
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {} -> {next}",
            self.state
        );
        debug!("Session {} -> {next}", self.state);
        self.state = next;
    }

    /// Authenticate, open the sink, stream the batch, close.
    ///
    /// `open_sink` runs only after a successful login, so a rejected session never
    /// creates the result file. Whatever happens the transport is closed before
    /// this returns, and on failure before the error is handed back.
    pub fn execute<W, F>(
        &mut self,
        credentials: &Credentials,
        batch: &VectorBatch,
        open_sink: F,
    ) -> Result<Vec<f64>>
    where
        W: Write,
        F: FnOnce() -> Result<ResultSink<W>>,
    {
        if self.state != SessionState::Connected {
            return Err(SessionError::network(
                "starting session",
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    format!("session is {}", self.state),
                ),
            ));
        }

        match self.drive(credentials, batch, open_sink) {
            Ok(results) => {
                self.transport.close();
                self.advance(SessionState::Closed);
                info!("Session complete, {} results", results.len());
                Ok(results)
            }
            Err(e) => {
                self.transport.close();
                error!("Session failed while {}: {e}", self.state);
                self.advance(SessionState::Failed);
                Err(e)
            }
        }
    }

    fn drive<W, F>(
        &mut self,
        credentials: &Credentials,
        batch: &VectorBatch,
        open_sink: F,
    ) -> Result<Vec<f64>>
    where
        W: Write,
        F: FnOnce() -> Result<ResultSink<W>>,
    {
        self.advance(SessionState::Authenticating);
        authenticate(&mut self.transport, credentials)?;
        self.advance(SessionState::Authenticated);

        let mut sink = open_sink()?;
        self.advance(SessionState::Streaming);
        stream_batch(&mut self.transport, batch, &mut sink)
    }
}

/// Full client run: read both input files, connect, log in, stream, close.
///
/// `on_result` sees every result right after it was written to the result file.
pub fn run<F>(params: &SessionParams, on_result: F) -> Result<Vec<f64>>
where
    F: FnMut(usize, f64) + 'static,
{
    let credentials = Credentials::load(&params.data)?;
    let batch = VectorBatch::load(&params.input)?;
    info!(
        "Loaded {} vectors for '{}' from {}",
        batch.len(),
        credentials.login,
        params.input.display()
    );

    let mut session = Session::connect(&params.address, params.port)?;
    session.execute(&credentials, &batch, || {
        Ok(ResultSink::create(&params.result)?.with_hook(on_result))
    })
}
