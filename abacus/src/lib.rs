pub mod auth;
pub mod channel;
pub mod digest;
pub mod error;
pub mod files;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod mock;

use std::path::PathBuf;

pub use error::{ErrorKind, SessionError};
pub use session::{Session, SessionState, run};

/// Everything one session needs, as produced by the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Vector batch file.
    pub input: PathBuf,
    /// Result file, one number per line.
    pub result: PathBuf,
    /// Credentials file (login and password).
    pub data: PathBuf,
    /// Server port. Not range checked here, the transport decides.
    pub port: i32,
    /// Server address, passed to the resolver as is.
    pub address: String,
}
