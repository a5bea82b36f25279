use log::{debug, info};

use crate::{
    channel::{TEXT_CAPACITY, Transport},
    digest::salted_digest,
    error::{Result, SessionError},
    files::Credentials,
};

/// Log in on a freshly connected transport.
///
/// login -> salt -> md5(salt ++ password) -> acknowledgment
///
/// The acknowledgment is only received, never inspected. The protocol has no
/// rejection message, a server refusing the login can only hang up, which shows
/// as a network error on a later receive.
pub fn authenticate<T: Transport>(transport: &mut T, credentials: &Credentials) -> Result<()> {
    transport
        .send(credentials.login.as_bytes())
        .map_err(|e| restage(e, "sending login"))?;
    debug!("Sent login '{}'", credentials.login);

    let salt = transport
        .receive(TEXT_CAPACITY)
        .map_err(|e| restage(e, "receiving salt"))?;
    debug!("Received salt of {} bytes", salt.len());

    let digest = salted_digest(&salt, credentials.password.as_bytes());
    transport
        .send(digest.as_bytes())
        .map_err(|e| restage(e, "sending password digest"))?;

    let ack = transport
        .receive(TEXT_CAPACITY)
        .map_err(|e| restage(e, "receiving authentication acknowledgment"))?;
    info!(
        "Authenticated as '{}' (server said '{}')",
        credentials.login,
        String::from_utf8_lossy(&ack).trim_end()
    );
    Ok(())
}

/// Replace the generic transport stage with the protocol step that failed.
pub(crate) fn restage(err: SessionError, stage: &'static str) -> SessionError {
    match err {
        SessionError::Network { source, .. } => SessionError::network(stage, source),
        other => other,
    }
}
