use std::{collections::VecDeque, io};

use crate::{
    channel::Transport,
    error::{Result, SessionError},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sent(Vec<u8>),
    Received(Vec<u8>),
    Closed,
}

/// Scripted transport: replies are handed out in order, every call is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub events: Vec<Event>,
    replies: VecDeque<io::Result<Vec<u8>>>,
    fail_send_at: Option<usize>,
    sends: usize,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(Ok(bytes.to_vec()));
        self
    }

    pub fn reply_f64(self, value: f64) -> Self {
        self.reply(&value.to_ne_bytes())
    }

    pub fn reply_err(mut self, kind: io::ErrorKind) -> Self {
        self.replies.push_back(Err(io::Error::from(kind)));
        self
    }

    /// Fail the send with this zero based index.
    pub fn fail_send_at(mut self, index: usize) -> Self {
        self.fail_send_at = Some(index);
        self
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Sent(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Closed).count()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(SessionError::network(
                "sending",
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        let index = self.sends;
        self.sends += 1;
        if self.fail_send_at == Some(index) {
            return Err(SessionError::network(
                "sending",
                io::Error::from(io::ErrorKind::BrokenPipe),
            ));
        }
        self.events.push(Event::Sent(bytes.to_vec()));
        Ok(())
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(SessionError::network(
                "receiving",
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::UnexpectedEof)))
            .map_err(|e| SessionError::network("receiving", e))?;
        assert!(reply.len() <= max_bytes, "scripted reply exceeds receive capacity");
        self.events.push(Event::Received(reply.clone()));
        Ok(reply)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.events.push(Event::Closed);
        }
    }
}
