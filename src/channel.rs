//! A communication channel used to send/receive messages to/from another party.
//!
//! Every message sent through a [`MsgChannel`] is tagged with a per-peer sequence number and the
//! protocol phase it belongs to. Both parties must issue their operations in the same order, so a
//! receiver that sees an unexpected sequence number or phase reports [`ErrorKind::OutOfOrder`]
//! instead of silently misinterpreting the payload.

use std::{fmt, future::Future, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    sync::mpsc::{Receiver, Sender, channel, error::SendError},
    time::timeout,
};
use tracing::trace;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel error during '{}': {:?}", self.phase, self.reason)
    }
}

impl std::error::Error for Error {}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be serialized (before sending it out).
    SerdeError(String),
    /// The message is a Vec, but not of the expected length.
    InvalidLength {
        /// The length the receiver expected.
        expected: usize,
        /// The length that was actually received.
        actual: usize,
    },
    /// The message does not belong to the operation the receiver is currently executing.
    OutOfOrder {
        /// Sequence number and phase the receiver expected.
        expected: (u64, String),
        /// Sequence number and phase found in the message.
        actual: (u64, String),
    },
}

/// A communication channel used to send/receive messages to/from another party.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message to the party with the given index (must be between `0..participants`).
    fn send_bytes_to(
        &mut self,
        party: usize,
        msg: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits a response from the party with the given index (must be between `0..participants`).
    fn recv_bytes_from(
        &mut self,
        party: usize,
    ) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

/// A wrapper around [`Channel`] that takes care of (de-)serializing and sequencing messages.
#[derive(Debug)]
pub struct MsgChannel<C: Channel> {
    inner: C,
    sent: Vec<u64>,
    received: Vec<u64>,
}

impl<C: Channel> MsgChannel<C> {
    /// Wraps a raw byte channel.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            sent: vec![],
            received: vec![],
        }
    }

    /// Returns the wrapped byte channel.
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn next_seq(counters: &mut Vec<u64>, party: usize) -> u64 {
        if counters.len() <= party {
            counters.resize(party + 1, 0);
        }
        let seq = counters[party];
        counters[party] += 1;
        seq
    }

    /// Serializes and sends a message to the other party.
    pub async fn send_to(
        &mut self,
        party: usize,
        phase: &str,
        msg: &impl Serialize,
    ) -> Result<(), Error> {
        let seq = Self::next_seq(&mut self.sent, party);
        let msg = bincode::serialize(&(seq, phase, msg)).map_err(|e| Error {
            phase: format!("sending {phase}"),
            reason: ErrorKind::SerdeError(format!("{e:?}")),
        })?;
        trace!(party, seq, phase, bytes = msg.len(), "send");
        self.inner.send_bytes_to(party, msg).await.map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
    }

    /// Receives and deserializes a message from the other party.
    pub async fn recv_from<T: DeserializeOwned>(
        &mut self,
        party: usize,
        phase: &str,
    ) -> Result<T, Error> {
        let seq = Self::next_seq(&mut self.received, party);
        let msg = self.inner.recv_bytes_from(party).await.map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::RecvError(format!("{e:?}")),
        })?;
        let (actual_seq, actual_phase, body): (u64, String, T) = bincode::deserialize(&msg)
            .map_err(|e| Error {
                phase: format!("receiving {phase}"),
                reason: ErrorKind::SerdeError(format!("{e:?}")),
            })?;
        if actual_seq != seq || actual_phase != phase {
            return Err(Error {
                phase: phase.to_string(),
                reason: ErrorKind::OutOfOrder {
                    expected: (seq, phase.to_string()),
                    actual: (actual_seq, actual_phase),
                },
            });
        }
        trace!(party, seq, phase, bytes = msg.len(), "recv");
        Ok(body)
    }

    /// Receives and deserializes a Vec from the other party (while checking the length).
    pub async fn recv_vec_from<T: DeserializeOwned>(
        &mut self,
        party: usize,
        phase: &str,
        len: usize,
    ) -> Result<Vec<T>, Error> {
        let v: Vec<T> = self.recv_from(party, phase).await?;
        if v.len() == len {
            Ok(v)
        } else {
            Err(Error {
                phase: phase.to_string(),
                reason: ErrorKind::InvalidLength {
                    expected: len,
                    actual: v.len(),
                },
            })
        }
    }
}

/// A simple in-memory channel using [`Sender`] and [`Receiver`].
#[derive(Debug)]
pub struct SimpleChannel {
    s: Vec<Option<Sender<Vec<u8>>>>,
    r: Vec<Option<Receiver<Vec<u8>>>>,
    bytes_sent: usize,
}

impl SimpleChannel {
    /// Creates channels for N parties to communicate with each other.
    pub fn channels(parties: usize) -> Vec<Self> {
        let buffer_capacity = 1024;
        let mut channels = vec![];
        for _ in 0..parties {
            let mut s = vec![];
            let mut r = vec![];
            for _ in 0..parties {
                s.push(None);
                r.push(None);
            }
            channels.push(SimpleChannel {
                s,
                r,
                bytes_sent: 0,
            });
        }
        for a in 0..parties {
            for b in (a + 1)..parties {
                let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
                let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
                channels[a].s[b] = Some(send_a_to_b);
                channels[b].s[a] = Some(send_b_to_a);
                channels[a].r[b] = Some(recv_b_to_a);
                channels[b].r[a] = Some(recv_a_to_b);
            }
        }
        channels
    }

    /// The total number of bytes this channel has sent so far.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }
}

/// The error raised by `send` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncSendError {
    /// There is no connection to the given party.
    UnknownParty(usize),
    /// The receiving side has been dropped.
    Closed(SendError<Vec<u8>>),
}

/// The error raised by `recv` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncRecvError {
    /// There is no connection to the given party.
    UnknownParty(usize),
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
    /// A chunk was too short to contain its header.
    MalformedChunk,
}

impl Channel for SimpleChannel {
    type SendError = AsyncSendError;
    type RecvError = AsyncRecvError;

    async fn send_bytes_to(&mut self, p: usize, msg: Vec<u8>) -> Result<(), AsyncSendError> {
        self.bytes_sent += msg.len();
        let chunk_size = 100 * 1024 * 1024;
        let mut chunks: Vec<_> = msg.chunks(chunk_size).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        let length = chunks.len();
        let sender = self
            .s
            .get(p)
            .and_then(Option::as_ref)
            .ok_or(AsyncSendError::UnknownParty(p))?;
        for (i, chunk) in chunks.into_iter().enumerate() {
            if length > 1 {
                trace!("  (sending chunk {}/{} to party {})", i + 1, length, p);
            }
            let mut msg = Vec::with_capacity(2 * 4 + chunk.len());
            msg.extend((i as u32).to_be_bytes());
            msg.extend((length as u32).to_be_bytes());
            msg.extend(chunk);
            sender.send(msg).await.map_err(AsyncSendError::Closed)?;
        }
        Ok(())
    }

    async fn recv_bytes_from(&mut self, p: usize) -> Result<Vec<u8>, AsyncRecvError> {
        let receiver = self
            .r
            .get_mut(p)
            .and_then(Option::as_mut)
            .ok_or(AsyncRecvError::UnknownParty(p))?;
        let mut msg: Vec<u8> = vec![];
        loop {
            let chunk = match timeout(Duration::from_secs(10 * 60), receiver.recv()).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return Err(AsyncRecvError::Closed),
                Err(_) => return Err(AsyncRecvError::TimeoutElapsed),
            };
            if chunk.len() < 8 {
                return Err(AsyncRecvError::MalformedChunk);
            }
            let i = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let length = u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            msg.extend(&chunk[8..]);
            if i + 1 >= length {
                break Ok(msg);
            }
        }
    }
}
