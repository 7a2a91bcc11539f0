//! Typed, one-directional pipes between modules.
//!
//! A pipe is a bounded crossbeam channel of [`Frame`]s with exactly one
//! producer and one consumer. Fan-out is done by the output port, which owns
//! one pipe per downstream consumer.
//!
//! End-of-stream is an explicit [`Frame::End`]. A producer that is dropped
//! without sending it (because its module failed) leaves the consumer with
//! [`PipeError::Aborted`], so a clean close and an abnormal termination are
//! never confused.
//!
//! Blocking operations poll in `poll` sized slices and check the shared
//! [`CancelToken`] between slices.

use crate::pipeline::error::PipeError;
use crate::pipeline::id::PipeId;
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The payload kind carried by a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeKind {
    /// Raw byte chunks.
    Bytes,
    /// UTF-8 text chunks.
    Chars,
}

impl fmt::Display for PipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeKind::Bytes => write!(f, "bytes"),
            PipeKind::Chars => write!(f, "chars"),
        }
    }
}

/// Ties a payload type to its [`PipeKind`].
pub trait PipePayload: Send + 'static {
    const KIND: PipeKind;
}

impl PipePayload for Vec<u8> {
    const KIND: PipeKind = PipeKind::Bytes;
}

impl PipePayload for String {
    const KIND: PipeKind = PipeKind::Chars;
}

/// A unit travelling through a pipe.
#[derive(Debug)]
pub enum Frame<T> {
    Data(T),
    End,
}

/// Shared cancellation flag, checked at every suspension point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Buffer depth and poll interval shared by all pipes of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipeSettings {
    pub capacity: usize,
    pub poll: Duration,
}

impl Default for PipeSettings {
    fn default() -> Self {
        Self {
            capacity: 64,
            poll: Duration::from_millis(50),
        }
    }
}

/// Result of sending one chunk down a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The consumer dropped its end. The pipe is now dead and further
    /// sends are no-ops.
    ConsumerGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Open,
    Closed,
    Dead,
}

/// Producer end of a pipe.
pub struct PipeSender<T: PipePayload> {
    id: PipeId,
    tx: Option<Sender<Frame<T>>>,
    state: SenderState,
    cancel: CancelToken,
    poll: Duration,
}

impl<T: PipePayload> PipeSender<T> {
    pub fn id(&self) -> PipeId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.state == SenderState::Closed
    }

    pub fn is_dead(&self) -> bool {
        self.state == SenderState::Dead
    }

    /// Send a chunk, blocking while the buffer is full.
    pub fn send(&mut self, item: T) -> Result<Delivery, PipeError> {
        match self.state {
            SenderState::Closed => return Err(PipeError::Closed),
            SenderState::Dead => return Ok(Delivery::ConsumerGone),
            SenderState::Open => {}
        }
        self.send_frame(Frame::Data(item))
    }

    /// Send end-of-stream and release the channel. Returns `true` only for
    /// the call that actually delivered the signal.
    pub fn close(&mut self) -> Result<bool, PipeError> {
        if self.state != SenderState::Open {
            self.tx = None;
            return Ok(false);
        }
        let delivery = self.send_frame(Frame::End)?;
        self.tx = None;
        if self.state == SenderState::Open {
            self.state = SenderState::Closed;
        }
        Ok(delivery == Delivery::Delivered)
    }

    fn send_frame(&mut self, frame: Frame<T>) -> Result<Delivery, PipeError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(PipeError::Closed);
        };
        let mut frame = frame;
        loop {
            if self.cancel.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            match tx.send_timeout(frame, self.poll) {
                Ok(()) => return Ok(Delivery::Delivered),
                Err(SendTimeoutError::Timeout(back)) => frame = back,
                Err(SendTimeoutError::Disconnected(_)) => {
                    tracing::debug!("Pipe {:?}: consumer disconnected", self.id);
                    self.state = SenderState::Dead;
                    self.tx = None;
                    return Ok(Delivery::ConsumerGone);
                }
            }
        }
    }
}

/// Consumer end of a pipe.
pub struct PipeReceiver<T: PipePayload> {
    id: PipeId,
    rx: Receiver<Frame<T>>,
    finished: bool,
    cancel: CancelToken,
    poll: Duration,
}

impl<T: PipePayload> PipeReceiver<T> {
    pub fn id(&self) -> PipeId {
        self.id
    }

    /// Whether end-of-stream has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next chunk, or `None` once the producer closed the pipe.
    ///
    /// Blocks until data arrives, the pipe is closed, the producer vanishes
    /// (`Aborted`) or the pipeline is cancelled (`Cancelled`).
    pub fn recv(&mut self) -> Result<Option<T>, PipeError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.cancel.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            match self.rx.recv_timeout(self.poll) {
                Ok(Frame::Data(item)) => return Ok(Some(item)),
                Ok(Frame::End) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(PipeError::Aborted),
            }
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn pipe<T: PipePayload>(
    id: PipeId,
    settings: PipeSettings,
    cancel: CancelToken,
) -> (PipeSender<T>, PipeReceiver<T>) {
    let (tx, rx) = bounded(settings.capacity.max(1));
    let sender = PipeSender {
        id,
        tx: Some(tx),
        state: SenderState::Open,
        cancel: cancel.clone(),
        poll: settings.poll,
    };
    let receiver = PipeReceiver {
        id,
        rx,
        finished: false,
        cancel,
        poll: settings.poll,
    };
    (sender, receiver)
}

/// Producer end of either kind, as held by an output port.
pub enum AnySender {
    Bytes(PipeSender<Vec<u8>>),
    Chars(PipeSender<String>),
}

impl AnySender {
    pub fn kind(&self) -> PipeKind {
        match self {
            AnySender::Bytes(_) => PipeKind::Bytes,
            AnySender::Chars(_) => PipeKind::Chars,
        }
    }

    pub fn id(&self) -> PipeId {
        match self {
            AnySender::Bytes(s) => s.id(),
            AnySender::Chars(s) => s.id(),
        }
    }

    pub fn is_dead(&self) -> bool {
        match self {
            AnySender::Bytes(s) => s.is_dead(),
            AnySender::Chars(s) => s.is_dead(),
        }
    }

    pub fn close(&mut self) -> Result<bool, PipeError> {
        match self {
            AnySender::Bytes(s) => s.close(),
            AnySender::Chars(s) => s.close(),
        }
    }
}

/// Consumer end of either kind, as held by an input port.
pub enum AnyReceiver {
    Bytes(PipeReceiver<Vec<u8>>),
    Chars(PipeReceiver<String>),
}

impl AnyReceiver {
    pub fn kind(&self) -> PipeKind {
        match self {
            AnyReceiver::Bytes(_) => PipeKind::Bytes,
            AnyReceiver::Chars(_) => PipeKind::Chars,
        }
    }

    pub fn id(&self) -> PipeId {
        match self {
            AnyReceiver::Bytes(r) => r.id(),
            AnyReceiver::Chars(r) => r.id(),
        }
    }
}

/// Open a pipe of the given kind.
pub fn open_pipe(
    id: PipeId,
    kind: PipeKind,
    settings: PipeSettings,
    cancel: CancelToken,
) -> (AnySender, AnyReceiver) {
    match kind {
        PipeKind::Bytes => {
            let (tx, rx) = pipe::<Vec<u8>>(id, settings, cancel);
            (AnySender::Bytes(tx), AnyReceiver::Bytes(rx))
        }
        PipeKind::Chars => {
            let (tx, rx) = pipe::<String>(id, settings, cancel);
            (AnySender::Chars(tx), AnyReceiver::Chars(rx))
        }
    }
}

/// Streaming reader over a byte pipe with its own read cursor.
pub struct ByteReader {
    rx: PipeReceiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ByteReader {
    pub fn new(rx: PipeReceiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }

    /// Drain the stream until end-of-stream.
    pub fn read_all(&mut self) -> Result<Vec<u8>, PipeError> {
        let mut out = self.chunk.split_off(self.pos);
        self.chunk.clear();
        self.pos = 0;
        while let Some(chunk) = self.rx.recv()? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

impl io::Read for ByteReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            match self.rx.recv().map_err(io::Error::other)? {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Reader over a character pipe.
pub struct CharReader {
    rx: PipeReceiver<String>,
}

impl CharReader {
    pub fn new(rx: PipeReceiver<String>) -> Self {
        Self { rx }
    }

    pub fn next_chunk(&mut self) -> Result<Option<String>, PipeError> {
        self.rx.recv()
    }

    /// Collect the whole stream into one string.
    pub fn read_to_string(&mut self) -> Result<String, PipeError> {
        let mut out = String::new();
        while let Some(chunk) = self.rx.recv()? {
            out.push_str(&chunk);
        }
        Ok(out)
    }
}
