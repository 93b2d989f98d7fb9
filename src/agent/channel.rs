use super::protocol::Frame;
use crossbeam_channel::{Receiver, TryRecvError};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

/// Malformed bytes found while decoding a drain. Reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCorruption {
    /// Byte offset of the first undecodable record within the drained buffer
    pub offset: usize,
    pub dropped_bytes: usize,
    pub reason: String,
}

impl fmt::Display for TransportCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dropped {} bytes at offset {}: {}",
            self.dropped_bytes, self.offset, self.reason
        )
    }
}

/// Result of one non-blocking drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub frames: Vec<Frame>,
    pub corruption: Option<TransportCorruption>,
    /// The sender side is gone (the agent's reader thread ended)
    pub disconnected: bool,
    pub bytes: usize,
}

/// Decodes the agent's output stream.
///
/// The agent reader thread forwards raw chunks, so a record may arrive split
/// across drains. `drain` pulls whatever is already queued, up to `max_bytes`
/// per call, never waits for more, and keeps an unterminated record for the
/// next drain. A record that stays incomplete past `max_bytes` is dropped.
pub struct FrameChannel {
    rx: Receiver<Vec<u8>>,
    // Chunks pulled past the byte budget wait here for the next drain.
    backlog: VecDeque<Vec<u8>>,
    // Start of a record whose remaining bytes have not arrived yet.
    partial: Vec<u8>,
    max_bytes: usize,
}

impl FrameChannel {
    pub fn new(rx: Receiver<Vec<u8>>, max_bytes: usize) -> Self {
        Self {
            rx,
            backlog: VecDeque::new(),
            partial: Vec::new(),
            max_bytes: max_bytes.max(1),
        }
    }

    /// Channel with no agent attached; drains are always empty.
    pub fn detached(max_bytes: usize) -> Self {
        Self::new(crossbeam_channel::never(), max_bytes)
    }

    /// Point the channel at a replacement agent. Unread output of the old agent is discarded.
    pub fn replace_receiver(&mut self, rx: Receiver<Vec<u8>>) {
        self.rx = rx;
        self.backlog.clear();
        self.partial.clear();
    }

    /// Bytes held back as the start of an incomplete record.
    pub fn pending_bytes(&self) -> usize {
        self.partial.len()
    }

    pub fn drain(&mut self) -> DrainReport {
        let mut buffer = std::mem::take(&mut self.partial);
        let carried = buffer.len();
        let mut disconnected = false;
        // A carried tail alone never stops the drain from pulling its continuation.
        while buffer.len() < self.max_bytes || buffer.len() == carried {
            if let Some(chunk) = self.backlog.pop_front() {
                buffer.extend_from_slice(&chunk);
                continue;
            }
            match self.rx.try_recv() {
                Ok(chunk) => {
                    if buffer.len() + chunk.len() > self.max_bytes && buffer.len() > carried {
                        self.backlog.push_back(chunk);
                        break;
                    }
                    buffer.extend_from_slice(&chunk);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let decoded = decode_prefix(&buffer);
        let corruption = match decoded.error {
            None => None,
            Some(err)
                if err.is_eof()
                    && !disconnected
                    && buffer.len() - decoded.stop <= self.max_bytes =>
            {
                self.partial = buffer[decoded.stop..].to_vec();
                None
            }
            Some(err) => Some(corruption_at(&buffer, decoded.stop, &err)),
        };
        DrainReport {
            frames: decoded.frames,
            corruption,
            disconnected,
            bytes: buffer.len() - carried,
        }
    }
}

struct Decoded {
    frames: Vec<Frame>,
    // Offset of the first byte that did not decode
    stop: usize,
    error: Option<serde_json::Error>,
}

fn decode_prefix(bytes: &[u8]) -> Decoded {
    let mut frames = Vec::new();
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();
    loop {
        let offset = stream.byte_offset();
        match stream.next() {
            Some(Ok(value)) => frames.push(Frame::from_value(value)),
            Some(Err(err)) => {
                return Decoded {
                    frames,
                    stop: offset,
                    error: Some(err),
                }
            }
            None => {
                return Decoded {
                    frames,
                    stop: bytes.len(),
                    error: None,
                }
            }
        }
    }
}

fn corruption_at(bytes: &[u8], offset: usize, err: &serde_json::Error) -> TransportCorruption {
    TransportCorruption {
        offset,
        dropped_bytes: bytes.len().saturating_sub(offset),
        reason: err.to_string(),
    }
}

/// Decode back-to-back JSON records. An incomplete or malformed record ends
/// decoding; it and everything after it are dropped.
pub fn decode_frames(bytes: &[u8]) -> (Vec<Frame>, Option<TransportCorruption>) {
    let decoded = decode_prefix(bytes);
    let corruption = decoded
        .error
        .map(|err| corruption_at(bytes, decoded.stop, &err));
    (decoded.frames, corruption)
}
