use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Transport,
    InvalidUtf8,
}

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    VecDeque(VecDeque<Bytes>),
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                let Ok(chunk) = response.chunk().await else {
                    return Err(Error::Transport);
                };
                Ok(chunk)
            }
            #[cfg(test)]
            Chunks::VecDeque(vec) => {
                let chunk = vec.pop_front();
                Ok(chunk)
            }
        }
    }
}

/// A type for reading server-sent-event data payloads from a chunk
/// stream.
///
/// Events are separated by a blank line; within one event every
/// `data:` line is a payload. The `[DONE]` sentinel terminates the
/// stream without an error, and lines that are not `data:` fields are
/// ignored.
pub struct Sse {
    chunks: Chunks,
    raw: BytesMut,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            chunks,
            raw: BytesMut::new(),
            buf: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the next data payload, or `None` once the transport is
    /// exhausted or the `[DONE]` sentinel has been seen.
    pub async fn next_data(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(data) = self.pending.pop_front() {
                if data == "[DONE]" {
                    self.done = true;
                    self.pending.clear();
                    return Ok(None);
                }
                return Ok(Some(data));
            }

            if self.done {
                return Ok(None);
            }

            let Some(bytes) = self.chunks.next_chunk().await? else {
                // A trailing partial event never got its blank-line
                // terminator; the wire format says it is incomplete.
                self.done = true;
                return Ok(None);
            };
            self.raw.extend_from_slice(&bytes);
            self.drain_decoded()?;

            while let Some(idx) = self.buf.find("\n\n") {
                let event: String = self.buf.drain(..idx + 2).collect();
                for line in event.lines() {
                    let line = line.trim();
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if !data.is_empty() {
                        self.pending.push_back(data.to_owned());
                    }
                }
            }
        }
    }

    /// Moves decoded text out of the byte buffer.
    ///
    /// Transport chunks can split a multi-byte character; the bytes of
    /// an incomplete trailing code point stay buffered until the next
    /// chunk delivers the rest.
    fn drain_decoded(&mut self) -> Result<(), Error> {
        let valid = match str::from_utf8(&self.raw) {
            Ok(_) => self.raw.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidUtf8),
        };
        let complete = self.raw.split_to(valid);
        let Ok(s) = str::from_utf8(&complete) else {
            return Err(Error::InvalidUtf8);
        };
        self.buf.push_str(s);
        Ok(())
    }
}
