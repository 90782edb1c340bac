// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `MultipartParser` consumes a delimited byte source and yields a lazy
//! sequence of parts:
//!
//! ```text
//! CRLF 1*( "--" boundary CRLF part-head CRLF part-body ) "--" boundary "--" CRLF
//! ```
//!
//! A synthetic leading CRLF is injected so the grammar is uniform whether
//! or not the origin has a preamble. The delimiter handed to
//! [`DelimitedByteSource`] is `"\r\n--" + boundary`; each boundary
//! sentinel is followed by either `"--"` (closing, epilogue follows) or
//! `CRLF` (another part's head follows). The current part's body is a
//! synthetic `ByteSource` reading the shared delimited source until the
//! next boundary sentinel, at which point it surfaces `End`; requesting
//! the next part first drains whatever the caller left unread of the
//! current one.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::http::header_map::HeaderMap;
use crate::http::headparse::{parse_header_block, HeaderLimits};
use crate::io::delimited::{DelimitedByteSource, DelimitedItem};
use crate::io::pushback::PushbackByteSource;
use crate::io::source::ByteSource;

/// Prepends a synthetic `"\r\n"` to `inner`, so the multipart grammar
/// never has to special-case an origin without a preamble.
struct CrlfPrefixed<S> {
    prefix_remaining: &'static [u8],
    inner: S,
}

impl<S> CrlfPrefixed<S> {
    fn new(inner: S) -> Self {
        Self {
            prefix_remaining: b"\r\n",
            inner,
        }
    }
}

impl<S: ByteSource> ByteSource for CrlfPrefixed<S> {
    async fn read(&mut self) -> Result<Buffer> {
        if !self.prefix_remaining.is_empty() {
            let out = self.prefix_remaining;
            self.prefix_remaining = b"";
            return Ok(Buffer::from(out));
        }
        self.inner.read().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

struct Shared<S> {
    delim: Mutex<DelimitedByteSource<CrlfPrefixed<S>>>,
    pending: Mutex<Option<Buffer>>,
}

impl<S: ByteSource> Shared<S> {
    /// Yields the next literal data run or `Sentinel`, preferring any
    /// bytes a previous caller peeked and pushed back.
    async fn next_item(&self) -> Result<DelimitedItem> {
        if let Some(buf) = self.pending.lock().await.take() {
            return Ok(DelimitedItem::Data(buf));
        }
        self.delim.lock().await.next().await
    }
}

pub struct MultipartParser<S> {
    shared: Arc<Shared<S>>,
    limits: HeaderLimits,
    finished: bool,
}

/// The current part's body: reads literal bytes until the next boundary
/// sentinel, then surfaces `End` forever after.
pub struct PartBody<S> {
    shared: Arc<Shared<S>>,
    done: bool,
}

pub struct MultipartPart<S> {
    pub headers: HeaderMap,
    pub body: PushbackByteSource<PartBody<S>>,
}

impl<S: ByteSource> MultipartParser<S> {
    pub fn new(origin: S, boundary: &str, limits: HeaderLimits) -> Self {
        let delimiter = format!("\r\n--{boundary}").into_bytes();
        let delim = DelimitedByteSource::new(CrlfPrefixed::new(origin), delimiter);
        Self {
            shared: Arc::new(Shared {
                delim: Mutex::new(delim),
                pending: Mutex::new(None),
            }),
            limits,
            finished: false,
        }
    }

    /// Changes the header-block limits (field name, field value, total)
    /// applied to the *next* part parsed by [`Self::get_next_part`] or
    /// [`Self::try_get_next_part`]. Parts already returned keep whatever
    /// limits were in effect when their headers were parsed.
    pub fn set_limits(&mut self, limits: HeaderLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> HeaderLimits {
        self.limits
    }

    /// Drains whatever the previous part's body left unread, then parses
    /// the next part's headers. Returns `Ok(None)` at the closing
    /// boundary (epilogue reached).
    pub async fn get_next_part(&mut self) -> Result<MultipartPart<S>> {
        self.try_get_next_part().await?.ok_or_else(Error::end)
    }

    pub async fn try_get_next_part(&mut self) -> Result<Option<MultipartPart<S>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.shared.next_item().await {
                Ok(DelimitedItem::Data(_)) => continue,
                Ok(DelimitedItem::Sentinel) => break,
                Err(e) if e.is_end() => {
                    return Err(Error::new(
                        ErrorKind::Protocol,
                        "multipart: stream ended without a closing boundary",
                    ))
                }
                Err(e) => return Err(e),
            }
        }

        let mut prefix = Vec::new();
        while prefix.len() < 2 {
            match self.shared.next_item().await {
                Ok(DelimitedItem::Data(buf)) => prefix.extend_from_slice(&buf.to_bytes()),
                Ok(DelimitedItem::Sentinel) => {
                    return Err(Error::new(
                        ErrorKind::Protocol,
                        "multipart: empty part between consecutive boundaries",
                    ))
                }
                Err(e) if e.is_end() => {
                    return Err(Error::new(
                        ErrorKind::Protocol,
                        "multipart: stream ended right after a boundary",
                    ))
                }
                Err(e) => return Err(e),
            }
        }

        if &prefix[..2] == b"--" {
            self.finished = true;
            let _ = self.drain_epilogue().await;
            return Ok(None);
        }
        if &prefix[..2] != b"\r\n" {
            return Err(Error::new(
                ErrorKind::Protocol,
                "multipart: boundary not followed by CRLF or '--'",
            ));
        }

        let leftover = prefix[2..].to_vec();
        if !leftover.is_empty() {
            *self.shared.pending.lock().await = Some(Buffer::from(leftover));
        }

        let mut body = PushbackByteSource::new(PartBody {
            shared: self.shared.clone(),
            done: false,
        });
        let headers = parse_header_block(&mut body, &self.limits).await?;
        Ok(Some(MultipartPart { headers, body }))
    }

    async fn drain_epilogue(&self) -> Result<()> {
        loop {
            match self.shared.delim.lock().await.next().await {
                Err(e) if e.is_end() => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: ByteSource> ByteSource for PartBody<S> {
    async fn read(&mut self) -> Result<Buffer> {
        if self.done {
            return Err(Error::end());
        }
        match self.shared.next_item().await {
            Ok(DelimitedItem::Data(buf)) => Ok(buf),
            Ok(DelimitedItem::Sentinel) => {
                self.done = true;
                Err(Error::end())
            }
            Err(e) => Err(e),
        }
    }
}
