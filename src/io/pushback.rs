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

//! `PushbackByteSource` wraps a source and remembers at most one buffer set
//! aside by `unread`. `DelimitedByteSource` builds on this to
//! rewind a mid-buffer delimiter mismatch.

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::source::ByteSource;
use bytes::Buf;

pub struct PushbackByteSource<S> {
    inner: S,
    pushed: Option<Buffer>,
}

impl<S: ByteSource> PushbackByteSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pushed: None,
        }
    }

    /// Set aside `buf` to be replayed by the next `read`. Calling this twice
    /// without an intervening read is a programming error.
    pub fn unread(&mut self, buf: Buffer) -> Result<()> {
        if self.pushed.is_some() {
            return Err(Error::new(
                ErrorKind::Unexpected,
                "unread called twice without an intervening read",
            ));
        }
        self.pushed = Some(buf);
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteSource> ByteSource for PushbackByteSource<S> {
    async fn read(&mut self) -> Result<Buffer> {
        if let Some(buf) = self.pushed.take() {
            return Ok(buf);
        }
        self.inner.read().await
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        if let Some(mut buf) = self.pushed.take() {
            let avail = buf.remaining() as u64;
            if n >= avail {
                return Ok(avail + self.inner.skip(n - avail).await?);
            }
            buf.advance(n as usize);
            self.pushed = Some(buf);
            return Ok(n);
        }
        self.inner.skip(n).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
