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

//! `RangedByteSource` presents the half-open sub-range `[min, max)` of a
//! source. Reaching `min` is done via `skip`; the underlying
//! source ending before `max` is not an error, it just yields fewer bytes.

use bytes::Buf;

use crate::buf::Buffer;
use crate::error::Result;
use crate::io::source::ByteSource;

pub struct RangedByteSource<S> {
    inner: S,
    min: u64,
    max: u64,
    position: u64,
    skipped_to_min: bool,
    pending: Option<Buffer>,
}

impl<S: ByteSource> RangedByteSource<S> {
    pub fn new(inner: S, min: u64, max: u64) -> Self {
        assert!(min <= max);
        Self {
            inner,
            min,
            max,
            position: 0,
            skipped_to_min: false,
            pending: None,
        }
    }

    async fn ensure_at_min(&mut self) -> Result<()> {
        if self.skipped_to_min {
            return Ok(());
        }
        let mut remaining = self.min;
        while remaining > 0 {
            let skipped = self.inner.skip(remaining).await?;
            if skipped > 0 {
                remaining -= skipped;
                self.position += skipped;
                continue;
            }
            // The source doesn't support skip (or is exhausted): fall back
            // to reading and discarding to reach `min`.
            match self.inner.read().await {
                Ok(mut buf) => {
                    let n = buf.remaining() as u64;
                    if n == 0 {
                        break;
                    }
                    let take = n.min(remaining);
                    buf.advance(take as usize);
                    remaining -= take;
                    self.position += take;
                    if take < n {
                        // Read past `min` in one chunk; this leftover is the
                        // first buffer `read()` will actually return.
                        self.pending = Some(buf);
                        break;
                    }
                }
                Err(e) if e.is_end() => break,
                Err(e) => return Err(e),
            }
        }
        self.skipped_to_min = true;
        Ok(())
    }
}

impl<S: ByteSource> ByteSource for RangedByteSource<S> {
    async fn read(&mut self) -> Result<Buffer> {
        self.ensure_at_min().await?;
        if self.position >= self.max {
            return Err(crate::error::Error::end());
        }
        let mut buf = match self.pending.take() {
            Some(buf) => buf,
            None => self.inner.read().await?,
        };
        let remaining_window = self.max - self.position;
        if (buf.remaining() as u64) > remaining_window {
            buf = buf.split_to(remaining_window as usize);
        }
        self.position += buf.remaining() as u64;
        Ok(buf)
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        self.ensure_at_min().await?;
        let window = self.max.saturating_sub(self.position);
        let want = n.min(window);
        let got = self.inner.skip(want).await?;
        self.position += got;
        Ok(got)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;

    #[tokio::test]
    async fn presents_only_the_configured_window() {
        let mut src = RangedByteSource::new(VecSource::whole(b"0123456789", 2), 2, 6);
        let all = src.read_all(1024).await.unwrap();
        assert_eq!(all, b"2345");
    }

    #[tokio::test]
    async fn max_beyond_source_length_is_not_an_error() {
        let mut src = RangedByteSource::new(VecSource::whole(b"0123", 2), 0, 100);
        let all = src.read_all(1024).await.unwrap();
        assert_eq!(all, b"0123");
    }

    #[tokio::test]
    async fn min_beyond_source_length_yields_nothing() {
        let mut src = RangedByteSource::new(VecSource::whole(b"0123", 2), 100, 200);
        let all = src.read_all(1024).await.unwrap();
        assert_eq!(all, b"");
    }
}
