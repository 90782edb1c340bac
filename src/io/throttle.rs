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

//! `ThrottledByteSource` caps throughput to a monotonically non-decreasing
//! curve `b(t)`. Skipped bytes never count against the served
//! tally and always skip exactly `n`.

use std::time::{Duration, Instant};

use bytes::Buf;
use tokio::time::sleep_until;

use crate::buf::Buffer;
use crate::error::Result;
use crate::io::source::ByteSource;

/// A monotonically non-decreasing throughput curve `b(t)`, in bytes,
/// measured from the moment the first read is served.
pub trait Curve: Send {
    /// Bytes the peer is entitled to have received by time `elapsed`.
    fn bytes_by(&self, elapsed: Duration) -> u64;

    /// The earliest `Duration` (from t0) at which `bytes` have been made
    /// available, i.e. the inverse of [`Curve::bytes_by`].
    fn time_for(&self, bytes: u64) -> Duration;
}

/// The common case: `initial` bytes available immediately, then
/// `bytes_per_second` afterwards.
#[derive(Clone, Copy, Debug)]
pub struct LinearCurve {
    pub initial: u64,
    pub bytes_per_second: u64,
}

impl Curve for LinearCurve {
    fn bytes_by(&self, elapsed: Duration) -> u64 {
        self.initial + ((self.bytes_per_second as f64) * elapsed.as_secs_f64()) as u64
    }

    fn time_for(&self, bytes: u64) -> Duration {
        if bytes <= self.initial || self.bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((bytes - self.initial) as f64 / self.bytes_per_second as f64)
    }
}

pub struct ThrottledByteSource<S, C> {
    inner: S,
    curve: C,
    t0: Option<Instant>,
    served: u64,
    hoard: Buffer,
}

impl<S: ByteSource, C: Curve> ThrottledByteSource<S, C> {
    pub fn new(inner: S, curve: C) -> Self {
        Self {
            inner,
            curve,
            t0: None,
            served: 0,
            hoard: Buffer::new(),
        }
    }

    async fn fill_hoard(&mut self, want: usize) -> Result<()> {
        while self.hoard.remaining() < want {
            match self.inner.read().await {
                Ok(buf) => {
                    if buf.is_empty() {
                        continue;
                    }
                    self.hoard = if self.hoard.is_empty() {
                        buf
                    } else {
                        let mut merged = self.hoard.to_bytes().to_vec();
                        merged.extend_from_slice(&buf.to_bytes());
                        Buffer::from(merged)
                    };
                }
                Err(e) if e.is_end() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A caller-chosen hint for how large a served chunk should be; this
/// parameterizes the curve query `t(served + s)`.
pub const HINT_SIZE: usize = 16 * 1024;

impl<S: ByteSource, C: Curve> ByteSource for ThrottledByteSource<S, C> {
    async fn read(&mut self) -> Result<Buffer> {
        let t0 = *self.t0.get_or_insert_with(Instant::now);

        self.fill_hoard(HINT_SIZE).await?;
        if self.hoard.is_empty() {
            return Err(crate::error::Error::end());
        }

        let serve_at = t0 + self.curve.time_for(self.served + HINT_SIZE as u64);
        let now = Instant::now();
        if serve_at > now {
            sleep_until(tokio::time::Instant::from_std(serve_at)).await;
        }

        let elapsed = Instant::now().duration_since(t0);
        let entitled = self.curve.bytes_by(elapsed);
        let deficit = entitled.saturating_sub(self.served);
        let to_serve = deficit.max(HINT_SIZE as u64).min(self.hoard.remaining() as u64);

        let out = self.hoard.split_to(to_serve as usize);
        self.served += to_serve;
        Ok(out)
    }

    /// Skipped bytes don't count against the served tally and always skip
    /// exactly `n` (by reading-and-discarding if the origin can't skip).
    async fn skip(&mut self, n: u64) -> Result<u64> {
        let mut remaining = n;
        if !self.hoard.is_empty() {
            let take = remaining.min(self.hoard.remaining() as u64);
            self.hoard.advance(take as usize);
            remaining -= take;
        }
        while remaining > 0 {
            let skipped = self.inner.skip(remaining).await?;
            if skipped > 0 {
                remaining -= skipped;
                continue;
            }
            match self.inner.read().await {
                Ok(mut buf) => {
                    let take = (buf.remaining() as u64).min(remaining);
                    buf.advance(take as usize);
                    remaining -= take;
                    if !buf.is_empty() {
                        self.hoard = buf;
                    }
                    if take == 0 {
                        break;
                    }
                }
                Err(e) if e.is_end() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(n - remaining)
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
    async fn total_bytes_served_never_exceeds_curve_plus_buffer() {
        let data = vec![9u8; 200_000];
        let curve = LinearCurve {
            initial: 0,
            bytes_per_second: 100_000,
        };
        let mut src = ThrottledByteSource::new(VecSource::whole(&data, 32 * 1024), curve);

        let t0 = Instant::now();
        let buf = src.read().await.unwrap();
        let elapsed = t0.elapsed();
        let bound = curve.bytes_by(elapsed) + HINT_SIZE as u64;
        assert!(buf.remaining() as u64 <= bound);
    }

    #[tokio::test]
    async fn skip_always_skips_exactly_n_and_does_not_count_as_served() {
        let data = vec![3u8; 1000];
        let curve = LinearCurve {
            initial: 0,
            bytes_per_second: 1,
        };
        let mut src = ThrottledByteSource::new(VecSource::whole(&data, 100), curve);
        let skipped = src.skip(500).await.unwrap();
        assert_eq!(skipped, 500);
        assert_eq!(src.served, 0);
    }
}
