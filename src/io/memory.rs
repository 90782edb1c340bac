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

//! In-memory sources, sinks, and a multiplexed buffer:
//! `MemorySource`/`MemorySink` wrap a single `Vec<u8>`; `MultiplexedBuffer`
//! is written once and read by any number of independent [`MemoryView`]
//! cursors as bytes arrive, the live-write counterpart of
//! [`crate::io::cache::ByteSourceCache`] (which pulls from an origin
//! instead of being pushed into).

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

/// A fixed in-memory byte sequence exposed as a `ByteSource`, yielded in
/// `chunk_size` pieces (the whole thing at once when `chunk_size` is 0).
pub struct MemorySource {
    data: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk_size: 0,
            offset: 0,
        }
    }

    pub fn with_chunk_size(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size,
            offset: 0,
        }
    }
}

impl ByteSource for MemorySource {
    async fn read(&mut self) -> Result<Buffer> {
        if self.offset >= self.data.len() {
            return Err(Error::end());
        }
        let take = if self.chunk_size == 0 {
            self.data.len() - self.offset
        } else {
            self.chunk_size.min(self.data.len() - self.offset)
        };
        let out = self.data.slice(self.offset..self.offset + take);
        self.offset += take;
        Ok(Buffer::from(out))
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        let avail = (self.data.len() - self.offset) as u64;
        let skipped = n.min(avail);
        self.offset += skipped as usize;
        Ok(skipped)
    }
}

/// A `ByteSink` that simply accumulates into a growable buffer; intended
/// for tests and small in-process responses, not large bodies.
#[derive(Default)]
pub struct MemorySink {
    data: Vec<u8>,
    closed: bool,
    errored: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSink for MemorySink {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        if self.errored.is_some() || self.closed {
            return Err(Error::new(ErrorKind::Unexpected, "memory sink already closed"));
        }
        self.data.extend_from_slice(&buf.to_bytes());
        Ok(())
    }

    async fn error(&mut self, e: Error) -> Result<()> {
        self.errored.get_or_insert_with(|| e.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

struct Shared {
    chunks: Mutex<Vec<Bytes>>,
    done: Mutex<Option<std::result::Result<(), String>>>,
    notify: Notify,
}

/// A buffer that is written once (via [`MultiplexedSink`]) and may be read
/// by any number of independent cursors, each seeing every chunk in
/// publication order regardless of when it was created.
pub struct MultiplexedBuffer {
    shared: Arc<Shared>,
}

pub struct MultiplexedSink {
    shared: Arc<Shared>,
}

impl MultiplexedBuffer {
    pub fn new() -> (MultiplexedSink, Arc<MultiplexedBuffer>) {
        let shared = Arc::new(Shared {
            chunks: Mutex::new(Vec::new()),
            done: Mutex::new(None),
            notify: Notify::new(),
        });
        (
            MultiplexedSink {
                shared: shared.clone(),
            },
            Arc::new(MultiplexedBuffer { shared }),
        )
    }

    pub fn new_view(self: &Arc<Self>) -> MemoryView {
        MemoryView {
            shared: self.shared.clone(),
            index: 0,
        }
    }
}

impl ByteSink for MultiplexedSink {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        let done = self.shared.done.lock().await;
        if done.is_some() {
            return Err(Error::new(ErrorKind::Unexpected, "multiplexed buffer already closed"));
        }
        drop(done);
        self.shared.chunks.lock().await.push(buf.to_bytes());
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn error(&mut self, e: Error) -> Result<()> {
        let mut done = self.shared.done.lock().await;
        if done.is_none() {
            *done = Some(Err(e.to_string()));
            drop(done);
            self.shared.notify.notify_waiters();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut done = self.shared.done.lock().await;
        if done.is_none() {
            *done = Some(Ok(()));
            drop(done);
            self.shared.notify.notify_waiters();
        }
        Ok(())
    }
}

pub struct MemoryView {
    shared: Arc<Shared>,
    index: usize,
}

impl ByteSource for MemoryView {
    async fn read(&mut self) -> Result<Buffer> {
        loop {
            {
                let chunks = self.shared.chunks.lock().await;
                if self.index < chunks.len() {
                    let b = chunks[self.index].clone();
                    self.index += 1;
                    return Ok(Buffer::from(b));
                }
            }
            {
                let done = self.shared.done.lock().await;
                if let Some(result) = done.as_ref() {
                    return match result {
                        Ok(()) => Err(Error::end()),
                        Err(msg) => Err(Error::new(ErrorKind::Cache, msg.clone())),
                    };
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_yields_whole_buffer_then_end() {
        let mut src = MemorySource::new(Vec::from(&b"abc"[..]));
        let all = src.read_all(1024).await.unwrap();
        assert_eq!(all, b"abc");
    }

    #[tokio::test]
    async fn memory_sink_accumulates_writes() {
        let mut sink = MemorySink::new();
        sink.write(Buffer::from(Vec::from(&b"ab"[..]))).await.unwrap();
        sink.write(Buffer::from(Vec::from(&b"cd"[..]))).await.unwrap();
        assert_eq!(sink.as_slice(), b"abcd");
    }

    #[tokio::test]
    async fn multiplexed_views_see_writes_made_before_and_after_their_creation() {
        let (mut sink, buffer) = MultiplexedBuffer::new();
        let mut early_view = buffer.new_view();
        sink.write(Buffer::from(Vec::from(&b"first"[..]))).await.unwrap();
        let mut late_view = buffer.new_view();
        sink.write(Buffer::from(Vec::from(&b"second"[..]))).await.unwrap();
        sink.close().await.unwrap();

        let early = early_view.read_all(1024).await.unwrap();
        let late = late_view.read_all(1024).await.unwrap();
        assert_eq!(early, b"firstsecond");
        assert_eq!(late, b"firstsecond");
    }

    #[tokio::test]
    async fn sink_error_is_sticky_to_every_view() {
        let (mut sink, buffer) = MultiplexedBuffer::new();
        let mut view = buffer.new_view();
        sink.error(Error::new(ErrorKind::Protocol, "broken upstream"))
            .await
            .unwrap();
        let err = view.read().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cache);
    }
}
