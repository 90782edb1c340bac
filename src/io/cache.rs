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

//! `ByteSourceCache` lazily copies an origin source into fixed-size 8 KiB
//! buffers and hands out independent cursor [`CacheView`]s over them.
//! Copying starts on the first `new_view()` call; the idiom for an
//! eager copy with no consumer is `cache.new_view().close()`. The cache
//! itself is thread-safe; individual views are not.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::source::ByteSource;

pub const CHUNK_SIZE: usize = 8 * 1024;

struct Inner {
    buffers: Mutex<Vec<Bytes>>,
    done: Mutex<Option<std::result::Result<(), String>>>,
    notify: Notify,
    started: std::sync::atomic::AtomicBool,
}

pub struct ByteSourceCache<S> {
    origin: Mutex<Option<S>>,
    total_size: Option<u64>,
    inner: Arc<Inner>,
}

impl<S: ByteSource + 'static> ByteSourceCache<S> {
    pub fn new(origin: S, total_size: Option<u64>) -> Self {
        Self {
            origin: Mutex::new(Some(origin)),
            total_size,
            inner: Arc::new(Inner {
                buffers: Mutex::new(Vec::new()),
                done: Mutex::new(None),
                notify: Notify::new(),
                started: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Returns a new independent cursor. Triggers the background copy on
    /// the first call.
    pub fn new_view(self: &Arc<Self>) -> CacheView<S> {
        if !self
            .inner
            .started
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            let this = self.clone();
            tokio::spawn(async move {
                this.copy_loop().await;
            });
        }
        CacheView {
            cache: self.clone(),
            index: 0,
        }
    }

    async fn copy_loop(self: Arc<Self>) {
        let mut origin = self.origin.lock().await.take().expect("copy starts once");
        let mut total_copied: u64 = 0;
        loop {
            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            while chunk.len() < CHUNK_SIZE {
                match origin.read().await {
                    Ok(buf) => {
                        let bytes = buf.to_bytes();
                        if bytes.is_empty() {
                            continue;
                        }
                        chunk.extend_from_slice(&bytes);
                    }
                    Err(e) if e.is_end() => break,
                    Err(e) => {
                        *self.inner.done.lock().await = Some(Err(e.to_string()));
                        self.inner.notify.notify_waiters();
                        return;
                    }
                }
            }
            if chunk.is_empty() {
                break;
            }
            total_copied += chunk.len() as u64;
            self.inner.buffers.lock().await.push(Bytes::from(chunk));
            self.inner.notify.notify_waiters();
        }
        let _ = origin.close().await;

        let result = match self.total_size {
            Some(expected) if expected != total_copied => Err(format!(
                "byte source cache: expected {expected} bytes, copied {total_copied}"
            )),
            _ => Ok(()),
        };
        *self.inner.done.lock().await = Some(result);
        self.inner.notify.notify_waiters();
    }
}

pub struct CacheView<S> {
    cache: Arc<ByteSourceCache<S>>,
    index: usize,
}

impl<S: ByteSource + 'static> ByteSource for CacheView<S> {
    async fn read(&mut self) -> Result<Buffer> {
        loop {
            {
                let buffers = self.cache.inner.buffers.lock().await;
                if self.index < buffers.len() {
                    let b = buffers[self.index].clone();
                    self.index += 1;
                    return Ok(Buffer::from(b));
                }
            }
            // Not yet published: is the copy finished or errored?
            {
                let done = self.cache.inner.done.lock().await;
                if let Some(result) = done.as_ref() {
                    match result {
                        Ok(()) => return Err(Error::end()),
                        Err(msg) => return Err(Error::new(ErrorKind::Cache, msg.clone())),
                    }
                }
            }
            self.cache.inner.notify.notified().await;
        }
    }

    /// Coarse-grained: skips whole buffers only, to stay bounded-cost.
    async fn skip(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0u64;
        loop {
            let buf_len = {
                let buffers = self.cache.inner.buffers.lock().await;
                buffers.get(self.index).map(|b| b.len() as u64)
            };
            let Some(len) = buf_len else { break };
            if skipped + len > n {
                break;
            }
            skipped += len;
            self.index += 1;
        }
        Ok(skipped)
    }
}
