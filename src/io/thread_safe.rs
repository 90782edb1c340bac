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

//! `ThreadSafe{Source,Sink}` turn a source/sink that is
//! normally owned by one task into a cloneable handle usable from several
//! tasks, serializing access with an async mutex rather than requiring the
//! inner type to manage its own concurrency. Every clone shares the same
//! underlying sequence — this multiplies *handles*, not the stream.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::buf::Buffer;
use crate::error::{Error, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

pub struct ThreadSafeSource<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for ThreadSafeSource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ByteSource> ThreadSafeSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

impl<S: ByteSource> ByteSource for ThreadSafeSource<S> {
    async fn read(&mut self) -> Result<Buffer> {
        self.inner.lock().await.read().await
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        self.inner.lock().await.skip(n).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}

pub struct ThreadSafeSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for ThreadSafeSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ByteSink> ThreadSafeSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

impl<S: ByteSink> ByteSink for ThreadSafeSink<S> {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        self.inner.lock().await.write(buf).await
    }

    async fn error(&mut self, e: Error) -> Result<()> {
        self.inner.lock().await.error(e).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}
