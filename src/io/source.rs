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

//! `ByteSource` is the universal read contract: a cursor over a
//! logically finite byte sequence. `read` succeeds with a chunk, fails with
//! `ErrorKind::End` at EOF, or fails with another (possibly recoverable)
//! error. Exactly one `read`/`skip`/`close` may be pending at a time;
//! violating that is a programming error, not a recoverable one.

use std::future::Future;

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};

/// Boxed, type-erased `ByteSource`. Mirrors opendal's `Reader = Box<dyn
/// ReadDyn>` pattern: `Read`'s `async fn` isn't object-safe, so dynamic
/// dispatch goes through `BoxedSource` + a blanket impl of `ByteSource` for
/// `Box<dyn BoxedSource>`.
pub type DynByteSource = Box<dyn BoxedSource>;

pub trait ByteSource: Unpin + Send {
    /// Fetch the next chunk. An empty buffer is a permitted (if discouraged)
    /// spurious result; callers must not assume its absence signals EOF.
    fn read(&mut self) -> impl Future<Output = Result<Buffer>> + Send;

    /// Best-effort skip of up to `n` bytes; returns the number actually
    /// skipped, which may be less than `n` (including 0). Skipping past the
    /// end of the source is allowed and simply yields fewer bytes
    /// afterwards. The default implementation never skips.
    fn skip(&mut self, _n: u64) -> impl Future<Output = Result<u64>> + Send {
        async { Ok(0) }
    }

    /// Idempotent close; never callable while a read is pending.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Accumulate the whole source into one buffer, failing if it would
    /// exceed `max` bytes.
    fn read_all(&mut self, max: usize) -> impl Future<Output = Result<Vec<u8>>> + Send
    where
        Self: Sized,
    {
        async move {
            let mut out = Vec::new();
            loop {
                match self.read().await {
                    Ok(buf) => {
                        out.extend_from_slice(&buf.to_bytes());
                        if out.len() > max {
                            return Err(Error::over_limit("max", out.len() as u64, max as u64));
                        }
                    }
                    Err(e) if e.is_end() => return Ok(out),
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// Same as [`ByteSource::read_all`] but decoded as UTF-8 text.
    fn as_string(&mut self, max: usize) -> impl Future<Output = Result<String>> + Send
    where
        Self: Sized,
    {
        async move {
            let bytes = self.read_all(max).await?;
            String::from_utf8(bytes)
                .map_err(|e| Error::new(ErrorKind::Protocol, "invalid utf-8").set_source(e))
        }
    }
}

/// Object-safe counterpart of [`ByteSource`], used only to support
/// `Box<dyn BoxedSource>` as a `ByteSource` impl.
pub trait BoxedSource: Unpin + Send {
    fn read_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<Buffer>>;
    fn skip_dyn<'a>(&'a mut self, n: u64) -> futures::future::BoxFuture<'a, Result<u64>>;
    fn close_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<()>>;
}

impl<T: ByteSource + ?Sized> BoxedSource for T
where
    T: 'static,
{
    fn read_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<Buffer>> {
        Box::pin(self.read())
    }

    fn skip_dyn<'a>(&'a mut self, n: u64) -> futures::future::BoxFuture<'a, Result<u64>> {
        Box::pin(self.skip(n))
    }

    fn close_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(self.close())
    }
}

impl ByteSource for Box<dyn BoxedSource> {
    fn read(&mut self) -> impl Future<Output = Result<Buffer>> + Send {
        (**self).read_dyn()
    }

    fn skip(&mut self, n: u64) -> impl Future<Output = Result<u64>> + Send {
        (**self).skip_dyn(n)
    }

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        (**self).close_dyn()
    }
}
