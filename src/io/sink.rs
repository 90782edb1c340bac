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

//! `ByteSink` is the write-side counterpart of `ByteSource`.

use std::future::Future;

use crate::buf::Buffer;
use crate::error::Result;

pub trait ByteSink: Unpin + Send {
    /// Write one buffer. On failure the sink is in error state and must be
    /// closed by the caller; it must not be written to again.
    fn write(&mut self, buf: Buffer) -> impl Future<Output = Result<()>> + Send;

    /// Mark the byte sequence as corrupt. Idempotent on the first call.
    fn error(&mut self, e: crate::error::Error) -> impl Future<Output = Result<()>> + Send;

    /// Flush and close. May fail if flushing fails; idempotent otherwise.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Object-safe counterpart, mirroring [`crate::io::source::BoxedSource`].
pub trait BoxedSink: Unpin + Send {
    fn write_dyn<'a>(&'a mut self, buf: Buffer) -> futures::future::BoxFuture<'a, Result<()>>;
    fn error_dyn<'a>(
        &'a mut self,
        e: crate::error::Error,
    ) -> futures::future::BoxFuture<'a, Result<()>>;
    fn close_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<()>>;
}

impl<T: ByteSink + ?Sized> BoxedSink for T
where
    T: 'static,
{
    fn write_dyn<'a>(&'a mut self, buf: Buffer) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(self.write(buf))
    }

    fn error_dyn<'a>(
        &'a mut self,
        e: crate::error::Error,
    ) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(self.error(e))
    }

    fn close_dyn<'a>(&'a mut self) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(self.close())
    }
}

pub type DynByteSink = Box<dyn BoxedSink>;

impl ByteSink for Box<dyn BoxedSink> {
    fn write(&mut self, buf: Buffer) -> impl Future<Output = Result<()>> + Send {
        (**self).write_dyn(buf)
    }

    fn error(&mut self, e: crate::error::Error) -> impl Future<Output = Result<()>> + Send {
        (**self).error_dyn(e)
    }

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send {
        (**self).close_dyn()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::Error;

    /// Accumulates every write into a single `Vec<u8>`; records whether
    /// `error`/`close` were observed, for assertions in transform tests.
    #[derive(Default)]
    pub struct VecSink {
        pub data: Vec<u8>,
        pub errored: bool,
        pub closed: bool,
    }

    impl ByteSink for VecSink {
        async fn write(&mut self, buf: Buffer) -> Result<()> {
            self.data.extend_from_slice(&buf.to_bytes());
            Ok(())
        }

        async fn error(&mut self, _e: Error) -> Result<()> {
            self.errored = true;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::VecSink;
    use super::*;

    #[tokio::test]
    async fn writes_accumulate_in_order() {
        let mut sink = VecSink::default();
        sink.write(Buffer::from(Vec::from(&b"ab"[..]))).await.unwrap();
        sink.write(Buffer::from(Vec::from(&b"cd"[..]))).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(sink.data, b"abcd");
        assert!(sink.closed);
    }
}
