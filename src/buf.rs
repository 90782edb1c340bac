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

//! `Buffer` is the value type every `ByteSource` returns: an owned,
//! cheaply-cloneable chunk of bytes. A buffer returned from `read` is always
//! a *new* logical buffer — callers must never assume they can mutate it or
//! that reusing a previously returned buffer is meaningful.

use std::sync::Arc;

use bytes::{Buf, Bytes};

/// A contiguous or non-contiguous immutable byte sequence.
///
/// Non-contiguous buffers arise from transforms that stitch multiple
/// upstream reads together (e.g. the throttle source folding a `hoard` into
/// one served chunk) without paying for a copy.
#[derive(Clone)]
pub struct Buffer(Inner);

#[derive(Clone)]
enum Inner {
    Contiguous(Bytes),
    NonContiguous {
        parts: Arc<[Bytes]>,
        idx: usize,
        offset: usize,
    },
}

impl Buffer {
    /// An empty buffer. Const and allocation-free.
    #[inline]
    pub const fn new() -> Self {
        Self(Inner::Contiguous(Bytes::new()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize this buffer into a single contiguous `Bytes`, copying if
    /// it was non-contiguous.
    pub fn to_bytes(&self) -> Bytes {
        let mut bs = self.clone();
        bs.copy_to_bytes(bs.remaining())
    }

    /// Split off the first `at` bytes as a new `Buffer`, leaving the
    /// remainder in `self`.
    pub fn split_to(&mut self, at: usize) -> Buffer {
        assert!(at <= self.remaining());
        let taken = self.copy_to_bytes(at);
        Buffer::from(taken)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bs: Vec<u8>) -> Self {
        Self(Inner::Contiguous(bs.into()))
    }
}

impl From<Bytes> for Buffer {
    fn from(bs: Bytes) -> Self {
        Self(Inner::Contiguous(bs))
    }
}

impl From<&'static [u8]> for Buffer {
    fn from(bs: &'static [u8]) -> Self {
        Self(Inner::Contiguous(Bytes::from_static(bs)))
    }
}

impl From<Vec<Bytes>> for Buffer {
    fn from(bs: Vec<Bytes>) -> Self {
        Self(Inner::NonContiguous {
            parts: bs.into(),
            idx: 0,
            offset: 0,
        })
    }
}

impl Buf for Buffer {
    #[inline]
    fn remaining(&self) -> usize {
        match &self.0 {
            Inner::Contiguous(b) => b.remaining(),
            Inner::NonContiguous { parts, idx, offset } => {
                if *idx >= parts.len() {
                    return 0;
                }
                parts[*idx..].iter().map(|p| p.len()).sum::<usize>() - offset
            }
        }
    }

    #[inline]
    fn chunk(&self) -> &[u8] {
        match &self.0 {
            Inner::Contiguous(b) => b.chunk(),
            Inner::NonContiguous { parts, idx, offset } => {
                if *idx >= parts.len() {
                    return &[];
                }
                &parts[*idx][*offset..]
            }
        }
    }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        match &mut self.0 {
            Inner::Contiguous(b) => b.advance(cnt),
            Inner::NonContiguous { parts, idx, offset } => {
                let mut remaining = cnt;
                while remaining > 0 && *idx < parts.len() {
                    let left = parts[*idx].len() - *offset;
                    if remaining < left {
                        *offset += remaining;
                        remaining = 0;
                    } else {
                        remaining -= left;
                        *idx += 1;
                        *offset = 0;
                    }
                }
            }
        }
    }
}

/// `SENTINEL` values are matched by reference identity, not contents, per
/// `DelimitedByteSource`'s contract. A marker newtype makes the
/// identity check explicit rather than relying on pointer comparison of a
/// plain `Buffer`.
#[derive(Clone)]
pub struct Sentinel(pub(crate) Arc<()>);

impl Sentinel {
    pub fn new() -> Self {
        Self(Arc::new(()))
    }

    pub fn is(&self, other: &Sentinel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_buffer_reads_through_buf_trait() {
        let mut buf = Buffer::from(Vec::from(&b"hello"[..]));
        assert_eq!(buf.remaining(), 5);
        assert_eq!(buf.copy_to_bytes(5).as_ref(), b"hello");
    }

    #[test]
    fn non_contiguous_buffer_concatenates_in_order() {
        let mut buf = Buffer::from(vec![
            Bytes::from_static(b"abc"),
            Bytes::from_static(b"12"),
            Bytes::from_static(b"34xyz"),
        ]);
        assert_eq!(buf.remaining(), 10);
        let all = buf.copy_to_bytes(10);
        assert_eq!(all.as_ref(), b"abc1234xyz");
    }

    #[test]
    fn split_to_divides_the_buffer() {
        let mut buf = Buffer::from(Vec::from(&b"abcdef"[..]));
        let head = buf.split_to(3);
        assert_eq!(head.to_bytes().as_ref(), b"abc");
        assert_eq!(buf.to_bytes().as_ref(), b"def");
    }

    #[test]
    fn sentinel_identity_not_value() {
        let a = Sentinel::new();
        let b = Sentinel::new();
        assert!(a.is(&a.clone()));
        assert!(!a.is(&b));
    }
}
