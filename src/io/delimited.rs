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

//! `DelimitedByteSource` inserts a sentinel wherever a non-empty delimiter
//! `D` occurs in the origin stream, using Knuth-Morris-Pratt
//! over a pushback-wrapped origin so a mid-buffer mismatch can be rewound.
//! Consumers detect boundaries by the sentinel's *identity*
//! (`Sentinel::is`), never its contents.
//!
//! By the KMP invariant, whenever the running match length is `k`, the `k`
//! most-recently-seen bytes equal `delimiter[..k]` exactly — so "the bytes
//! currently held as a tentative match" never needs its own buffer, it is
//! always reconstructable as a slice of `delimiter`. That is what lets
//! `next()` carry only a `usize` across calls instead of a byte buffer.

use crate::buf::{Buffer, Sentinel};
use crate::error::Result;
use crate::io::pushback::PushbackByteSource;
use crate::io::source::ByteSource;

fn kmp_failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[k] != pattern[i] {
            k = table[k - 1];
        }
        if pattern[k] == pattern[i] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

/// One item of a delimited stream.
pub enum DelimitedItem {
    Data(Buffer),
    Sentinel,
}

pub struct DelimitedByteSource<S> {
    inner: PushbackByteSource<S>,
    delimiter: Vec<u8>,
    failure: Vec<usize>,
    sentinel: Sentinel,
    k: usize,
    eof: bool,
}

impl<S: ByteSource> DelimitedByteSource<S> {
    pub fn new(inner: S, delimiter: Vec<u8>) -> Self {
        assert!(!delimiter.is_empty(), "delimiter must be non-empty");
        let failure = kmp_failure_table(&delimiter);
        Self {
            inner: PushbackByteSource::new(inner),
            delimiter,
            failure,
            sentinel: Sentinel::new(),
            k: 0,
            eof: false,
        }
    }

    /// The sentinel value this source emits; compare with `Sentinel::is`.
    pub fn sentinel(&self) -> Sentinel {
        self.sentinel.clone()
    }

    pub async fn next(&mut self) -> Result<DelimitedItem> {
        if self.eof {
            return Err(crate::error::Error::end());
        }

        loop {
            let buf = match self.inner.read().await {
                Ok(buf) => buf,
                Err(e) if e.is_end() => {
                    self.eof = true;
                    if self.k > 0 {
                        let partial = self.delimiter[..self.k].to_vec();
                        self.k = 0;
                        return Ok(DelimitedItem::Data(Buffer::from(partial)));
                    }
                    return Err(crate::error::Error::end());
                }
                Err(e) => return Err(e),
            };
            let bytes = buf.to_bytes();
            if bytes.is_empty() {
                continue;
            }

            let mut literal: Vec<u8> = Vec::new();
            for (idx, &b) in bytes.iter().enumerate() {
                let old_k = self.k;
                while self.k > 0 && self.delimiter[self.k] != b {
                    self.k = self.failure[self.k - 1];
                }
                if self.delimiter[self.k] == b {
                    self.k += 1;
                } else {
                    self.k = 0;
                }
                // `old_k` bytes of carry plus `b` make up `old_k + 1` bytes
                // of actual text; the new candidate match retains only the
                // last `self.k` of those, so the leading `old_k + 1 -
                // self.k` are now confirmed literal. When the new match is
                // empty those bytes are `delimiter[..old_k]` followed by
                // `b` itself (which isn't delimiter content); otherwise
                // they're exactly `delimiter[..flush_len]`, since the
                // dropped portion never reached past the carry.
                let flush_len = old_k + 1 - self.k;
                if flush_len > 0 {
                    if self.k == 0 {
                        literal.extend_from_slice(&self.delimiter[..flush_len - 1]);
                        literal.push(b);
                    } else {
                        literal.extend_from_slice(&self.delimiter[..flush_len]);
                    }
                }

                if self.k == self.delimiter.len() {
                    let rest = bytes.slice(idx + 1..);
                    self.k = 0;
                    if !literal.is_empty() {
                        // Emit the literal now; push the delimiter plus the
                        // chunk remainder back as one buffer so the match
                        // re-fires (cheaply, the delimiter is short) on the
                        // very next call.
                        let mut replay = self.delimiter.clone();
                        replay.extend_from_slice(&rest);
                        self.inner.unread(Buffer::from(replay))?;
                        return Ok(DelimitedItem::Data(Buffer::from(literal)));
                    }
                    if !rest.is_empty() {
                        self.inner.unread(Buffer::from(rest))?;
                    }
                    return Ok(DelimitedItem::Sentinel);
                }
            }

            if !literal.is_empty() {
                return Ok(DelimitedItem::Data(Buffer::from(literal)));
            }
            // Entire chunk was absorbed into a still-growing candidate
            // match; read more before producing anything.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;

    async fn collect(src: &mut DelimitedByteSource<VecSource>) -> Vec<String> {
        let mut out = Vec::new();
        loop {
            match src.next().await {
                Ok(DelimitedItem::Data(buf)) => {
                    out.push(String::from_utf8(buf.to_bytes().to_vec()).unwrap())
                }
                Ok(DelimitedItem::Sentinel) => out.push("<SENTINEL>".to_string()),
                Err(e) if e.is_end() => break,
                Err(e) => panic!("{e}"),
            }
        }
        out
    }

    #[tokio::test]
    async fn splits_on_delimiter_spanning_a_chunk_boundary() {
        let mut src = DelimitedByteSource::new(
            VecSource::new(vec![b"abc12".to_vec(), b"34xyz".to_vec()]),
            b"1234".to_vec(),
        );
        let items = collect(&mut src).await;
        assert_eq!(items, vec!["abc", "<SENTINEL>", "xyz"]);
    }

    #[tokio::test]
    async fn no_delimiter_present_yields_one_literal_run() {
        let mut src = DelimitedByteSource::new(VecSource::whole(b"hello world", 3), b"--".to_vec());
        let items = collect(&mut src).await;
        assert_eq!(items.join(""), "hello world");
        assert!(!items.contains(&"<SENTINEL>".to_string()));
    }

    #[tokio::test]
    async fn partial_match_at_eof_is_emitted_as_literal_prefix() {
        let mut src =
            DelimitedByteSource::new(VecSource::new(vec![b"abc12".to_vec()]), b"1234".to_vec());
        let items = collect(&mut src).await;
        assert_eq!(items, vec!["abc", "12"]);
    }

    #[tokio::test]
    async fn back_to_back_delimiters_yield_adjacent_sentinels() {
        let mut src = DelimitedByteSource::new(
            VecSource::new(vec![b"--a----b--".to_vec()]),
            b"--".to_vec(),
        );
        let items = collect(&mut src).await;
        assert_eq!(
            items,
            vec!["<SENTINEL>", "a", "<SENTINEL>", "<SENTINEL>", "b", "<SENTINEL>"]
        );
    }
}
