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

//! `MultipartByteSource` is the generator counterpart of
//! [`super::parser::MultipartParser`]: given a lazy sequence
//! of parts and a boundary, it emits
//!
//! - the first delimiter without a leading CRLF,
//! - then for each part: `CRLF--boundary CRLF part-head CRLF part-body`,
//! - then the close delimiter `CRLF--boundary-- CRLF`.
//!
//! Header values are validated at emission time (printable octets, no
//! CR/LF); an invalid header is a fatal error that poisons the output.

use std::future::Future;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::http::header_map::HeaderMap;
use crate::io::source::ByteSource;

/// Generates a fresh random multipart boundary: a 10-dash prefix plus 22
/// ASCII alphanumerics.
pub fn generate_boundary() -> String {
    let suffix: String = (&mut thread_rng())
        .sample_iter(Alphanumeric)
        .map(char::from)
        .take(22)
        .collect();
    format!("----------{suffix}")
}

/// A lazy source of outgoing parts. `next_part` returns `None` once
/// exhausted.
pub trait PartSource: Send {
    type Body: ByteSource;

    fn next_part(
        &mut self,
    ) -> impl Future<Output = Result<Option<(HeaderMap, Self::Body)>>> + Send;
}

/// Minimal `PartSource` backed by a `Vec`, for tests and small fixed
/// outgoing messages.
pub struct VecPartSource<B> {
    parts: std::collections::VecDeque<(HeaderMap, B)>,
}

impl<B> VecPartSource<B> {
    pub fn new(parts: Vec<(HeaderMap, B)>) -> Self {
        Self {
            parts: parts.into(),
        }
    }
}

impl<B: ByteSource> PartSource for VecPartSource<B> {
    type Body = B;

    async fn next_part(&mut self) -> Result<Option<(HeaderMap, B)>> {
        Ok(self.parts.pop_front())
    }
}

fn validate_header_value(s: &str) -> Result<()> {
    if s.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::Protocol,
            format!("multipart: header contains non-printable or CR/LF bytes: {s:?}"),
        ))
    }
}

enum Mode<B> {
    NeedNextPart,
    InBody(B),
    Closing,
    Done,
}

pub struct MultipartByteSource<P: PartSource> {
    boundary: String,
    parts: P,
    pending: Vec<u8>,
    mode: Mode<P::Body>,
    first: bool,
    poisoned: bool,
}

impl<P: PartSource> MultipartByteSource<P> {
    pub fn new(parts: P, boundary: String) -> Self {
        Self {
            boundary,
            parts,
            pending: Vec::new(),
            mode: Mode::NeedNextPart,
            first: true,
            poisoned: false,
        }
    }

    fn render_part_prefix(&mut self, headers: &HeaderMap) -> Result<Vec<u8>> {
        for (name, value) in headers.iter() {
            validate_header_value(name)?;
            validate_header_value(value)?;
        }
        let mut out = Vec::new();
        if !self.first {
            out.extend_from_slice(b"\r\n");
        }
        self.first = false;
        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        Ok(out)
    }

    fn render_close(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"\r\n--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
        out
    }
}

impl<P: PartSource> ByteSource for MultipartByteSource<P> {
    async fn read(&mut self) -> Result<Buffer> {
        if self.poisoned {
            return Err(Error::new(
                ErrorKind::Protocol,
                "multipart generator: poisoned by a previous fatal error",
            ));
        }
        loop {
            if !self.pending.is_empty() {
                return Ok(Buffer::from(std::mem::take(&mut self.pending)));
            }
            match &mut self.mode {
                Mode::NeedNextPart => match self.parts.next_part().await {
                    Ok(Some((headers, body))) => match self.render_part_prefix(&headers) {
                        Ok(prefix) => {
                            self.pending = prefix;
                            self.mode = Mode::InBody(body);
                        }
                        Err(e) => {
                            self.poisoned = true;
                            return Err(e);
                        }
                    },
                    Ok(None) => {
                        self.pending = self.render_close();
                        self.mode = Mode::Closing;
                    }
                    Err(e) => {
                        self.poisoned = true;
                        return Err(e);
                    }
                },
                Mode::InBody(body) => match body.read().await {
                    Ok(buf) => return Ok(buf),
                    Err(e) if e.is_end() => self.mode = Mode::NeedNextPart,
                    Err(e) => {
                        self.poisoned = true;
                        return Err(e);
                    }
                },
                Mode::Closing => {
                    self.mode = Mode::Done;
                }
                Mode::Done => return Err(Error::end()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (n, v) in pairs {
            h.append(n, v.to_string());
        }
        h
    }

    #[tokio::test]
    async fn renders_the_full_two_part_envelope() {
        let parts = VecPartSource::new(vec![
            (
                headers(&[("Content-Disposition", "form-data; name=\"x\"")]),
                VecSource::new(vec![b"42".to_vec()]),
            ),
            (
                headers(&[
                    ("Content-Disposition", "form-data; name=\"f\"; filename=\"a.txt\""),
                    ("Content-Type", "text/plain"),
                ]),
                VecSource::new(vec![b"hello".to_vec()]),
            ),
        ]);
        let mut gen = MultipartByteSource::new(parts, "X".to_string());
        let out = gen.read_all(4096).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            concat!(
                "--X\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n42",
                "\r\n--X\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n",
                "Content-Type: text/plain\r\n\r\nhello",
                "\r\n--X--\r\n"
            )
        );
    }

    #[tokio::test]
    async fn invalid_header_value_poisons_the_output() {
        let parts = VecPartSource::new(vec![(
            headers(&[("X-Bad", "line1\r\nline2")]),
            VecSource::new(vec![b"body".to_vec()]),
        )]);
        let mut gen = MultipartByteSource::new(parts, "X".to_string());
        let err = gen.read().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        let err2 = gen.read().await.unwrap_err();
        assert_eq!(err2.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn generated_envelope_round_trips_through_the_parser() {
        use super::super::parser::MultipartParser;
        use crate::http::headparse::HeaderLimits;

        let parts = VecPartSource::new(vec![(
            headers(&[("Content-Disposition", "form-data; name=\"x\"")]),
            VecSource::new(vec![b"42".to_vec()]),
        )]);
        let mut gen = MultipartByteSource::new(parts, "X".to_string());
        let raw = gen.read_all(4096).await.unwrap();

        let mut parser = MultipartParser::new(
            VecSource::new(vec![raw]),
            "X",
            HeaderLimits::default(),
        );
        let mut part = parser.get_next_part().await.unwrap();
        assert_eq!(
            part.headers.get("content-disposition"),
            Some("form-data; name=\"x\"")
        );
        assert_eq!(part.body.read_all(1024).await.unwrap(), b"42");
        assert!(parser.try_get_next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn boundary_generator_produces_32_char_boundary_prefixed_with_ten_dashes() {
        let b = generate_boundary();
        assert_eq!(b.len(), 32);
        assert!(b.starts_with("----------"));
        assert!(b[10..].bytes().all(|c| c.is_ascii_alphanumeric()));
    }
}
