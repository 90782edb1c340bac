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

//! A generic RFC-822-style header block parser with per-field and total
//! size limits, shared by the multipart part-head grammar. Folding is
//! not generated or accepted — single-line headers only. Leftover bytes
//! past the terminating blank line are pushed back onto the source for
//! the body to consume.

use crate::error::{Error, ErrorKind, Result};
use crate::http::header_map::HeaderMap;
use crate::io::pushback::PushbackByteSource;
use crate::io::source::ByteSource;

#[derive(Clone, Copy, Debug)]
pub struct HeaderLimits {
    pub max_field_name_bytes: usize,
    pub max_field_value_bytes: usize,
    pub max_total_bytes: usize,
}

impl Default for HeaderLimits {
    fn default() -> Self {
        Self {
            max_field_name_bytes: 256,
            max_field_value_bytes: 4 * 1024,
            max_total_bytes: 16 * 1024,
        }
    }
}

/// Reads and parses one `field: value CRLF ... CRLF` block terminated by
/// a blank line, leaving everything after it available for the next
/// `read` on `src`.
pub async fn parse_header_block<S: ByteSource>(
    src: &mut PushbackByteSource<S>,
    limits: &HeaderLimits,
) -> Result<HeaderMap> {
    let mut acc: Vec<u8> = Vec::new();
    let terminator_at = loop {
        if let Some(pos) = find_subslice(&acc, b"\r\n\r\n") {
            break pos;
        }
        if acc.len() > limits.max_total_bytes {
            return Err(Error::over_limit(
                "maxHeaderBlockBytes",
                acc.len() as u64,
                limits.max_total_bytes as u64,
            ));
        }
        let buf = src.read().await?;
        acc.extend_from_slice(&buf.to_bytes());
    };

    let leftover = acc.split_off(terminator_at + 4);
    acc.truncate(terminator_at);
    if !leftover.is_empty() {
        src.unread(crate::buf::Buffer::from(leftover))?;
    }

    parse_lines(&acc, limits)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_lines(block: &[u8], limits: &HeaderLimits) -> Result<HeaderMap> {
    let text = String::from_utf8_lossy(block);
    let mut headers = HeaderMap::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            Error::new(ErrorKind::Protocol, format!("header line missing ':': {line:?}"))
        })?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(Error::new(ErrorKind::Protocol, format!("invalid header name: {name:?}")));
        }
        if name.len() > limits.max_field_name_bytes {
            return Err(Error::over_limit(
                "maxFieldNameBytes",
                name.len() as u64,
                limits.max_field_name_bytes as u64,
            ));
        }
        if value.len() > limits.max_field_value_bytes {
            return Err(Error::over_limit(
                "maxFieldValueBytes",
                value.len() as u64,
                limits.max_field_value_bytes as u64,
            ));
        }
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;

    #[tokio::test]
    async fn parses_headers_and_pushes_back_the_body() {
        let mut src = PushbackByteSource::new(VecSource::new(vec![
            b"Content-Disposition: form-data; name=\"f\"\r\n".to_vec(),
            b"Content-Type: text/plain\r\n\r\nBODY".to_vec(),
        ]));
        let headers = parse_header_block(&mut src, &HeaderLimits::default()).await.unwrap();
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(
            headers.get("content-disposition"),
            Some("form-data; name=\"f\"")
        );

        let rest = src.read_all(1024).await.unwrap();
        assert_eq!(rest, b"BODY");
    }

    #[tokio::test]
    async fn exceeding_total_limit_faults() {
        let mut src = PushbackByteSource::new(VecSource::new(vec![vec![b'x'; 100]]));
        let limits = HeaderLimits {
            max_total_bytes: 10,
            ..Default::default()
        };
        let err = parse_header_block(&mut src, &limits).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverLimit);
    }

    #[tokio::test]
    async fn malformed_line_without_colon_faults() {
        let mut src = PushbackByteSource::new(VecSource::new(vec![b"garbage\r\n\r\n".to_vec()]));
        let err = parse_header_block(&mut src, &HeaderLimits::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
