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

//! `ContentType`: an immutable `(type, subtype, params)` triple.
//! Type/subtype are case-folded to lowercase; parameter keys are
//! lower-cased, values may be quoted-strings with `\`-escaping. Parsing is
//! loose (it tolerates what real clients send); construction from
//! components is strict (it validates RFC 7230 `token` characters).

use crate::error::{Error, ErrorKind, Result};

fn is_tspecial(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']'
            | b'?' | b'=' | b'{' | b'}' | b' ' | b'\t'
    )
}

fn is_token_char(c: u8) -> bool {
    c.is_ascii_graphic() && !is_tspecial(c)
}

fn validate_token(s: &str) -> Result<()> {
    if !s.is_empty() && s.bytes().all(is_token_char) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::Protocol,
            format!("invalid token in content type: {s:?}"),
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    typ: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Validates `typ`/`subtype` as RFC 7230 tokens; lower-cases `params`
    /// keys and stores values verbatim (quoting happens at render time).
    pub fn new(
        typ: impl Into<String>,
        subtype: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Result<Self> {
        let typ = typ.into().to_ascii_lowercase();
        let subtype = subtype.into().to_ascii_lowercase();
        validate_token(&typ)?;
        validate_token(&subtype)?;
        let params = params
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Ok(Self {
            typ,
            subtype,
            params,
        })
    }

    /// Loose parse: tokens delimited by `/` and `;`; parameter values may
    /// be a quoted string with `\`-escapes. Unparseable input falls back
    /// to `application/octet-stream` with no params, matching real-world
    /// server tolerance for malformed client headers.
    pub fn parse(input: &str) -> Self {
        Self::try_parse(input).unwrap_or_else(|| Self {
            typ: "application".into(),
            subtype: "octet-stream".into(),
            params: Vec::new(),
        })
    }

    fn try_parse(input: &str) -> Option<Self> {
        let mut parts = input.splitn(2, ';');
        let media = parts.next()?.trim();
        let mut media_parts = media.splitn(2, '/');
        let typ = media_parts.next()?.trim().to_ascii_lowercase();
        let subtype = media_parts.next()?.trim().to_ascii_lowercase();
        if typ.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        if let Some(rest) = parts.next() {
            let bytes = rest.as_bytes();
            let mut pos = 0usize;
            loop {
                while pos < bytes.len() && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace())
                {
                    pos += 1;
                }
                if pos >= bytes.len() {
                    break;
                }
                let key_start = pos;
                while pos < bytes.len() && bytes[pos] != b'=' && bytes[pos] != b';' {
                    pos += 1;
                }
                let key = rest[key_start..pos].trim().to_ascii_lowercase();
                if pos >= bytes.len() || bytes[pos] != b'=' {
                    // Bare attribute with no value; skip to next `;`.
                    while pos < bytes.len() && bytes[pos] != b';' {
                        pos += 1;
                    }
                    continue;
                }
                pos += 1; // consume '='
                let (value, next) = parse_param_value(rest, pos);
                if !key.is_empty() {
                    params.push((key, value));
                }
                pos = next;
            }
        }

        Some(Self {
            typ,
            subtype,
            params,
        })
    }

    pub fn typ(&self) -> &str {
        &self.typ
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Renders, quoting any parameter value that needs it (contains a
    /// tspecial, whitespace, or is empty).
    pub fn render(&self) -> String {
        let mut out = format!("{}/{}", self.typ, self.subtype);
        for (k, v) in &self.params {
            out.push_str("; ");
            out.push_str(k);
            out.push('=');
            if v.is_empty() || v.bytes().any(|b| !is_token_char(b)) {
                out.push('"');
                for c in v.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            } else {
                out.push_str(v);
            }
        }
        out
    }
}

/// Parses either a bare token or a quoted-string parameter value starting
/// at `start`; returns the decoded value and the index just past it.
fn parse_param_value(rest: &str, start: usize) -> (String, usize) {
    let bytes = rest.as_bytes();
    if start < bytes.len() && bytes[start] == b'"' {
        let mut value = String::new();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'"' => {
                    i += 1;
                    break;
                }
                b'\\' if i + 1 < bytes.len() => {
                    value.push(bytes[i + 1] as char);
                    i += 2;
                }
                c => {
                    value.push(c as char);
                    i += 1;
                }
            }
        }
        (value, i)
    } else {
        let mut i = start;
        while i < bytes.len() && bytes[i] != b';' {
            i += 1;
        }
        (rest[start..i].trim().to_string(), i)
    }
}
