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

//! The error type shared by every module in this crate.
//!
//! `End` is not really an error: it is the control signal `ByteSource::read`
//! uses to report "no more bytes". Everything else is a genuine failure.

use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No more bytes: the control signal `ByteSource::read` fails with at EOF.
    End,
    /// A bounded parser exceeded one of its configured limits.
    OverLimit,
    /// Malformed input for a protocol/format parser (multipart, URL-encoded
    /// form, TLS record, HTTP header block, ...). Fatal for the current
    /// stream.
    Protocol,
    /// Underlying I/O failure.
    Io,
    /// TLS handshake, record, or renegotiation failure. Fatal.
    Tls,
    /// CSRF token/cookie mismatch.
    Csrf,
    /// A cached value (gzip cache, byte-source cache) is sticky-poisoned.
    Cache,
    /// Operation not supported by this implementation.
    Unsupported,
    /// A programming error: e.g. two concurrent pending reads on one source.
    Unexpected,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::End => "End",
            ErrorKind::OverLimit => "OverLimit",
            ErrorKind::Protocol => "Protocol",
            ErrorKind::Io => "Io",
            ErrorKind::Tls => "Tls",
            ErrorKind::Csrf => "Csrf",
            ErrorKind::Cache => "Cache",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::Unexpected => "Unexpected",
        };
        write!(f, "{s}")
    }
}

pub struct Error {
    kind: ErrorKind,
    message: String,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }
        write!(f, " => {}", self.message)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} at {} => {}", self.kind, self.operation, self.message)?;
        if !self.context.is_empty() {
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "    {k}: {v}")?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f, "Source: {source:?}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref() as _)
    }
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn end() -> Self {
        Self::new(ErrorKind::End, "end of stream")
    }

    pub fn over_limit(limit: &'static str, value: u64, max: u64) -> Self {
        Self::new(
            ErrorKind::OverLimit,
            format!("{limit} exceeded: {value} > {max}"),
        )
        .with_context("limit", limit)
        .with_context("value", value.to_string())
        .with_context("max", max.to_string())
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called_from", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        self.source = Some(src.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_end(&self) -> bool {
        self.kind == ErrorKind::End
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return Error::end();
        }
        Error::new(ErrorKind::Io, err.to_string()).set_source(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::End => io::ErrorKind::UnexpectedEof,
            ErrorKind::Unsupported => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
