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

//! `conduit` is the asynchronous byte-stream core for non-blocking HTTP and
//! WebSocket servers: a uniform, backpressured `ByteSource`/`ByteSink`
//! abstraction, a library of composable transforms built on it, a streaming
//! multipart/form-data codec, a TLS/plain connection adapter, a form-data
//! pipeline with CSRF checking, and a static-file handler.
//!
//! The HTTP/1.x request parser, response writer, routing layer, and
//! underlying async runtime are deliberately out of scope; this crate
//! assumes an ambient `tokio` runtime and wires its pieces on top of it.

pub mod buf;
pub mod cancel;
pub mod error;
pub mod form;
pub mod http;
pub mod io;
pub mod multipart;
pub mod static_handler;
pub mod tls;

pub use buf::Buffer;
pub use error::{Error, ErrorKind, Result};
