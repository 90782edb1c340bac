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

//! The async byte-stream core: `ByteSource`/`ByteSink` and the
//! library of composable transforms layered on top of them.

pub mod cache;
pub mod delimited;
pub mod file;
pub mod gzip;
pub mod memory;
pub mod pipe;
pub mod pushback;
pub mod range;
pub mod sink;
pub mod source;
pub mod thread_safe;
pub mod throttle;

pub use cache::{ByteSourceCache, CacheView};
pub use delimited::{DelimitedByteSource, DelimitedItem};
pub use file::{FileByteSink, PooledFileSource, SimpleFileSource};
pub use gzip::GzipByteSource;
pub use memory::{MemorySink, MemorySource, MultiplexedBuffer, MultiplexedSink};
pub use pipe::{pipe, PipeSink, PipeSource};
pub use pushback::PushbackByteSource;
pub use range::RangedByteSource;
pub use sink::{BoxedSink, ByteSink, DynByteSink};
pub use source::{BoxedSource, ByteSource, DynByteSource};
pub use thread_safe::{ThreadSafeSink, ThreadSafeSource};
pub use throttle::{Curve, LinearCurve, ThrottledByteSource};
