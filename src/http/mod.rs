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

//! Small, behavior-rich HTTP helpers used throughout the core: content
//! type, header map, host/port, cookies, and the generic header-block
//! parser multipart builds on.

pub mod content_type;
pub mod cookie;
pub mod headparse;
pub mod header_map;
pub mod host_port;

pub use content_type::ContentType;
pub use header_map::HeaderMap;
pub use headparse::{parse_header_block, HeaderLimits};
pub use host_port::HostPort;
