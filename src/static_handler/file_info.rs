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

//! `FileInfo`: everything the static handler needs to answer a request
//! for one file without touching disk again — content type, size,
//! mtime, etag, gzip policy, expiration policy, and any extra response
//! headers a `confMod` attached.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::http::ContentType;

/// How the response's `Expires` header is computed for one file.
#[derive(Clone, Debug)]
pub enum ExpiresPolicy {
    /// No `Expires` header unless a tagged-URI match forces one.
    None,
    /// A fixed point in time, independent of when the request arrives.
    Absolute(SystemTime),
    /// `now + duration`, recomputed on every response.
    Relative(Duration),
}

/// Whether and how a file is served gzip-compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GzipPolicy {
    /// Never gzip this file.
    Disabled,
    /// Gzip, cached to a tmp path on disk keyed by mtime.
    DiskCached,
    /// Gzip, held in memory (only valid together with `cache: true`).
    MemoryCached,
}

/// Per-file overrides a `confMod` hook may apply during discovery. `None`
/// in any field means "use the handler default".
#[derive(Clone, Debug, Default)]
pub struct FileConfOverride {
    pub exclude: bool,
    pub cache: Option<bool>,
    pub gzip: Option<bool>,
    pub is_index_file: Option<bool>,
    pub expires_absolute: Option<SystemTime>,
    pub expires_relative: Option<Duration>,
    pub content_type: Option<ContentType>,
    pub etag: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

/// Everything resident in `uri2info` for one file.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub disk_path: PathBuf,
    pub size: u64,
    pub mtime: SystemTime,
    pub content_type: ContentType,
    pub etag: String,
    pub is_index_file: bool,
    pub cache: bool,
    pub gzip: GzipPolicy,
    pub expires: ExpiresPolicy,
    pub extra_headers: Vec<(String, String)>,
}

/// `t-<epoch-sec-hex>-<nanos-hex>`, derived from the file's mtime so two
/// builds of the same unchanged file produce the same etag.
pub fn default_etag(mtime: SystemTime) -> String {
    let since_epoch = mtime.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    format!("t-{:x}-{:x}", since_epoch.as_secs(), since_epoch.subsec_nanos())
}

impl FileInfo {
    pub fn from_metadata(
        disk_path: PathBuf,
        size: u64,
        mtime: SystemTime,
        default_content_type: ContentType,
        default_gzip: bool,
        default_cache: bool,
        conf: &FileConfOverride,
    ) -> Self {
        let is_index_file = conf
            .is_index_file
            .unwrap_or_else(|| disk_path.file_name().and_then(|n| n.to_str()) == Some("index.html"));
        let cache = conf.cache.unwrap_or(default_cache);
        let gzip_enabled = conf.gzip.unwrap_or(default_gzip);
        let gzip = if !gzip_enabled {
            GzipPolicy::Disabled
        } else if cache {
            GzipPolicy::MemoryCached
        } else {
            GzipPolicy::DiskCached
        };
        let expires = match (conf.expires_absolute, conf.expires_relative) {
            (Some(at), None) => ExpiresPolicy::Absolute(at),
            (None, Some(d)) => ExpiresPolicy::Relative(d),
            (None, None) => ExpiresPolicy::None,
            (Some(_), Some(_)) => {
                // Mutually exclusive by contract; absolute wins rather than
                // panicking on a misconfigured confMod.
                ExpiresPolicy::Absolute(conf.expires_absolute.unwrap())
            }
        };
        Self {
            etag: conf.etag.clone().unwrap_or_else(|| default_etag(mtime)),
            content_type: conf.content_type.clone().unwrap_or(default_content_type),
            is_index_file,
            cache,
            gzip,
            expires,
            extra_headers: conf.extra_headers.clone(),
            disk_path,
            size,
            mtime,
        }
    }

    /// The etag served for a gzip-compressed response.
    pub fn gzip_etag(&self) -> String {
        format!("{}.gzip", self.etag)
    }
}
