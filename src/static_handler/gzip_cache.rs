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

//! Gzip caching for `GzipPolicy::DiskCached` and `::MemoryCached`: a disk
//! cache keyed by the origin file's mtime, built
//! once via an atomic rename with concurrent creators racing harmlessly,
//! and an in-memory cache of the compressed bytes for files served with
//! `cache: true`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::Result;
use crate::io::file::{FileByteSink, SimpleFileSource};
use crate::io::gzip::GzipByteSource;
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;
use crate::static_handler::file_info::FileInfo;

const GZIP_LEVEL: u32 = 9;

/// Memory-cached gzip is only meant for small, frequently-served assets;
/// anything larger should be configured `cache: false` and served from
/// the disk cache instead.
const MAX_MEMORY_CACHED_SIZE: usize = 64 * 1024 * 1024;

fn random_suffix() -> String {
    (&mut thread_rng())
        .sample_iter(Alphanumeric)
        .map(char::from)
        .take(12)
        .collect()
}

fn sanitize_for_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// A tmp-directory-backed gzip cache, one compressed copy per distinct
/// `(path, mtime)`. Stale entries (from a since-modified file) are simply
/// never looked up again; nothing proactively deletes them.
pub struct DiskGzipCache {
    tmp_dir: PathBuf,
}

impl DiskGzipCache {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self { tmp_dir: tmp_dir.into() }
    }

    fn cache_path(&self, info: &FileInfo) -> PathBuf {
        let mtime_bits = info
            .mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.tmp_dir.join(format!(
            "{}-{:x}.gz",
            sanitize_for_filename(&info.disk_path),
            mtime_bits
        ))
    }

    /// Returns the path to the gzip-compressed copy of `info`'s file,
    /// building it on first access. Concurrent callers racing to build
    /// the same entry both succeed; the one that loses the rename race
    /// discards its own tmp file instead of overwriting the winner's.
    pub async fn get_or_create(&self, info: &FileInfo) -> Result<PathBuf> {
        let final_path = self.cache_path(info);
        if tokio::fs::metadata(&final_path).await.is_ok() {
            return Ok(final_path);
        }

        let tmp_path = self.tmp_dir.join(format!(
            "{}-{}.tmp",
            sanitize_for_filename(&info.disk_path),
            random_suffix()
        ));

        let origin = SimpleFileSource::new(&info.disk_path);
        let mut gz = GzipByteSource::new(origin, GZIP_LEVEL);
        let mut sink = FileByteSink::new(&tmp_path);
        let build_result = async {
            loop {
                match gz.read().await {
                    Ok(buf) => sink.write(buf).await?,
                    Err(e) if e.is_end() => break,
                    Err(e) => return Err(e),
                }
            }
            sink.close().await
        }
        .await;

        if let Err(e) = build_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        if tokio::fs::metadata(&final_path).await.is_ok() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Ok(final_path);
        }

        match tokio::fs::rename(&tmp_path, &final_path).await {
            Ok(()) => Ok(final_path),
            Err(_) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Ok(final_path)
            }
        }
    }
}

/// An in-process cache of gzip-compressed bytes, for files served with
/// `cache: true && gzip: true`: the compressed form is built once and
/// held alongside the handler's `uri2info` entry.
#[derive(Default)]
pub struct MemoryGzipCache {
    entries: DashMap<PathBuf, Arc<Vec<u8>>>,
}

impl MemoryGzipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, info: &FileInfo) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.entries.get(&info.disk_path) {
            return Ok(bytes.clone());
        }
        let origin = SimpleFileSource::new(&info.disk_path);
        let mut gz = GzipByteSource::new(origin, GZIP_LEVEL);
        let compressed = gz.read_all(MAX_MEMORY_CACHED_SIZE).await?;
        let compressed = Arc::new(compressed);
        self.entries.insert(info.disk_path.clone(), compressed.clone());
        Ok(compressed)
    }

    /// Drops a stale entry; called by the monitor when a cached file is
    /// rebuilt or removed so clients never see bytes for an evicted
    /// `FileInfo`.
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ContentType;
    use crate::static_handler::file_info::FileConfOverride;

    fn info_for(path: PathBuf, mtime: std::time::SystemTime) -> FileInfo {
        FileInfo::from_metadata(
            path,
            0,
            mtime,
            ContentType::parse("text/plain"),
            true,
            false,
            &FileConfOverride::default(),
        )
    }

    #[tokio::test]
    async fn disk_cache_builds_once_and_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("a.txt");
        std::fs::write(&src_path, "hello world").unwrap();
        let mtime = std::fs::metadata(&src_path).unwrap().modified().unwrap();

        let cache = DiskGzipCache::new(dir.path());
        let info = info_for(src_path, mtime);
        let gz_path = cache.get_or_create(&info).await.unwrap();
        assert!(tokio::fs::metadata(&gz_path).await.is_ok());

        let gz_path_again = cache.get_or_create(&info).await.unwrap();
        assert_eq!(gz_path, gz_path_again);
    }

    #[tokio::test]
    async fn memory_cache_returns_the_same_arc_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("a.txt");
        std::fs::write(&src_path, "hello world").unwrap();
        let mtime = std::fs::metadata(&src_path).unwrap().modified().unwrap();

        let cache = MemoryGzipCache::new();
        let info = info_for(src_path, mtime);
        let a = cache.get_or_create(&info).await.unwrap();
        let b = cache.get_or_create(&info).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn invalidate_forces_a_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let src_path = dir.path().join("a.txt");
        std::fs::write(&src_path, "hello world").unwrap();
        let mtime = std::fs::metadata(&src_path).unwrap().modified().unwrap();

        let cache = MemoryGzipCache::new();
        let info = info_for(src_path.clone(), mtime);
        let a = cache.get_or_create(&info).await.unwrap();
        cache.invalidate(&src_path);
        let b = cache.get_or_create(&info).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
