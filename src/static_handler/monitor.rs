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

//! Background filesystem polling: scans
//! the root directory once a second, rebuilds `FileInfo` for
//! created/updated files (removing the old entry first so no request
//! ever sees new bytes paired with stale headers), and drops deleted
//! files from `uri2info`. The task exits after 5 seconds without a
//! request and is reactivated by the next one, which drains all
//! outstanding changes synchronously before the background loop resumes.
//! The running task is also held as a [`Cancellable`], so an explicit
//! [`stop`] can tear it down without waiting out the idle timeout.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use crate::cancel::{CancelReason, Cancellable};
use crate::error::Result;
use crate::static_handler::file_info::{FileConfOverride, FileInfo};
use crate::static_handler::gzip_cache::{DiskGzipCache, MemoryGzipCache};
use crate::static_handler::uri_path::encode_path;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_SHUTDOWN: Duration = Duration::from_secs(5);

pub type PathMatcher = Arc<dyn Fn(&Path) -> bool + Send + Sync>;
pub type ConfMod = Arc<dyn Fn(&Path) -> FileConfOverride + Send + Sync>;

fn default_matcher() -> PathMatcher {
    Arc::new(|_path: &Path| true)
}

struct Seen {
    mtime: SystemTime,
    size: u64,
}

pub(crate) struct MonitorState {
    pub root: PathBuf,
    pub uri_prefix: String,
    pub matcher: PathMatcher,
    pub conf_mod: ConfMod,
    pub default_gzip: bool,
    pub default_cache: bool,
    pub uri2info: DashMap<String, Arc<FileInfo>>,
    pub gzip_memory_cache: MemoryGzipCache,
    pub gzip_disk_cache: DiskGzipCache,
    seen: DashMap<PathBuf, Seen>,
    last_activity: AtomicU64,
    running: AtomicBool,
    poll_task: std::sync::Mutex<Option<Cancellable<()>>>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

impl MonitorState {
    pub fn new(
        root: PathBuf,
        uri_prefix: String,
        matcher: Option<PathMatcher>,
        conf_mod: ConfMod,
        default_gzip: bool,
        default_cache: bool,
        gzip_tmp_dir: PathBuf,
    ) -> Self {
        let _ = std::fs::create_dir_all(&gzip_tmp_dir);
        Self {
            root,
            uri_prefix,
            matcher: matcher.unwrap_or_else(default_matcher),
            conf_mod,
            default_gzip,
            default_cache,
            uri2info: DashMap::new(),
            gzip_memory_cache: MemoryGzipCache::new(),
            gzip_disk_cache: DiskGzipCache::new(gzip_tmp_dir),
            seen: DashMap::new(),
            last_activity: AtomicU64::new(now_millis()),
            running: AtomicBool::new(false),
            poll_task: std::sync::Mutex::new(None),
        }
    }

    fn uris_for(&self, relative: &Path, is_index_file: bool) -> Vec<String> {
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        let mut uris = vec![format!("{}/{}", self.uri_prefix, encode_path(&relative_str))];
        if is_index_file {
            let parent_str = relative
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            let dir_uri = if parent_str.is_empty() {
                format!("{}/", self.uri_prefix)
            } else {
                format!("{}/{}/", self.uri_prefix, encode_path(&parent_str))
            };
            let without_slash = dir_uri.trim_end_matches('/').to_string();
            uris.push(dir_uri.clone());
            if without_slash != dir_uri && !without_slash.is_empty() {
                uris.push(without_slash);
            }
        }
        uris
    }

    fn remove_path(&self, path: &Path) {
        self.uri2info.retain(|_, info| info.disk_path.as_path() != path);
        self.gzip_memory_cache.invalidate(path);
    }

    async fn rebuild_one(&self, path: PathBuf, metadata: &std::fs::Metadata) -> Result<()> {
        let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
        let conf = (self.conf_mod)(&relative);
        if conf.exclude {
            self.remove_path(&path);
            return Ok(());
        }

        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let default_content_type = crate::http::ContentType::parse(
            mime_guess::from_path(&path).first_or_octet_stream().essence_str(),
        );

        // Remove before inserting the rebuilt entry: a request arriving
        // mid-rebuild sees either the old, consistent FileInfo or the new
        // one, never new bytes paired with old headers.
        self.remove_path(&path);

        let info = Arc::new(FileInfo::from_metadata(
            path.clone(),
            metadata.len(),
            mtime,
            default_content_type,
            self.default_gzip,
            self.default_cache,
            &conf,
        ));

        for uri in self.uris_for(&relative, info.is_index_file) {
            self.uri2info.insert(uri, info.clone());
        }
        self.seen.insert(
            path,
            Seen {
                mtime,
                size: metadata.len(),
            },
        );
        Ok(())
    }

    async fn scan(&self) -> Result<()> {
        let root = self.root.clone();
        let matcher = self.matcher.clone();
        let found = tokio::task::spawn_blocking(move || walk(&root, &matcher))
            .await
            .unwrap_or_else(|_| Vec::new());

        let mut found_paths = std::collections::HashSet::new();
        for (path, metadata) in &found {
            found_paths.insert(path.clone());
            let changed = match self.seen.get(path) {
                Some(seen) => seen.mtime != metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH) || seen.size != metadata.len(),
                None => true,
            };
            if changed {
                self.rebuild_one(path.clone(), metadata).await?;
            }
        }

        let removed: Vec<PathBuf> = self
            .seen
            .iter()
            .map(|e| e.key().clone())
            .filter(|p| !found_paths.contains(p))
            .collect();
        for path in removed {
            self.remove_path(&path);
            self.seen.remove(&path);
        }
        Ok(())
    }

    fn touch(&self) {
        self.last_activity.store(now_millis(), Ordering::Relaxed);
    }

    fn idle(&self) -> bool {
        now_millis().saturating_sub(self.last_activity.load(Ordering::Relaxed)) > IDLE_SHUTDOWN.as_millis() as u64
    }
}

fn walk(root: &Path, matcher: &PathMatcher) -> Vec<(PathBuf, std::fs::Metadata)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() && matcher(&path) {
                out.push((path, metadata));
            }
        }
    }
    out
}

/// Ensures the polling task is running, performing a synchronous drain
/// first if it had gone idle.
pub(crate) async fn touch_and_ensure_running(state: &Arc<MonitorState>) -> Result<()> {
    state.touch();
    if state
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        state.scan().await?;
        let spawned = state.clone();
        let task = Cancellable::spawn(async move { poll_loop(spawned).await });
        *state.poll_task.lock().expect("poll task mutex poisoned") = Some(task);
    }
    Ok(())
}

/// Cancels the background poll task, if one is running. Idempotent: a
/// handler that already went idle (or was already stopped) has nothing to
/// cancel, and cancelling a task that finished on its own between the
/// check and the cancel call is a documented no-op.
pub(crate) fn stop(state: &Arc<MonitorState>) {
    if let Some(task) = state.poll_task.lock().expect("poll task mutex poisoned").take() {
        task.cancel(CancelReason("static handler shut down".into()));
    }
    state.running.store(false, Ordering::Release);
}

async fn poll_loop(state: Arc<MonitorState>) {
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        if let Err(e) = state.scan().await {
            log::warn!("static handler: filesystem scan failed: {e}");
        }
        if state.idle() {
            state.running.store(false, Ordering::Release);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discovers_a_file_and_then_sees_it_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let state = Arc::new(MonitorState::new(
            dir.path().to_path_buf(),
            "".to_string(),
            None,
            Arc::new(|_: &Path| FileConfOverride::default()),
            false,
            false,
            dir.path().join("gz"),
        ));
        state.scan().await.unwrap();
        assert!(state.uri2info.contains_key("/a.txt"));

        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        state.scan().await.unwrap();
        assert!(!state.uri2info.contains_key("/a.txt"));
    }

    #[tokio::test]
    async fn index_html_gets_directory_alias_uris() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "<html></html>").unwrap();

        let state = Arc::new(MonitorState::new(
            dir.path().to_path_buf(),
            "".to_string(),
            None,
            Arc::new(|_: &Path| FileConfOverride::default()),
            false,
            false,
            dir.path().join("gz"),
        ));
        state.scan().await.unwrap();
        assert!(state.uri2info.contains_key("/docs/index.html"));
        assert!(state.uri2info.contains_key("/docs/"));
        assert!(state.uri2info.contains_key("/docs"));
    }

    #[tokio::test]
    async fn excluded_path_is_never_inserted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), "shh").unwrap();

        let state = Arc::new(MonitorState::new(
            dir.path().to_path_buf(),
            "".to_string(),
            None,
            Arc::new(|path: &Path| FileConfOverride {
                exclude: path.to_string_lossy().contains("secret"),
                ..Default::default()
            }),
            false,
            false,
            dir.path().join("gz"),
        ));
        state.scan().await.unwrap();
        assert!(!state.uri2info.contains_key("/secret.txt"));
    }

    #[tokio::test]
    async fn stop_tears_down_the_poll_task_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(MonitorState::new(
            dir.path().to_path_buf(),
            "".to_string(),
            None,
            Arc::new(|_: &Path| FileConfOverride::default()),
            false,
            false,
            dir.path().join("gz"),
        ));
        touch_and_ensure_running(&state).await.unwrap();
        assert!(state.poll_task.lock().unwrap().is_some());

        stop(&state);
        assert!(state.poll_task.lock().unwrap().is_none());
        assert!(!state.running.load(Ordering::Acquire));

        // Stopping an already-stopped monitor does nothing surprising.
        stop(&state);
    }
}
