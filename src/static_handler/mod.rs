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

//! A static file handler: maps a request URI to a
//! [`file_info::FileInfo`] resident in memory and renders a full
//! response, with tagged-URI far-future caching, gzip (memory- or
//! disk-cached), and a background filesystem monitor that keeps
//! `uri2info` current.
//!
//! `handle`/`uri` are deliberately plain (non-`async`) functions: both are
//! meant to be synchronous and non-blocking, which this crate reads as
//! "never suspend the calling task". Reactivating the monitor after an
//! idle gap — which otherwise drains accumulated changes inline before
//! the first request proceeds — is instead kicked off on a detached task
//! (see `kick_monitor` below) — see DESIGN.md for why.

pub mod file_info;
pub mod gzip_cache;
mod monitor;
pub mod uri_path;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

pub use file_info::{ExpiresPolicy, FileConfOverride, FileInfo, GzipPolicy};
pub use monitor::{ConfMod, PathMatcher};

use crate::error::Result;
use crate::http::HeaderMap;
use crate::io::file::{PooledFileSource, SimpleFileSource};
use crate::io::range::RangedByteSource;
use crate::io::source::{ByteSource, DynByteSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other,
}

/// The subset of an incoming request the handler needs: method, the
/// decoded path (matched exactly against `uri2info`'s keys), the raw
/// query string if any, the `Accept-Encoding` request header, and the
/// conditional-request / range headers relevant to caching and partial
/// content.
#[derive(Clone, Debug)]
pub struct StaticRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub accept_gzip: bool,
    /// Raw `If-None-Match` request header value, if present.
    pub if_none_match: Option<String>,
    /// Raw `If-Modified-Since` request header value, if present.
    pub if_modified_since: Option<String>,
    /// Raw `Range` request header value, if present.
    pub range: Option<String>,
}

pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<DynByteSource>,
}

impl Response {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn not_found() -> Self {
        Self::empty(404)
    }

    fn method_not_allowed() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Allow", "GET, HEAD");
        Self {
            status: 405,
            headers,
            body: None,
        }
    }

    fn bad_request() -> Self {
        Self::empty(400)
    }

    fn not_modified(headers: HeaderMap) -> Self {
        Self {
            status: 304,
            headers,
            body: None,
        }
    }

    fn range_not_satisfiable(mut headers: HeaderMap, total: u64) -> Self {
        headers.insert("Content-Range", format!("bytes */{total}"));
        Self {
            status: 416,
            headers,
            body: None,
        }
    }
}

#[derive(Clone)]
pub struct StaticHandlerConfig {
    pub root: PathBuf,
    /// Prepended to every discovered URI; empty for a handler mounted at
    /// the server root.
    pub uri_prefix: String,
    pub matcher: Option<PathMatcher>,
    pub conf_mod: ConfMod,
    pub default_gzip: bool,
    pub default_cache: bool,
    /// Where `DiskCached` gzip copies are written. Defaults to a
    /// `conduit-static-gzip` directory under the system tmp dir.
    pub gzip_tmp_dir: PathBuf,
}

impl StaticHandlerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            uri_prefix: String::new(),
            matcher: None,
            conf_mod: Arc::new(|_path| FileConfOverride::default()),
            default_gzip: false,
            default_cache: false,
            gzip_tmp_dir: std::env::temp_dir().join("conduit-static-gzip"),
        }
    }
}

pub struct StaticHandler {
    state: Arc<monitor::MonitorState>,
}

impl StaticHandler {
    /// Walks `config.root` and populates `uri2info`, then starts the
    /// background filesystem monitor.
    pub async fn new(config: StaticHandlerConfig) -> Result<Self> {
        let state = Arc::new(monitor::MonitorState::new(
            config.root,
            config.uri_prefix,
            config.matcher,
            config.conf_mod,
            config.default_gzip,
            config.default_cache,
            config.gzip_tmp_dir,
        ));
        monitor::touch_and_ensure_running(&state).await?;
        Ok(Self { state })
    }

    /// Records request activity and, if the monitor had gone idle,
    /// restarts it (draining accumulated filesystem changes) on a
    /// detached task rather than suspending the caller.
    fn kick_monitor(&self) {
        let state = self.state.clone();
        tokio::spawn(async move {
            if let Err(e) = monitor::touch_and_ensure_running(&state).await {
                log::warn!("static handler: monitor restart failed: {e}");
            }
        });
    }

    /// Stops the background filesystem monitor. Idempotent; a handler
    /// that had already gone idle has nothing to cancel. `handle`/`uri`
    /// remain callable afterward and simply restart the monitor again, the
    /// same as after an ordinary idle timeout.
    pub fn shutdown(&self) {
        monitor::stop(&self.state);
    }

    /// The tagged URI for `relative_path`, or
    /// `None` if no such file was discovered.
    pub fn uri(&self, relative_path: &str) -> Option<String> {
        self.kick_monitor();
        let full = format!("{}/{}", self.state.uri_prefix, uri_path::encode_path(relative_path));
        let info = self.state.uri2info.get(&full)?;
        Some(format!("{full}?{}", uri_path::encode_tag(&info.etag)))
    }

    pub fn handle(&self, request: &StaticRequest) -> Response {
        self.kick_monitor();

        if !matches!(request.method, Method::Get | Method::Head) {
            return Response::method_not_allowed();
        }
        if request.path.is_empty() || !request.path.starts_with('/') {
            return Response::bad_request();
        }

        let Some(info) = self.state.uri2info.get(&request.path) else {
            return Response::not_found();
        };
        let info = info.clone();

        let serve_gzip = request.accept_gzip && info.gzip != GzipPolicy::Disabled;
        let served_etag = if serve_gzip { info.gzip_etag() } else { info.etag.clone() };
        let tag_state = match &request.query {
            None => TagState::Untagged,
            Some(q) if uri_path::tag_matches(Some(q), &served_etag) => TagState::Hit,
            Some(_) => TagState::Miss,
        };

        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", info.content_type.render());
        if info.gzip != GzipPolicy::Disabled {
            headers.insert("Vary", "Accept-Encoding");
        }
        if serve_gzip {
            headers.insert("Content-Encoding", "gzip");
        }
        headers.insert("ETag", served_etag.clone());
        headers.insert("Last-Modified", http_date(info.mtime));
        if let Some(expires) = resolve_expires(&info, tag_state) {
            headers.insert("Expires", http_date(expires));
        }
        for (k, v) in &info.extra_headers {
            headers.append(k, v.clone());
        }

        if is_conditional_hit(request, &served_etag, info.mtime) {
            return Response::not_modified(headers);
        }

        // Range requests are only meaningful against the representation
        // whose byte offsets the client can observe; a gzip body's
        // compressed length isn't known without building it first, so a
        // range request against a gzipped response is served in full.
        if !serve_gzip {
            if let Some(raw_range) = &request.range {
                match parse_range(raw_range, info.size) {
                    RangeOutcome::Satisfiable(start, end) => {
                        headers.insert(
                            "Content-Range",
                            format!("bytes {start}-{end}/{}", info.size),
                        );
                        headers.insert("Content-Length", (end - start + 1).to_string());
                        let body: Option<DynByteSource> = if request.method == Method::Head {
                            None
                        } else {
                            let origin = PooledFileSource::new(&info.disk_path);
                            Some(Box::new(RangedByteSource::new(origin, start, end + 1)))
                        };
                        return Response {
                            status: 206,
                            headers,
                            body,
                        };
                    }
                    RangeOutcome::Unsatisfiable => {
                        return Response::range_not_satisfiable(headers, info.size);
                    }
                    RangeOutcome::None => {}
                }
            }
        }

        let body: Option<DynByteSource> = if request.method == Method::Head {
            None
        } else if serve_gzip {
            Some(Box::new(GzipBody::Pending {
                info: info.clone(),
                state: self.state.clone(),
            }))
        } else {
            headers.insert("Content-Length", info.size.to_string());
            Some(Box::new(PooledFileSource::new(&info.disk_path)))
        };

        Response {
            status: 200,
            headers,
            body,
        }
    }
}

/// Whether `request` carries a conditional-request header that the
/// response's etag/mtime already satisfies. `If-None-Match` takes
/// precedence over `If-Modified-Since` when both are present, matching
/// ordinary HTTP conditional-request precedence.
fn is_conditional_hit(request: &StaticRequest, served_etag: &str, mtime: SystemTime) -> bool {
    if let Some(inm) = &request.if_none_match {
        return inm.trim() == served_etag || inm.trim() == "*";
    }
    if let Some(ims) = &request.if_modified_since {
        if let Some(since) = parse_http_date(ims) {
            return !mtime_after(mtime, since);
        }
    }
    false
}

/// HTTP dates have one-second resolution; compare at that granularity so a
/// `SystemTime`'s sub-second component never spuriously defeats a match.
fn mtime_after(mtime: SystemTime, since: SystemTime) -> bool {
    let secs = |t: SystemTime| t.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    secs(mtime) > secs(since)
}

fn parse_http_date(s: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(s.trim()).ok().map(SystemTime::from)
}

/// The result of parsing a `Range` request header against a file of size
/// `total`.
#[derive(Debug, PartialEq, Eq)]
enum RangeOutcome {
    /// No `Range` header, or one this handler doesn't support (multiple
    /// ranges): serve the usual full 200 response.
    None,
    /// A single byte range, inclusive on both ends, within `[0, total)`.
    Satisfiable(u64, u64),
    /// A `Range` header was present but names no byte of the file.
    Unsatisfiable,
}

/// Parses a single-range `bytes=start-end` header (either bound optional)
/// against a file of size `total`. A multi-range header (containing a
/// comma) is treated as unsupported, not malformed, so the request falls
/// back to a normal 200.
fn parse_range(header: &str, total: u64) -> RangeOutcome {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeOutcome::None;
    };
    if spec.contains(',') {
        return RangeOutcome::None;
    }
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeOutcome::None;
    };

    if total == 0 {
        return RangeOutcome::Unsatisfiable;
    }

    let (start, end) = if start_str.is_empty() {
        // Suffix range: last `end_str` bytes.
        let Ok(suffix_len) = end_str.parse::<u64>() else {
            return RangeOutcome::None;
        };
        if suffix_len == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        let start = total.saturating_sub(suffix_len);
        (start, total - 1)
    } else {
        let Ok(start) = start_str.parse::<u64>() else {
            return RangeOutcome::None;
        };
        let end = if end_str.is_empty() {
            total - 1
        } else {
            match end_str.parse::<u64>() {
                Ok(e) => e.min(total - 1),
                Err(_) => return RangeOutcome::None,
            }
        };
        (start, end)
    };

    if start >= total || start > end {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Satisfiable(start, end)
}

/// Whether the request's query component named a tagged URI, and if so
/// whether it matched the served etag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagState {
    /// No query component at all: plain URI, file's own policy applies.
    Untagged,
    /// Query matched the served etag.
    Hit,
    /// Query was present but didn't match (stale or wrong tag).
    Miss,
}

/// Forces a distant-future `Expires` on a tagged-URI hit, immediate
/// expiration on a tagged-URI miss, and otherwise falls back to the
/// file's own policy.
fn resolve_expires(info: &FileInfo, tag_state: TagState) -> Option<SystemTime> {
    match tag_state {
        TagState::Hit => Some(SystemTime::now() + std::time::Duration::from_secs(365 * 24 * 3600)),
        TagState::Miss => Some(SystemTime::now()),
        TagState::Untagged => match info.expires {
            ExpiresPolicy::None => None,
            ExpiresPolicy::Absolute(t) => Some(t),
            ExpiresPolicy::Relative(d) => Some(SystemTime::now() + d),
        },
    }
}

fn http_date(t: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = t.into();
    datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The gzip body source for a response: built (from the handler's memory
/// or disk cache, per `FileInfo::gzip`) on the first `read`, so a
/// HEAD-then-GET or a tagged-URI hit never pays the compression cost.
enum GzipBody {
    Pending {
        info: Arc<FileInfo>,
        state: Arc<monitor::MonitorState>,
    },
    Memory(Arc<Vec<u8>>, usize),
    Disk(SimpleFileSource),
}

impl ByteSource for GzipBody {
    async fn read(&mut self) -> Result<crate::buf::Buffer> {
        loop {
            match self {
                GzipBody::Pending { info, state } => {
                    *self = match info.gzip {
                        GzipPolicy::MemoryCached => {
                            let bytes = state.gzip_memory_cache.get_or_create(info).await?;
                            GzipBody::Memory(bytes, 0)
                        }
                        GzipPolicy::DiskCached => {
                            let path = state.gzip_disk_cache.get_or_create(info).await?;
                            GzipBody::Disk(SimpleFileSource::new(&path))
                        }
                        GzipPolicy::Disabled => {
                            // `handle()` only builds a `GzipBody` when `serve_gzip`
                            // is true, which already implies `gzip != Disabled`.
                            unreachable!("GzipBody constructed for a non-gzipped file")
                        }
                    };
                }
                GzipBody::Memory(bytes, pos) => {
                    if *pos >= bytes.len() {
                        return Err(crate::error::Error::end());
                    }
                    let end = (*pos + 16 * 1024).min(bytes.len());
                    let chunk = bytes[*pos..end].to_vec();
                    *pos = end;
                    return Ok(crate::buf::Buffer::from(chunk));
                }
                GzipBody::Disk(src) => return src.read().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_request(path: &str) -> StaticRequest {
        StaticRequest {
            method: Method::Get,
            path: path.to_string(),
            query: None,
            accept_gzip: false,
            if_none_match: None,
            if_modified_since: None,
            range: None,
        }
    }

    #[tokio::test]
    async fn serves_a_discovered_file_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let resp = handler.handle(&basic_request("/a.txt"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers.get("Content-Type"), Some("text/plain"));
        assert!(resp.headers.contains("ETag"));
        assert!(resp.headers.contains("Last-Modified"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();
        let resp = handler.handle(&basic_request("/nope.txt"));
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn post_is_405_with_allow_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();
        let mut req = basic_request("/a.txt");
        req.method = Method::Other;
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 405);
        assert_eq!(resp.headers.get("Allow"), Some("GET, HEAD"));
    }

    #[tokio::test]
    async fn tagged_uri_hit_forces_a_distant_future_expires() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let tagged = handler.uri("a.txt").unwrap();
        let (path, query) = tagged.split_once('?').unwrap();
        let req = StaticRequest {
            method: Method::Get,
            path: path.to_string(),
            query: Some(query.to_string()),
            accept_gzip: false,
            if_none_match: None,
            if_modified_since: None,
            range: None,
        };
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 200);
        let expires = resp.headers.get("Expires").unwrap();
        let parsed = chrono::DateTime::parse_from_rfc2822(expires).unwrap();
        assert!(parsed.timestamp() > chrono::Utc::now().timestamp() + 3600 * 24 * 300);
    }

    #[tokio::test]
    async fn stale_tagged_uri_forces_immediate_expiration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let req = StaticRequest {
            method: Method::Get,
            path: "/a.txt".to_string(),
            query: Some("t-stale-wrong-tag".to_string()),
            accept_gzip: false,
            if_none_match: None,
            if_modified_since: None,
            range: None,
        };
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 200);
        let expires = resp.headers.get("Expires").unwrap();
        let parsed = chrono::DateTime::parse_from_rfc2822(expires).unwrap();
        assert!(parsed.timestamp() <= chrono::Utc::now().timestamp() + 5);
    }

    #[tokio::test]
    async fn shutdown_stops_the_monitor_and_handle_still_works() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        handler.shutdown();
        // The monitor restarts (and drains) on the next request rather
        // than leaving the handler permanently unusable.
        let resp = handler.handle(&basic_request("/a.txt"));
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn head_request_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();
        let mut req = basic_request("/a.txt");
        req.method = Method::Head;
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_none());
    }

    #[tokio::test]
    async fn matching_if_none_match_is_304_with_no_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let plain = handler.handle(&basic_request("/a.txt"));
        let etag = plain.headers.get("ETag").unwrap().to_string();

        let mut req = basic_request("/a.txt");
        req.if_none_match = Some(etag.clone());
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 304);
        assert!(resp.body.is_none());
        assert_eq!(resp.headers.get("ETag"), Some(etag.as_str()));
    }

    #[tokio::test]
    async fn mismatched_if_none_match_serves_the_full_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        req.if_none_match = Some("\"not-the-real-tag\"".to_string());
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn if_modified_since_in_the_future_of_mtime_is_304() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        let far_future = SystemTime::now() + std::time::Duration::from_secs(3600);
        req.if_modified_since = Some(http_date(far_future));
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 304);
    }

    #[tokio::test]
    async fn range_request_serves_206_with_content_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        req.range = Some("bytes=2-5".to_string());
        let mut resp = handler.handle(&req);
        assert_eq!(resp.status, 206);
        assert_eq!(resp.headers.get("Content-Range"), Some("bytes 2-5/10"));
        assert_eq!(resp.headers.get("Content-Length"), Some("4"));

        let body = resp.body.as_mut().unwrap();
        let bytes = body.read_all(1024).await.unwrap();
        assert_eq!(bytes, b"2345");
    }

    #[tokio::test]
    async fn suffix_range_serves_the_last_n_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        req.range = Some("bytes=-3".to_string());
        let mut resp = handler.handle(&req);
        assert_eq!(resp.status, 206);
        assert_eq!(resp.headers.get("Content-Range"), Some("bytes 7-9/10"));
        let body = resp.body.as_mut().unwrap();
        assert_eq!(body.read_all(1024).await.unwrap(), b"789");
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_416() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        req.range = Some("bytes=100-200".to_string());
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 416);
        assert_eq!(resp.headers.get("Content-Range"), Some("bytes */10"));
    }

    #[tokio::test]
    async fn multi_range_request_falls_back_to_a_full_200() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let handler = StaticHandler::new(StaticHandlerConfig::new(dir.path())).await.unwrap();

        let mut req = basic_request("/a.txt");
        req.range = Some("bytes=0-1,3-4".to_string());
        let resp = handler.handle(&req);
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn range_parsing_covers_all_forms() {
        assert_eq!(parse_range("bytes=2-5", 10), RangeOutcome::Satisfiable(2, 5));
        assert_eq!(parse_range("bytes=5-", 10), RangeOutcome::Satisfiable(5, 9));
        assert_eq!(parse_range("bytes=-3", 10), RangeOutcome::Satisfiable(7, 9));
        assert_eq!(parse_range("bytes=5-100", 10), RangeOutcome::Satisfiable(5, 9));
        assert_eq!(parse_range("bytes=100-200", 10), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 10), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-1,3-4", 10), RangeOutcome::None);
        assert_eq!(parse_range("not-bytes=0-1", 10), RangeOutcome::None);
        assert_eq!(parse_range("bytes=0-5", 0), RangeOutcome::Unsatisfiable);
    }
}
