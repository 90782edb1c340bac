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

//! File-backed source and sink, reading/writing through a
//! 16 KiB buffer. Two channel providers exist:
//!
//! - [`SimpleFileSource`]/[`FileByteSink`]: open on first use, close on
//!   source/sink close. One handle, one owner.
//! - [`PooledFileSource`]: many concurrent readers of one file share a
//!   single reference-counted `std::fs::File`, opened lazily and closed
//!   when the last reader drops it. A broken channel is held until the
//!   refcount drops to zero — new readers typically reopen quickly, a
//!   known brittleness carried over from the source design.
//!
//! Positional reads for the pooled case go through
//! `std::os::unix::fs::FileExt::read_at` on a blocking-pool thread so
//! concurrent readers never contend on a shared seek cursor. The pooled
//! provider's first-reader open also runs on a blocking-pool thread, for
//! the same reason reads do: a slow or contended open must not stall the
//! calling task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use once_cell::sync::Lazy;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

pub const FILE_BUFFER_SIZE: usize = 16 * 1024;

/// Opens on the first `read`, closes when the source is dropped or closed.
pub struct SimpleFileSource {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    position: u64,
}

impl SimpleFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            position: 0,
        }
    }

    async fn ensure_open(&mut self) -> Result<&mut tokio::fs::File> {
        if self.file.is_none() {
            let f = tokio::fs::File::open(&self.path).await.map_err(|e| {
                Error::new(ErrorKind::Io, format!("opening {}", self.path.display())).set_source(e)
            })?;
            self.file = Some(f);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

impl ByteSource for SimpleFileSource {
    async fn read(&mut self) -> Result<Buffer> {
        let position = self.position;
        let file = self.ensure_open().await?;
        file.seek(std::io::SeekFrom::Start(position))
            .await
            .map_err(Error::from)?;
        let mut buf = vec![0u8; FILE_BUFFER_SIZE];
        let n = file.read(&mut buf).await.map_err(Error::from)?;
        if n == 0 {
            return Err(Error::end());
        }
        buf.truncate(n);
        self.position += n as u64;
        Ok(Buffer::from(buf))
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        self.position += n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}

struct PooledEntry {
    file: std::fs::File,
    refcount: std::sync::atomic::AtomicUsize,
}

static POOL: Lazy<StdMutex<HashMap<PathBuf, Arc<PooledEntry>>>> =
    Lazy::new(|| StdMutex::new(HashMap::new()));

/// Acquires the pooled entry for `path`, opening it on a blocking-pool
/// thread if no reader currently holds it open. The open itself never runs
/// on the calling async task: a contended or slow filesystem open must not
/// stall the executor for every concurrent reader.
async fn pool_acquire(path: &Path) -> Result<Arc<PooledEntry>> {
    {
        let pool = POOL.lock().expect("file pool mutex poisoned");
        if let Some(entry) = pool.get(path) {
            entry.refcount.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            return Ok(entry.clone());
        }
    }

    let open_path = path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || std::fs::File::open(&open_path))
        .await
        .map_err(|e| Error::new(ErrorKind::Unexpected, "pooled file open task panicked").set_source(e))?
        .map_err(|e| Error::new(ErrorKind::Io, format!("opening {}", path.display())).set_source(e))?;

    let mut pool = POOL.lock().expect("file pool mutex poisoned");
    // Another task may have opened and inserted the same path while we were
    // blocked on our own open; in that case use theirs and let ours drop.
    if let Some(entry) = pool.get(path) {
        entry.refcount.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        return Ok(entry.clone());
    }
    let entry = Arc::new(PooledEntry {
        file,
        refcount: std::sync::atomic::AtomicUsize::new(1),
    });
    pool.insert(path.to_path_buf(), entry.clone());
    Ok(entry)
}

fn pool_release(path: &Path) {
    let mut pool = POOL.lock().expect("file pool mutex poisoned");
    if let Some(entry) = pool.get(path) {
        if entry.refcount.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) == 1 {
            pool.remove(path);
        }
    }
}

/// Many readers of the same path share one open `std::fs::File`,
/// refcounted; the file closes when the last reader releases it.
pub struct PooledFileSource {
    path: PathBuf,
    entry: Option<Arc<PooledEntry>>,
    position: u64,
}

impl PooledFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entry: None,
            position: 0,
        }
    }

    async fn ensure_acquired(&mut self) -> Result<Arc<PooledEntry>> {
        if self.entry.is_none() {
            self.entry = Some(pool_acquire(&self.path).await?);
        }
        Ok(self.entry.as_ref().unwrap().clone())
    }
}

impl ByteSource for PooledFileSource {
    async fn read(&mut self) -> Result<Buffer> {
        let entry = self.ensure_acquired().await?;
        let position = self.position;
        let (n, buf) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; FILE_BUFFER_SIZE];
            #[cfg(unix)]
            let n = std::os::unix::fs::FileExt::read_at(&entry.file, &mut buf, position)?;
            #[cfg(not(unix))]
            let n = {
                use std::io::{Read, Seek};
                let mut file = entry.file.try_clone()?;
                file.seek(std::io::SeekFrom::Start(position))?;
                file.read(&mut buf)?
            };
            Ok::<_, std::io::Error>((n, buf))
        })
        .await
        .map_err(|e| Error::new(ErrorKind::Unexpected, "pooled file read task panicked").set_source(e))?
        .map_err(Error::from)?;

        if n == 0 {
            return Err(Error::end());
        }
        self.position += n as u64;
        let mut buf = buf;
        buf.truncate(n);
        Ok(Buffer::from(buf))
    }

    async fn skip(&mut self, n: u64) -> Result<u64> {
        self.position += n;
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if self.entry.take().is_some() {
            pool_release(&self.path);
        }
        Ok(())
    }
}

impl Drop for PooledFileSource {
    fn drop(&mut self) {
        if self.entry.take().is_some() {
            pool_release(&self.path);
        }
    }
}

/// Writes sequentially at an advancing position; opens on first write,
/// closes (and flushes) on `close`.
pub struct FileByteSink {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    position: u64,
}

impl FileByteSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            position: 0,
        }
    }

    async fn ensure_open(&mut self) -> Result<&mut tokio::fs::File> {
        if self.file.is_none() {
            let f = tokio::fs::File::create(&self.path).await.map_err(|e| {
                Error::new(ErrorKind::Io, format!("creating {}", self.path.display())).set_source(e)
            })?;
            self.file = Some(f);
        }
        Ok(self.file.as_mut().unwrap())
    }
}

impl ByteSink for FileByteSink {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        let bytes = buf.to_bytes();
        let position = self.position;
        let file = self.ensure_open().await?;
        file.seek(std::io::SeekFrom::Start(position))
            .await
            .map_err(Error::from)?;
        file.write_all(&bytes).await.map_err(Error::from)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    async fn error(&mut self, _e: Error) -> Result<()> {
        self.file = None;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await.map_err(Error::from)?;
        }
        self.file = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_source_reads_a_file_written_by_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");

        let mut sink = FileByteSink::new(&path);
        sink.write(Buffer::from(Vec::from(&b"hello "[..]))).await.unwrap();
        sink.write(Buffer::from(Vec::from(&b"world"[..]))).await.unwrap();
        sink.close().await.unwrap();

        let mut src = SimpleFileSource::new(&path);
        let all = src.read_all(1024).await.unwrap();
        assert_eq!(all, b"hello world");
    }

    #[tokio::test]
    async fn two_pooled_readers_of_the_same_file_both_read_it_fully() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.txt");
        std::fs::write(&path, vec![9u8; FILE_BUFFER_SIZE * 3 + 17]).unwrap();

        let mut a = PooledFileSource::new(&path);
        let mut b = PooledFileSource::new(&path);
        let got_a = a.read_all(1 << 20).await.unwrap();
        let got_b = b.read_all(1 << 20).await.unwrap();
        assert_eq!(got_a.len(), FILE_BUFFER_SIZE * 3 + 17);
        assert_eq!(got_a, got_b);
    }

    #[tokio::test]
    async fn pool_entry_is_evicted_once_every_reader_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.txt");
        std::fs::write(&path, b"x").unwrap();

        let mut a = PooledFileSource::new(&path);
        a.read().await.unwrap();
        assert!(POOL.lock().unwrap().contains_key(&path));
        a.close().await.unwrap();
        assert!(!POOL.lock().unwrap().contains_key(&path));
    }
}
