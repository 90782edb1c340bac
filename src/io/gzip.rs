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

//! `GzipByteSource` streams an origin through deflate, producing RFC 1952
//! gzip framing: a fixed 10-byte header, the compressed body,
//! then an 8-byte trailer (CRC-32 and the uncompressed length mod 2^32).
//! State machine: `Header → Body → Trailer → Done`, plus `Closed` once the
//! caller closes the source. No filename or comment field is emitted.

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::source::ByteSource;

/// Caps each chunk handed to the deflater in one call, so one oversized
/// origin buffer can't dominate a single `read()`.
const INPUT_CHUNK_CAP: usize = 32 * 1024;
const OUTPUT_SCRATCH: usize = 8 * 1024;

const GZIP_HEADER: [u8; 10] = [
    0x1f, 0x8b, // magic
    0x08, // CM = deflate
    0x00, // FLG = none
    0x00, 0x00, 0x00, 0x00, // MTIME = 0 (unknown)
    0x00, // XFL
    0xff, // OS = unknown
];

#[derive(PartialEq, Eq, Debug)]
enum Stage {
    Header,
    Body,
    Trailer,
    Done,
    Closed,
}

pub struct GzipByteSource<S> {
    inner: S,
    compress: Compress,
    crc: flate2::Crc,
    stage: Stage,
    uncompressed_len: u32,
}

impl<S: ByteSource> GzipByteSource<S> {
    /// `level` is 0 (no compression) through 9 (best compression).
    pub fn new(inner: S, level: u32) -> Self {
        Self {
            inner,
            compress: Compress::new(Compression::new(level.min(9)), false),
            crc: flate2::Crc::new(),
            stage: Stage::Header,
            uncompressed_len: 0,
        }
    }

    fn compress_chunk(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut scratch = vec![0u8; OUTPUT_SCRATCH];
        let mut consumed = 0usize;
        while consumed < input.len() {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();
            self.compress
                .compress(&input[consumed..], &mut scratch, FlushCompress::None)
                .map_err(|e| {
                    Error::new(ErrorKind::Protocol, "gzip: deflate stream error").set_source(e)
                })?;
            let gained_in = (self.compress.total_in() - before_in) as usize;
            let gained_out = (self.compress.total_out() - before_out) as usize;
            consumed += gained_in;
            out.extend_from_slice(&scratch[..gained_out]);
            if gained_in == 0 && gained_out == 0 {
                return Err(Error::new(ErrorKind::Unexpected, "gzip: deflate made no progress"));
            }
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let mut scratch = vec![0u8; OUTPUT_SCRATCH];
            let before_out = self.compress.total_out();
            let status = self
                .compress
                .compress(&[], &mut scratch, FlushCompress::Finish)
                .map_err(|e| {
                    Error::new(ErrorKind::Protocol, "gzip: deflate finish error").set_source(e)
                })?;
            out.extend_from_slice(&scratch[..(self.compress.total_out() - before_out) as usize]);
            if status == Status::StreamEnd {
                break;
            }
        }
        Ok(out)
    }
}

impl<S: ByteSource> ByteSource for GzipByteSource<S> {
    async fn read(&mut self) -> Result<Buffer> {
        loop {
            match self.stage {
                Stage::Header => {
                    self.stage = Stage::Body;
                    return Ok(Buffer::from(&GZIP_HEADER[..]));
                }
                Stage::Body => match self.inner.read().await {
                    Ok(buf) => {
                        let bytes = buf.to_bytes();
                        if bytes.is_empty() {
                            continue;
                        }
                        self.crc.update(&bytes);
                        self.uncompressed_len =
                            self.uncompressed_len.wrapping_add(bytes.len() as u32);
                        let mut produced = Vec::new();
                        for chunk in bytes.chunks(INPUT_CHUNK_CAP) {
                            produced.extend(self.compress_chunk(chunk)?);
                        }
                        if produced.is_empty() {
                            continue;
                        }
                        return Ok(Buffer::from(produced));
                    }
                    Err(e) if e.is_end() => {
                        self.stage = Stage::Trailer;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                Stage::Trailer => {
                    let mut out = self.finish()?;
                    out.extend_from_slice(&self.crc.sum().to_le_bytes());
                    out.extend_from_slice(&self.uncompressed_len.to_le_bytes());
                    self.stage = Stage::Done;
                    return Ok(Buffer::from(out));
                }
                Stage::Done | Stage::Closed => return Err(Error::end()),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.stage != Stage::Closed {
            self.stage = Stage::Closed;
            self.inner.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;
    use std::io::Read;

    fn gunzip(bytes: &[u8]) -> Vec<u8> {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn gunzip_of_compress_round_trips() {
        let data = "hello".repeat(1000).into_bytes();
        let mut src = GzipByteSource::new(VecSource::whole(&data, 777), 6);
        let compressed = src.read_all(10 << 20).await.unwrap();
        assert_eq!(gunzip(&compressed), data);
    }

    #[tokio::test]
    async fn header_is_ten_bytes_with_rfc1952_magic() {
        let mut src = GzipByteSource::new(VecSource::new(vec![b"x".to_vec()]), 9);
        let first = src.read().await.unwrap();
        let bytes = first.to_bytes();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..3], &[0x1f, 0x8b, 0x08]);
    }

    #[tokio::test]
    async fn empty_source_still_produces_a_valid_gzip_stream() {
        let mut src = GzipByteSource::new(VecSource::new(vec![]), 1);
        let compressed = src.read_all(1024).await.unwrap();
        assert_eq!(gunzip(&compressed), b"");
    }
}
