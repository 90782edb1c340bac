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

//! Drives [`MultipartParser`] to build a [`FormData`]: a part
//! without `filename` is a parameter, accumulated in memory; a part with a
//! non-empty `filename` is streamed to a fresh temp file under
//! `tmp_dir`; a part with an empty `filename` is the "no file selected"
//! browser sentinel and is skipped entirely.

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::{Error, ErrorKind, Result};
use crate::form::{FormData, FormDataFile, FormLimits};
use crate::http::headparse::HeaderLimits;
use crate::io::file::FileByteSink;
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;
use crate::multipart::MultipartParser;

/// Parses `Content-Disposition: form-data; name="..."; filename="..."`
/// into its `name`/`filename` parameters. Unlike `ContentType`, this
/// header has no `type/subtype` prefix, just `form-data` followed by
/// parameters, so it gets its own small parser rather than reusing
/// `ContentType`.
fn parse_disposition(value: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut filename = None;
    let mut parts = value.split(';');
    parts.next(); // "form-data"
    for part in parts {
        let part = part.trim();
        let Some((key, raw_value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(raw_value.trim());
        match key.as_str() {
            "name" => name = Some(value),
            "filename" => filename = Some(value),
            _ => {}
        }
    }
    (name, filename)
}

fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn random_temp_name() -> String {
    (&mut thread_rng())
        .sample_iter(Alphanumeric)
        .map(char::from)
        .take(24)
        .collect()
}

async fn spill_to_temp_file<S: ByteSource>(
    body: &mut S,
    tmp_dir: &Path,
    limits: &FormLimits,
) -> Result<(PathBuf, u64)> {
    let path = tmp_dir.join(format!("conduit-upload-{}", random_temp_name()));
    let mut sink = FileByteSink::new(&path);
    let mut size: u64 = 0;
    loop {
        match body.read().await {
            Ok(buf) => {
                size += buf.len() as u64;
                if size > limits.max_file_size {
                    let _ = sink.error(Error::over_limit(
                        "maxFileSize",
                        size,
                        limits.max_file_size,
                    )).await;
                    let _ = std::fs::remove_file(&path);
                    return Err(Error::over_limit("maxFileSize", size, limits.max_file_size));
                }
                sink.write(buf).await?;
            }
            Err(e) if e.is_end() => break,
            Err(e) => {
                let _ = sink.error(Error::new(ErrorKind::Io, "upload body read failed")).await;
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        }
    }
    sink.close().await?;
    Ok((path, size))
}

/// Consumes `origin` as a `multipart/form-data` body with the given
/// `boundary`, streaming file parts to `tmp_dir`.
pub async fn parse_multipart_form<S: ByteSource>(
    origin: S,
    boundary: &str,
    tmp_dir: &Path,
    limits: &FormLimits,
) -> Result<FormData> {
    let mut parser = MultipartParser::new(origin, boundary, HeaderLimits::default());
    let mut form = FormData::new();
    let mut file_entries = 0usize;

    while let Some(mut part) = parser.try_get_next_part().await? {
        let disposition = part
            .headers
            .get("content-disposition")
            .ok_or_else(|| Error::new(ErrorKind::Protocol, "multipart part missing Content-Disposition"))?
            .to_string();
        let (name, filename) = parse_disposition(&disposition);
        let name = name.ok_or_else(|| {
            Error::new(ErrorKind::Protocol, "multipart part missing Content-Disposition name")
        })?;

        match filename {
            None => {
                let value = part.body.as_string(limits.max_param_value_total_bytes).await?;
                form.params.entry(name).or_default().push(value);
            }
            Some(filename) if filename.is_empty() => {
                drain(&mut part.body).await?;
            }
            Some(filename) => {
                if filename.len() > limits.max_file_name_bytes {
                    return Err(Error::over_limit(
                        "maxFileNameBytes",
                        filename.len() as u64,
                        limits.max_file_name_bytes as u64,
                    ));
                }
                file_entries += 1;
                if file_entries > limits.max_file_entries {
                    return Err(Error::over_limit(
                        "maxFileEntries",
                        file_entries as u64,
                        limits.max_file_entries as u64,
                    ));
                }
                let content_type = part.headers.get("content-type").map(|s| s.to_string());
                let (path, size) = spill_to_temp_file(&mut part.body, tmp_dir, limits).await?;
                form.files.entry(name).or_default().push(FormDataFile {
                    filename,
                    content_type,
                    path,
                    size,
                });
            }
        }
    }

    Ok(form)
}

async fn drain<B: ByteSource>(body: &mut B) -> Result<()> {
    loop {
        match body.read().await {
            Ok(_) => continue,
            Err(e) if e.is_end() => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::test_support::VecSource;

    #[tokio::test]
    async fn parses_a_field_and_a_file_from_one_multipart_body() {
        let raw = concat!(
            "--X\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\n42\r\n",
            "--X\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\nhello\r\n--X--\r\n"
        );
        let dir = tempfile::tempdir().unwrap();
        let form = parse_multipart_form(
            VecSource::new(vec![raw.as_bytes().to_vec()]),
            "X",
            dir.path(),
            &FormLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(form.param("x"), Some("42"));
        let files = form.files.get("f").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[0].content_type.as_deref(), Some("text/plain"));
        assert_eq!(files[0].size, 5);
        assert_eq!(std::fs::read_to_string(&files[0].path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_filename_is_treated_as_no_file_selected() {
        let raw = "--X\r\nContent-Disposition: form-data; name=\"f\"; filename=\"\"\r\n\r\n\r\n--X--\r\n";
        let dir = tempfile::tempdir().unwrap();
        let form = parse_multipart_form(
            VecSource::new(vec![raw.as_bytes().to_vec()]),
            "X",
            dir.path(),
            &FormLimits::default(),
        )
        .await
        .unwrap();
        assert!(form.files.is_empty());
        assert!(form.params.is_empty());
    }

    #[tokio::test]
    async fn missing_content_disposition_is_a_protocol_error() {
        let raw = "--X\r\nContent-Type: text/plain\r\n\r\nbody\r\n--X--\r\n";
        let dir = tempfile::tempdir().unwrap();
        let err = parse_multipart_form(
            VecSource::new(vec![raw.as_bytes().to_vec()]),
            "X",
            dir.path(),
            &FormLimits::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_and_temp_file_removed() {
        let raw = "--X\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.bin\"\r\n\r\n0123456789\r\n--X--\r\n";
        let dir = tempfile::tempdir().unwrap();
        let limits = FormLimits {
            max_file_size: 5,
            ..Default::default()
        };
        let err = parse_multipart_form(
            VecSource::new(vec![raw.as_bytes().to_vec()]),
            "X",
            dir.path(),
            &limits,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverLimit);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
