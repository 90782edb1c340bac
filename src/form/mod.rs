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

//! The form-data pipeline: URL-encoded and multipart parsing
//! into one `FormData` result, with CSRF detection layered on top.

pub mod csrf;
pub mod multipart_form;
pub mod urlencoded;

use std::collections::HashMap;
use std::path::PathBuf;

pub use csrf::{check_csrf, enforce_csrf, generate_token, CsrfConfig, CsrfOutcome};
pub use multipart_form::parse_multipart_form;

/// Bounds every parser in this module; all limits are
/// counted in bytes or entry counts, never wall-clock time.
#[derive(Clone, Copy, Debug)]
pub struct FormLimits {
    pub max_entry_key_bytes: usize,
    pub max_param_value_total_bytes: usize,
    pub max_param_entries: usize,
    pub max_file_size: u64,
    pub max_file_entries: usize,
    pub max_file_name_bytes: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            max_entry_key_bytes: 256,
            max_param_value_total_bytes: 1024 * 1024,
            max_param_entries: 1024,
            max_file_size: 10 * 1024 * 1024,
            max_file_entries: 64,
            max_file_name_bytes: 256,
        }
    }
}

/// A parsed file upload: the form parser owns the
/// temp file until the caller takes it over with [`FormDataFile::delete`]
/// or simply leaves it for process cleanup.
#[derive(Clone, Debug)]
pub struct FormDataFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub path: PathBuf,
    pub size: u64,
}

impl FormDataFile {
    /// Removes the backing temp file. Errors are not fatal to the caller's
    /// flow; they're returned for logging.
    pub fn delete(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }
}

/// The result of parsing either an URL-encoded or a multipart form body:
/// name-ordered parameter values and file uploads, keyed by field name.
#[derive(Clone, Debug, Default)]
pub struct FormData {
    pub params: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<FormDataFile>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }
}
