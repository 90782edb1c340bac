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

//! `HeaderMap`: a case-insensitive ordered multimap. Each
//! distinct name retains one canonical display form — the well-known
//! capitalization for headers this crate recognizes, otherwise whatever
//! case the name was first inserted with. Not thread-safe: a
//! `HeaderMap` lives on the task that owns the request/response.

use std::collections::HashMap;

/// Headers whose canonical capitalization this crate fixes regardless of
/// how a caller spells them.
const WELL_KNOWN: &[&str] = &[
    "Content-Type",
    "Content-Length",
    "Content-Disposition",
    "Content-Encoding",
    "Host",
    "Cookie",
    "Set-Cookie",
    "ETag",
    "Last-Modified",
    "Expires",
    "Vary",
    "Origin",
    "Referer",
    "Allow",
    "Connection",
    "Transfer-Encoding",
    "Location",
    "Date",
    "Accept-Encoding",
    "User-Agent",
];

fn well_known_canonical(lower: &str) -> Option<&'static str> {
    WELL_KNOWN.iter().find(|h| h.eq_ignore_ascii_case(lower)).copied()
}

#[derive(Clone, Debug, Default)]
pub struct HeaderMap {
    /// (canonical name, value) pairs, duplicates preserved in insertion
    /// order for multi-value headers (`Set-Cookie` and the like).
    entries: Vec<(String, String)>,
    /// Lower-cased name -> canonical display form seen for this instance.
    canonical: HashMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn canonicalize(&mut self, name: &str) -> String {
        let lower = name.to_ascii_lowercase();
        if let Some(known) = well_known_canonical(&lower) {
            return known.to_string();
        }
        self.canonical
            .entry(lower)
            .or_insert_with(|| name.to_string())
            .clone()
    }

    /// Add a value without removing any existing ones for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let canonical = self.canonicalize(name);
        self.entries.push((canonical, value.into()));
    }

    /// Replace all existing values for `name` with a single new one.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let canonical = self.canonicalize(name);
        self.entries.retain(|(n, _)| n != &canonical);
        self.entries.push((canonical, value.into()));
    }

    /// The first value for `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(&lower))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes every value for `name`; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&lower));
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
