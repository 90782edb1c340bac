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

//! Minimal percent-encoding for static-handler URIs and tagged-URI
//! query tags: escape only what the URL-safe set excludes, leaving a
//! path mostly readable (`/uriPrefix/x/a%20b.txt?<tag>`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped: alphanumerics plus `-_.~/`. Everything else
/// (spaces, `?`, `#`, non-ASCII, ...) is escaped as `%HH`.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Same as [`PATH_SAFE`] but without the `/` exception, for the etag tag
/// on the query string, which has no path structure to preserve.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encodes a relative file path for use as a URI, preserving `/`
/// as a path separator.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SAFE).to_string()
}

/// Percent-encodes an etag for the tagged-URI query string.
pub fn encode_tag(etag: &str) -> String {
    utf8_percent_encode(etag, QUERY_SAFE).to_string()
}

/// Decodes a tagged-URI query tag back to its original bytes. `+` is
/// treated as a literal space on the way in, matching how a generic
/// query-string decoder would read it, even though [`encode_tag`] never
/// produces one — this is a deliberate asymmetry (see DESIGN.md).
pub fn decode_tag(tag: &str) -> String {
    let with_spaces = tag.replace('+', " ");
    percent_decode_str(&with_spaces).decode_utf8_lossy().into_owned()
}

/// Whether `query` (the raw string after `?` in the request URI, if any)
/// is the tagged form for `etag`: decodes `query` the same way
/// [`encode_tag`]/[`decode_tag`] round-trip and compares to the plain
/// etag.
pub fn tag_matches(query: Option<&str>, etag: &str) -> bool {
    match query {
        Some(q) => decode_tag(q) == etag,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_path_escapes_space_but_keeps_slashes() {
        assert_eq!(encode_path("x/a b.txt"), "x/a%20b.txt");
    }

    #[test]
    fn round_trips_a_typical_etag() {
        let etag = "t-5f3759df-1a2b3c";
        let tag = encode_tag(etag);
        assert!(tag_matches(Some(&tag), etag));
    }

    #[test]
    fn plus_decodes_as_space_even_though_never_emitted() {
        assert_eq!(decode_tag("a+b"), "a b");
        assert!(!tag_matches(Some("a+b"), "a+b"));
    }

    #[test]
    fn missing_query_never_matches() {
        assert!(!tag_matches(None, "t-anything"));
    }
}
