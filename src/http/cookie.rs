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

//! Request `Cookie` header parsing and `Set-Cookie` rendering, just the
//! slice the form/CSRF pipeline needs; a full cookie jar is
//! explicitly out of scope.

fn is_cookie_name_char(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}')
}

/// Is `name` a valid cookie-name token (RFC 6265 `token`)?
pub fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_cookie_name_char)
}

/// Parses a `Cookie: a=1; b=2` header value into name/value pairs, in the
/// order sent. Malformed pairs (no `=`) are skipped.
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Look up one cookie by name (case-sensitive, per RFC 6265) in an
/// already-parsed `Cookie` header.
pub fn find_cookie<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Renders a minimal session cookie: `name=value; Path=/; HttpOnly`.
pub fn render_set_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; Path=/; HttpOnly")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_pairs() {
        let cookies = parse_cookie_header("a=1; b=2;c=3");
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn find_cookie_is_case_sensitive() {
        let cookies = parse_cookie_header("_csrf_token=abc123");
        assert_eq!(find_cookie(&cookies, "_csrf_token"), Some("abc123"));
        assert_eq!(find_cookie(&cookies, "_CSRF_TOKEN"), None);
    }

    #[test]
    fn validates_cookie_name_tokens() {
        assert!(is_valid_cookie_name("_csrf_token"));
        assert!(!is_valid_cookie_name("has space"));
        assert!(!is_valid_cookie_name(""));
    }

    #[test]
    fn renders_a_minimal_set_cookie() {
        assert_eq!(
            render_set_cookie("_csrf_token", "abc123"),
            "_csrf_token=abc123; Path=/; HttpOnly"
        );
    }
}
