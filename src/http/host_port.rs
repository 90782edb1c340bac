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

//! Parses a `Host` header (or the authority component of an absolute
//! `Origin`/`Referer` URL) into host and optional port, used by CSRF
//! same-origin checks. Handles bracketed IPv6 literals.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: Option<u16>,
}

impl HostPort {
    /// Parses a bare `host[:port]` authority, e.g. `example.com:8080` or
    /// `[::1]:8080`. Returns `None` for empty or malformed input.
    pub fn parse(authority: &str) -> Option<Self> {
        let authority = authority.trim();
        if authority.is_empty() {
            return None;
        }
        if let Some(rest) = authority.strip_prefix('[') {
            let end = rest.find(']')?;
            let host = rest[..end].to_string();
            let after = &rest[end + 1..];
            let port = match after.strip_prefix(':') {
                Some(p) => Some(p.parse().ok()?),
                None if after.is_empty() => None,
                None => return None,
            };
            return Some(Self { host, port });
        }
        match authority.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                Some(Self {
                    host: host.to_string(),
                    port: Some(port.parse().ok()?),
                })
            }
            _ => Some(Self {
                host: authority.to_string(),
                port: None,
            }),
        }
    }

    /// Extracts the authority from an absolute URL (as sent in `Origin`
    /// or `Referer`) and parses it; returns `None` if `url` has no
    /// recognizable `scheme://authority` prefix.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url.split_once("://")?.1;
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        Self::parse(&rest[..authority_end])
    }

    /// Compares host case-insensitively; port must match exactly (`None`
    /// only equals `None` — callers normalize default ports beforehand if
    /// that's the intended comparison).
    pub fn matches(&self, other: &HostPort) -> bool {
        self.host.eq_ignore_ascii_case(&other.host) && self.port == other.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let hp = HostPort::parse("example.com:8080").unwrap();
        assert_eq!(hp.host, "example.com");
        assert_eq!(hp.port, Some(8080));
    }

    #[test]
    fn parses_bare_host_without_port() {
        let hp = HostPort::parse("example.com").unwrap();
        assert_eq!(hp.port, None);
    }

    #[test]
    fn parses_bracketed_ipv6_with_port() {
        let hp = HostPort::parse("[::1]:9000").unwrap();
        assert_eq!(hp.host, "::1");
        assert_eq!(hp.port, Some(9000));
    }

    #[test]
    fn extracts_authority_from_origin_url() {
        let hp = HostPort::from_url("https://example.com:443/a/b?x=1").unwrap();
        assert_eq!(hp.host, "example.com");
        assert_eq!(hp.port, Some(443));
    }

    #[test]
    fn matches_is_case_insensitive_on_host() {
        let a = HostPort::parse("Example.com:80").unwrap();
        let b = HostPort::parse("example.COM:80").unwrap();
        assert!(a.matches(&b));
    }
}
