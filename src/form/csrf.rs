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

//! CSRF detection: a submitted form is accepted if its
//! CSRF field matches the same-named cookie, or if `Origin`/`Referer`
//! matches `Host`. Otherwise the parse result is replaced by a CSRF
//! failure.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::{Error, ErrorKind, Result};
use crate::form::FormData;
use crate::http::cookie::{find_cookie, is_valid_cookie_name};
use crate::http::header_map::HeaderMap;
use crate::http::host_port::HostPort;

#[derive(Clone, Debug)]
pub struct CsrfConfig {
    /// The form field and cookie name carrying the token; defaults to
    /// `_csrf_token`.
    pub token_name: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_name: "_csrf_token".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// Token/cookie matched, or Origin/Referer matched Host.
    Accepted,
    Failed,
}

/// Generates a fresh 12-character alphanumeric token, issued as a session
/// cookie the first time a form is rendered.
pub fn generate_token() -> String {
    (&mut thread_rng())
        .sample_iter(Alphanumeric)
        .map(char::from)
        .take(12)
        .collect()
}

/// Checks `form` against the request's cookies and headers. If both a
/// form token and a same-named cookie are present, that comparison is
/// authoritative — a mismatch fails outright, a match accepts, and the
/// Origin/Referer headers are never consulted. Only when there is no
/// token/cookie pair to compare does a matching Origin/Referer accept
/// the request. `cookies` is the already-parsed `Cookie` header.
pub fn check_csrf(
    form: &FormData,
    headers: &HeaderMap,
    cookies: &[(String, String)],
    config: &CsrfConfig,
) -> CsrfOutcome {
    if !is_valid_cookie_name(&config.token_name) {
        return CsrfOutcome::Failed;
    }

    if let (Some(form_token), Some(cookie_token)) = (
        form.param(&config.token_name),
        find_cookie(cookies, &config.token_name),
    ) {
        return if form_token == cookie_token {
            CsrfOutcome::Accepted
        } else {
            CsrfOutcome::Failed
        };
    }

    let host = headers.get("host").and_then(HostPort::parse);
    if let Some(host) = &host {
        if let Some(origin) = headers.get("origin").and_then(HostPort::from_url) {
            if origin.matches(host) {
                return CsrfOutcome::Accepted;
            }
        }
        if let Some(referer) = headers.get("referer").and_then(HostPort::from_url) {
            if referer.matches(host) {
                return CsrfOutcome::Accepted;
            }
        }
    }

    CsrfOutcome::Failed
}

/// Wraps `check_csrf` the way the form pipeline consumes it: a CSRF
/// failure replaces the successful parse with a fatal, user-facing-safe
/// error.
pub fn enforce_csrf(
    form: FormData,
    headers: &HeaderMap,
    cookies: &[(String, String)],
    config: &CsrfConfig,
) -> Result<FormData> {
    match check_csrf(&form, headers, cookies, config) {
        CsrfOutcome::Accepted => Ok(form),
        CsrfOutcome::Failed => Err(Error::new(
            ErrorKind::Csrf,
            "CSRF token/cookie mismatch and Origin/Referer does not match Host",
        )),
    }
}
