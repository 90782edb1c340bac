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

//! A single-pass, byte-level `application/x-www-form-urlencoded` parser:
//! `&` separates pairs, `=` separates name from value,
//! `+` decodes to space, `%HH` decodes one byte. Accepts both a URI query
//! string and a POST body.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::form::FormLimits;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Name,
    Value,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PercentState {
    None,
    First,
    Second(u8),
}

/// Parses a complete `a=1&b=hello+world` style byte string into an
/// ordered multimap, preserving repeat-key order.
pub fn parse(input: &[u8], limits: &FormLimits) -> Result<HashMap<String, Vec<String>>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    let mut entries = 0usize;

    let mut side = Side::Name;
    let mut percent = PercentState::None;
    let mut name: Vec<u8> = Vec::new();
    let mut value: Vec<u8> = Vec::new();

    macro_rules! push_byte {
        ($b:expr) => {
            match side {
                Side::Name => {
                    name.push($b);
                    if name.len() > limits.max_entry_key_bytes {
                        return Err(Error::over_limit(
                            "maxEntryKeyBytes",
                            name.len() as u64,
                            limits.max_entry_key_bytes as u64,
                        ));
                    }
                }
                Side::Value => {
                    value.push($b);
                    if value.len() > limits.max_param_value_total_bytes {
                        return Err(Error::over_limit(
                            "maxParamValueTotalBytes",
                            value.len() as u64,
                            limits.max_param_value_total_bytes as u64,
                        ));
                    }
                }
            }
        };
    }

    macro_rules! finish_pair {
        () => {{
            entries += 1;
            if entries > limits.max_param_entries {
                return Err(Error::over_limit(
                    "maxParamEntries",
                    entries as u64,
                    limits.max_param_entries as u64,
                ));
            }
            let name_s = String::from_utf8(std::mem::take(&mut name))
                .map_err(|e| Error::new(ErrorKind::Protocol, "form field name is not valid utf-8").set_source(e))?;
            let value_s = String::from_utf8(std::mem::take(&mut value))
                .map_err(|e| Error::new(ErrorKind::Protocol, "form field value is not valid utf-8").set_source(e))?;
            params.entry(name_s).or_default().push(value_s);
            side = Side::Name;
        }};
    }

    for &b in input {
        match percent {
            PercentState::None => match b {
                b'&' => finish_pair!(),
                b'=' if side == Side::Name => side = Side::Value,
                b'+' => push_byte!(b' '),
                b'%' => percent = PercentState::First,
                _ => push_byte!(b),
            },
            PercentState::First => {
                let hi = hex_digit(b).ok_or_else(|| {
                    Error::new(ErrorKind::Protocol, "malformed percent-encoding: bad first digit")
                })?;
                percent = PercentState::Second(hi);
            }
            PercentState::Second(hi) => {
                let lo = hex_digit(b).ok_or_else(|| {
                    Error::new(ErrorKind::Protocol, "malformed percent-encoding: bad second digit")
                })?;
                push_byte!((hi << 4) | lo);
                percent = PercentState::None;
            }
        }
    }

    if percent != PercentState::None {
        return Err(Error::new(
            ErrorKind::Protocol,
            "malformed percent-encoding: truncated at end of input",
        ));
    }

    if !name.is_empty() || !value.is_empty() || side == Side::Value {
        finish_pair!();
    }

    Ok(params)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
