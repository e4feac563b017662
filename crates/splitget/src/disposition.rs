// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filename extraction from a `Content-Disposition` header value.
//!
//! The value is read as `type *( ";" name "=" ( token | quoted-string ) )`.
//! An extended `filename*` parameter (`charset'lang'percent-encoded`) wins
//! over a plain `filename` when its charset is understood.

use crate::error::{DownloadError, MalformedDispositionSnafu};

/// Return the filename carried by a `Content-Disposition` value.
///
/// `Ok(None)` means the header is well formed but names no file. Any path
/// components are stripped so the name can only refer to an entry inside
/// the destination directory.
pub fn filename_from_disposition(value: &str) -> Result<Option<String>, DownloadError> {
    let malformed = |reason: String| {
        MalformedDispositionSnafu {
            value: value.to_string(),
            reason,
        }
        .build()
    };

    let params = parse_params(value).map_err(malformed)?;

    let extended = params
        .iter()
        .find(|(name, _)| name == "filename*")
        .map(|(_, v)| decode_extended(v))
        .transpose()
        .map_err(malformed)?
        .flatten();
    let plain = params
        .iter()
        .find(|(name, _)| name == "filename")
        .map(|(_, v)| v.clone());

    let Some(raw) = extended.or(plain) else {
        return Ok(None);
    };

    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(malformed(format!("filename {raw:?} has no usable name")));
    }
    Ok(Some(name))
}

fn parse_params(value: &str) -> Result<Vec<(String, String)>, String> {
    let (kind, mut rest) = take_token(value.trim_start());
    if kind.is_empty() {
        return Err("missing disposition type".to_string());
    }

    let mut params: Vec<(String, String)> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        rest = rest
            .strip_prefix(';')
            .ok_or_else(|| format!("expected ';' before {rest:?}"))?
            .trim_start();
        // trailing semicolons are tolerated
        if rest.is_empty() {
            break;
        }

        let (name, after) = take_token(rest);
        if name.is_empty() {
            return Err(format!("invalid parameter name at {rest:?}"));
        }
        let after = after
            .trim_start()
            .strip_prefix('=')
            .ok_or_else(|| format!("parameter {name:?} has no value"))?
            .trim_start();

        let (param_value, after) = if after.starts_with('"') {
            take_quoted(after)?
        } else {
            let (token, after) = take_token(after);
            if token.is_empty() {
                return Err(format!("parameter {name:?} has an empty value"));
            }
            (token.to_string(), after)
        };

        let name = name.to_ascii_lowercase();
        if params.iter().any(|(existing, _)| *existing == name) {
            return Err(format!("duplicate parameter {name:?}"));
        }
        params.push((name, param_value));
        rest = after;
    }

    Ok(params)
}

const fn is_token_char(c: char) -> bool {
    c.is_ascii()
        && !c.is_ascii_control()
        && !matches!(
            c,
            ' ' | '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
        )
}

fn take_token(s: &str) -> (&str, &str) {
    let end = s.find(|c| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// `s` starts with the opening quote
fn take_quoted(s: &str) -> Result<(String, &str), String> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &s[i + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err("unterminated quoted string".to_string())
}

/// Decode an RFC 5987 value. `Ok(None)` for charsets we do not handle.
fn decode_extended(value: &str) -> Result<Option<String>, String> {
    let mut parts = value.splitn(3, '\'');
    let (Some(charset), Some(_lang), Some(encoded)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("extended value {value:?} lacks charset and language"));
    };

    let bytes = percent_decode(encoded)?;
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "us-ascii" => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| format!("extended value is not valid utf-8: {e}")),
        "iso-8859-1" => Ok(Some(bytes.into_iter().map(char::from).collect())),
        _ => Ok(None),
    }
}

fn percent_decode(encoded: &str) -> Result<Vec<u8>, String> {
    let raw = encoded.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| format!("bad percent escape in {encoded:?}"))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filename(value: &str) -> Option<String> { filename_from_disposition(value).unwrap() }

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            filename("attachment; filename=report.pdf").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn test_quoted_filename_with_escapes() {
        assert_eq!(
            filename(r#"attachment; filename="my \"big\" file.tar.gz""#).as_deref(),
            Some(r#"my "big" file.tar.gz"#)
        );
    }

    #[test]
    fn test_parameter_names_are_case_insensitive() {
        assert_eq!(
            filename("Attachment ;  FileName = \"a.bin\" ;").as_deref(),
            Some("a.bin")
        );
    }

    #[test]
    fn test_extended_filename_preferred() {
        assert_eq!(
            filename("attachment; filename=\"fallback.txt\"; filename*=UTF-8''%E2%82%AC%20rates.txt")
                .as_deref(),
            Some("€ rates.txt")
        );
    }

    #[test]
    fn test_unknown_charset_falls_back_to_plain() {
        assert_eq!(
            filename("attachment; filename=plain.txt; filename*=koi8-r''abc").as_deref(),
            Some("plain.txt")
        );
    }

    #[test]
    fn test_no_filename_parameter() {
        assert_eq!(filename("inline"), None);
        assert_eq!(filename("attachment; size=42"), None);
    }

    #[test]
    fn test_path_components_are_stripped() {
        assert_eq!(
            filename("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            filename("attachment; filename=\"C:\\\\tmp\\\\setup.exe\"").as_deref(),
            Some("setup.exe")
        );
    }

    #[test]
    fn test_malformed_values() {
        for value in [
            "",
            "; filename=a",
            "attachment; filename",
            "attachment; filename=",
            "attachment; filename=\"open",
            "attachment filename=a",
            "attachment; filename=a; filename=b",
            "attachment; filename*=UTF-8''%ZZ",
            "attachment; filename=\"..\"",
        ] {
            assert!(
                matches!(
                    filename_from_disposition(value),
                    Err(DownloadError::MalformedDisposition { .. })
                ),
                "{value:?} should be rejected"
            );
        }
    }
}
