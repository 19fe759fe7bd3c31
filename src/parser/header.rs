//! Header decoding: folding, RFC 2047 encoded-words and charset fallbacks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

/// One piece of a header value: either literal text or the payload of an
/// encoded word together with its declared charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Raw bytes of the segment (already transfer-decoded for encoded words).
    pub content: Vec<u8>,
    /// Declared charset, `None` for literal text.
    pub charset: Option<String>,
}

/// Decode a header value into a plain string.
///
/// The value is split into segments, each segment is decoded with its own
/// charset (falling back to lossy UTF-8) and the results are concatenated.
/// Never fails: a value without encoded words is returned unchanged.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
pub fn decode(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }
    split_segments(raw)
        .iter()
        .map(|segment| match &segment.charset {
            Some(charset) => decode_charset(charset, &segment.content),
            None => String::from_utf8_lossy(&segment.content).into_owned(),
        })
        .collect()
}

/// Split a header value into literal and encoded segments.
///
/// Whitespace separating two adjacent encoded words is dropped (RFC 2047 §6.2).
/// Malformed encoded words are kept as literal text.
pub fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        if !last_was_encoded || !before.trim().is_empty() {
            literal.push_str(before);
        }

        match parse_encoded_word(&remaining[start + 2..]) {
            Some((segment, consumed)) => {
                if !literal.is_empty() {
                    segments.push(literal_segment(std::mem::take(&mut literal)));
                }
                segments.push(segment);
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                literal.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    literal.push_str(remaining);
    if !literal.is_empty() {
        segments.push(literal_segment(literal));
    }
    segments
}

fn literal_segment(text: String) -> Segment {
    Segment {
        content: text.into_bytes(),
        charset: None,
    }
}

/// Parse `charset?encoding?text?=` (the part after `=?`).
///
/// Returns the segment and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(Segment, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let consumed = first_q + 1 + second_q + 1 + end + 2;

    let content = match encoding {
        "B" | "b" => decode_b_encoding(encoded_text)?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 allows a language suffix: "utf-8*en".
    let charset = charset.split('*').next().unwrap_or(charset).to_string();

    Some((
        Segment {
            content,
            charset: Some(charset),
        },
        consumed,
    ))
}

/// Decode base64 (`B`) payloads, tolerating missing padding.
fn decode_b_encoding(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let trimmed = compact.trim_end_matches('=');
    let padded = match trimmed.len() % 4 {
        0 => trimmed.to_string(),
        2 => format!("{trimmed}=="),
        3 => format!("{trimmed}="),
        _ => return None,
    };
    STANDARD.decode(padded).ok()
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode bytes using a named charset.
///
/// Unknown charsets and payloads that are malformed in their declared
/// charset fall back to lossy UTF-8.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) else {
        warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
        return String::from_utf8_lossy(bytes).into_owned();
    };
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            charset = charset,
            "Malformed bytes for declared charset, falling back to UTF-8 lossy"
        );
        return String::from_utf8_lossy(bytes).into_owned();
    }
    decoded.into_owned()
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs in order.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Get the first value for a header name (case-insensitive).
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        assert_eq!(
            decode("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        assert_eq!(decode("Re: =?UTF-8?B?SG9sYQ==?= there"), "Re: Hola there");
    }

    #[test]
    fn test_decode_cyrillic_koi8() {
        // "Привет" in KOI8-R
        assert_eq!(decode("=?KOI8-R?B?8NLJ18XU?="), "Привет");
    }

    #[test]
    fn test_decode_windows1251_q() {
        // "Тест" in Windows-1251
        assert_eq!(decode("=?windows-1251?Q?=D2=E5=F1=F2?="), "Тест");
    }

    #[test]
    fn test_decode_unknown_charset_falls_back() {
        assert_eq!(decode("=?x-unknown?Q?plain?="), "plain");
    }

    #[test]
    fn test_decode_unpadded_base64() {
        assert_eq!(decode("=?UTF-8?B?SG9sYQ?="), "Hola");
    }

    #[test]
    fn test_decode_malformed_is_preserved() {
        assert_eq!(decode("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
        assert_eq!(decode("no encoded words"), "no encoded words");
    }

    #[test]
    fn test_split_segments() {
        let segments = split_segments("Re: =?UTF-8?Q?caf=C3=A9?= ok");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].charset, None);
        assert_eq!(segments[1].charset.as_deref(), Some("UTF-8"));
        assert_eq!(segments[1].content, "café".as_bytes());
        assert_eq!(segments[2].content, b" ok");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
        assert_eq!(get_header(&headers, "FROM"), Some("user@example.com"));
    }

    #[test]
    fn test_decode_header_bytes_latin1_fallback() {
        assert_eq!(decode_header_bytes(b"Subject: caf\xe9"), "Subject: café");
    }
}
