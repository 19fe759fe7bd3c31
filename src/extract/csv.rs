//! CSV tables: encoding recovery, delimiter sniffing, ` | `-joined rows.

use std::borrow::Cow;

use tracing::debug;

use super::ExtractOptions;
use crate::error::{MailLensError, Result};

/// Candidate delimiters, in tie-break order (comma wins ties).
const DELIMITERS: [u8; 4] = [b'|', b'\t', b';', b','];
/// Lines examined by the delimiter sniffer.
const SNIFF_LINES: usize = 10;

pub fn extract(data: &[u8], options: &ExtractOptions) -> Result<String> {
    let text = decode(data, options);
    let delimiter = sniff_delimiter(&text);
    debug!(delimiter = %(delimiter as char).escape_default(), "Sniffed CSV delimiter");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| MailLensError::extraction("CSV", e))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        lines.push(record.iter().collect::<Vec<_>>().join(" | "));
    }
    Ok(lines.join("\n").trim().to_string())
}

/// First encoding in the configured chain that decodes without errors.
///
/// Falls back to a lossy decode with the first encoding.
fn decode<'a>(data: &'a [u8], options: &ExtractOptions) -> Cow<'a, str> {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    for encoding in &options.csv_encodings {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(data) {
            debug!(encoding = encoding.name(), "Decoded CSV attachment");
            return text;
        }
    }
    let encoding = options.csv_encodings.first().copied().unwrap_or(encoding_rs::UTF_8);
    encoding.decode_without_bom_handling(data).0
}

/// Pick the delimiter that appears a consistent number of times per line.
fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    DELIMITERS
        .iter()
        .filter_map(|&d| {
            let counts: Vec<usize> = lines.iter().map(|l| l.bytes().filter(|&b| b == d).count()).collect();
            let first = *counts.first()?;
            if first == 0 {
                return None;
            }
            let consistent = counts.iter().all(|&c| c == first);
            Some((d, consistent, first))
        })
        .max_by_key(|&(_, consistent, count)| (consistent, count))
        .map(|(d, _, _)| d)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("name,city\nAnn,Oslo\n"), b',');
        assert_eq!(sniff_delimiter("single column\n"), b',');
    }

    #[test]
    fn test_sniff_prefers_consistent_counts() {
        // Commas appear unevenly inside text; semicolons split every row in two.
        let text = "title;note\nA;one, two, three\nB;four\n";
        assert_eq!(sniff_delimiter(text), b';');
    }

    #[test]
    fn test_rows_joined_with_pipes() {
        let text = extract(b"name,amount\nAnn,10\n\nBob,20\n", &ExtractOptions::default()).expect("csv");
        assert_eq!(text, "name | amount\nAnn | 10\nBob | 20");
    }

    #[test]
    fn test_windows_1251_fallback() {
        // "Имя;Город" in Windows-1251
        let data = b"\xc8\xec\xff;\xc3\xee\xf0\xee\xe4\n";
        let text = extract(data, &ExtractOptions::default()).expect("csv");
        assert_eq!(text, "Имя | Город");
    }

    #[test]
    fn test_quoted_cells() {
        let text = extract(b"\"Smith, J\",42\n", &ExtractOptions::default()).expect("csv");
        assert_eq!(text, "Smith, J | 42");
    }
}
