//! Plain text attachments (`.txt`, `.text`, `.log`).

use super::ExtractOptions;

/// UTF-8 when valid, otherwise the fallback code page with undecodable bytes dropped.
pub fn extract(data: &[u8], options: &ExtractOptions) -> String {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(text) => text.trim().to_string(),
        Err(_) => {
            let (text, _) = options.text_fallback.decode_without_bom_handling(data);
            text.replace('\u{FFFD}', "").trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8() {
        assert_eq!(extract("  Привет \n".as_bytes(), &ExtractOptions::default()), "Привет");
    }

    #[test]
    fn test_cp1251_fallback() {
        // "Тест" in Windows-1251
        assert_eq!(extract(b"\xd2\xe5\xf1\xf2", &ExtractOptions::default()), "Тест");
    }
}
