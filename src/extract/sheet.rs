//! Worksheet text from Excel workbooks (`.xlsx`, `.xls`) via `calamine`.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::warn;

use super::ExtractOptions;
use crate::error::{MailLensError, Result};
use crate::i18n;

/// One header line per non-empty sheet, then its rows joined with ` | `.
pub fn extract(data: &[u8], options: &ExtractOptions) -> Result<String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(data)).map_err(|e| MailLensError::extraction("Excel", e))?;

    let mut lines = Vec::new();
    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                warn!(sheet = %name, error = %e, "Skipping unreadable worksheet");
                continue;
            }
        };

        let rows: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .filter(|cell| !matches!(cell, Data::Empty))
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|line| !line.is_empty())
            .collect();

        if !rows.is_empty() {
            lines.push(i18n::sheet_header(options.lang, &name));
            lines.extend(rows);
        }
    }
    Ok(lines.join("\n").trim().to_string())
}
