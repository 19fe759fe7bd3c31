//! Reader for legacy Outlook `.msg` files (OLE compound documents).
//!
//! Properties live in streams named `__substg1.0_<ID><TYPE>`; fixed-size
//! values (dates, code pages) are packed into `__properties_version1.0`.
//! Attachments are storages named `__attach_version1.0_#XXXXXXXX`; an
//! attached message is a whole message storage under `__substg1.0_3701000D`.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use cfb::CompoundFile;
use chrono::DateTime;
use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::error::{MailLensError, Result};
use crate::model::message::{fallback_attachment_name, Attachment, ParsedMessage, SELECTED_HEADERS};
use crate::parser::{header, mime};

// ── Property identifiers ────────────────────────────────────────

const PID_SUBJECT: u16 = 0x0037;
const PID_CLIENT_SUBMIT_TIME: u16 = 0x0039;
const PID_SENT_REPRESENTING_NAME: u16 = 0x0042;
const PID_SENT_REPRESENTING_EMAIL: u16 = 0x0065;
const PID_TRANSPORT_HEADERS: u16 = 0x007D;
const PID_DISPLAY_CC: u16 = 0x0E03;
const PID_DISPLAY_TO: u16 = 0x0E04;
const PID_DELIVERY_TIME: u16 = 0x0E06;
const PID_SENDER_NAME: u16 = 0x0C1A;
const PID_SENDER_EMAIL: u16 = 0x0C1F;
const PID_BODY: u16 = 0x1000;
const PID_HTML: u16 = 0x1013;
const PID_INTERNET_MESSAGE_ID: u16 = 0x1035;
const PID_INTERNET_CPID: u16 = 0x3FDE;
const PID_MESSAGE_CODEPAGE: u16 = 0x3FFD;
const PID_SENDER_SMTP_ADDRESS: u16 = 0x5D01;

const PID_ATTACH_DISPLAY_NAME: u16 = 0x3001;
const PID_ATTACH_DATA: u16 = 0x3701;
const PID_ATTACH_FILENAME: u16 = 0x3704;
const PID_ATTACH_LONG_FILENAME: u16 = 0x3707;
const PID_ATTACH_MIME_TAG: u16 = 0x370E;

const PT_STRING8: u16 = 0x001E;
const PT_UNICODE: u16 = 0x001F;
const PT_BINARY: u16 = 0x0102;
const PT_LONG: u16 = 0x0003;
const PT_SYSTIME: u16 = 0x0040;
const PT_OBJECT: u16 = 0x000D;

const ATTACH_PREFIX: &str = "__attach_version1.0_#";
const PROPERTIES_STREAM: &str = "__properties_version1.0";
/// Size of the header preceding property entries in the top-level stream.
const TOP_LEVEL_HEADER: usize = 32;
/// Size of the same header inside an embedded message storage.
const EMBEDDED_HEADER: usize = 24;
const PROPERTY_ENTRY: usize = 16;
/// Storage levels copied when exporting an embedded message.
const MAX_STORAGE_DEPTH: usize = 32;
const OUTLOOK_CONTENT_TYPE: &str = "application/vnd.ms-outlook";

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;

/// Parse an Outlook `.msg` blob into a [`ParsedMessage`].
pub fn parse_msg(data: &[u8], filename: &str) -> Result<ParsedMessage> {
    let file = CompoundFile::open(Cursor::new(data))
        .map_err(|e| MailLensError::parse(filename, format!("not an OLE compound file: {e}")))?;

    let mut reader = MsgReader {
        file,
        encoding: encoding_rs::WINDOWS_1252,
    };
    let root = PathBuf::from("/");

    let fixed = reader.fixed_properties(&root.join(PROPERTIES_STREAM), TOP_LEVEL_HEADER);
    if let Some(encoding) = [PID_INTERNET_CPID, PID_MESSAGE_CODEPAGE]
        .iter()
        .filter_map(|&id| fixed.iter().find(|p| p.id == id && p.kind == PT_LONG))
        .find_map(|p| encoding_for_codepage(p.as_u32()))
    {
        reader.encoding = encoding;
    }

    let transport = reader.string(&root, PID_TRANSPORT_HEADERS).unwrap_or_default();
    let transport_headers = header::unfold_headers(&transport);

    let mut parsed = ParsedMessage {
        subject: reader.string(&root, PID_SUBJECT).unwrap_or_default(),
        sender: reader.sender(&root),
        recipients: reader.string(&root, PID_DISPLAY_TO).unwrap_or_default(),
        cc: reader.string(&root, PID_DISPLAY_CC).unwrap_or_default(),
        body_plain: reader.string(&root, PID_BODY).unwrap_or_default(),
        body_html: reader.html(&root).unwrap_or_default(),
        ..ParsedMessage::default()
    };

    parsed.date = [PID_CLIENT_SUBMIT_TIME, PID_DELIVERY_TIME]
        .iter()
        .filter_map(|&id| fixed.iter().find(|p| p.id == id && p.kind == PT_SYSTIME))
        .find_map(|p| filetime_to_rfc2822(p.as_u64()))
        .or_else(|| header::get_header(&transport_headers, "date").map(header::decode))
        .unwrap_or_default();

    for name in SELECTED_HEADERS {
        if let Some(value) = header::get_header(&transport_headers, name) {
            parsed.headers.insert(name.to_string(), header::decode(value));
        }
    }
    if !parsed.headers.contains_key("Message-ID") {
        if let Some(id) = reader.string(&root, PID_INTERNET_MESSAGE_ID) {
            parsed.headers.insert("Message-ID".to_string(), id);
        }
    }

    for storage in reader.attachment_storages() {
        let index = parsed.attachments.len();
        parsed.attachments.push(reader.attachment(&root.join(&storage), index));
    }

    if parsed.body_plain.trim().is_empty() && !parsed.body_html.trim().is_empty() {
        parsed.body_plain = mime::html_to_text(&parsed.body_html);
    }

    debug!(
        filename = filename,
        attachments = parsed.attachments.len(),
        "Parsed .msg message"
    );
    Ok(parsed)
}

struct MsgReader<'a> {
    file: CompoundFile<Cursor<&'a [u8]>>,
    /// Code page for 8-bit string properties.
    encoding: &'static Encoding,
}

impl MsgReader<'_> {
    /// Read a whole stream. `None` when it does not exist.
    fn stream(&mut self, path: &Path) -> Option<io::Result<Vec<u8>>> {
        if !self.file.is_stream(path) {
            return None;
        }
        Some(self.file.open_stream(path).and_then(|mut stream| {
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf)?;
            Ok(buf)
        }))
    }

    fn property_bytes(&mut self, storage: &Path, id: u16, kind: u16) -> Option<Vec<u8>> {
        let path = storage.join(stream_name(id, kind));
        match self.stream(&path)? {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(stream = %path.display(), error = %e, "Failed to read property stream");
                None
            }
        }
    }

    /// A string property in either its Unicode or 8-bit form.
    fn string(&mut self, storage: &Path, id: u16) -> Option<String> {
        if let Some(bytes) = self.property_bytes(storage, id, PT_UNICODE) {
            return Some(decode_utf16le(&bytes));
        }
        let bytes = self.property_bytes(storage, id, PT_STRING8)?;
        let (text, _, _) = self.encoding.decode(&bytes);
        Some(text.trim_end_matches('\0').to_string())
    }

    fn html(&mut self, storage: &Path) -> Option<String> {
        if let Some(html) = self.string(storage, PID_HTML) {
            return Some(html);
        }
        let bytes = self.property_bytes(storage, PID_HTML, PT_BINARY)?;
        Some(match std::str::from_utf8(&bytes) {
            Ok(s) => s.to_string(),
            Err(_) => self.encoding.decode(&bytes).0.into_owned(),
        })
    }

    /// `Name <address>`, or whichever half is present.
    fn sender(&mut self, storage: &Path) -> String {
        let name = self
            .string(storage, PID_SENDER_NAME)
            .or_else(|| self.string(storage, PID_SENT_REPRESENTING_NAME))
            .unwrap_or_default();
        let address = [PID_SENDER_SMTP_ADDRESS, PID_SENDER_EMAIL, PID_SENT_REPRESENTING_EMAIL]
            .iter()
            .filter_map(|&id| self.string(storage, id))
            .find(|a| a.contains('@'))
            .unwrap_or_default();
        match (name.trim(), address.trim()) {
            ("", "") => String::new(),
            (name, "") => name.to_string(),
            ("", address) => address.to_string(),
            (name, address) if name == address => address.to_string(),
            (name, address) => format!("{name} <{address}>"),
        }
    }

    fn fixed_properties(&mut self, path: &Path, header_len: usize) -> Vec<FixedProperty> {
        match self.stream(path) {
            Some(Ok(bytes)) => parse_fixed_properties(&bytes, header_len),
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read fixed-size property stream");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Attachment storage names in index order.
    fn attachment_storages(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .file
            .read_root_storage()
            .filter(|e| e.is_storage() && e.name().starts_with(ATTACH_PREFIX))
            .map(|e| e.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn attachment(&mut self, storage: &Path, index: usize) -> Attachment {
        let filename = [PID_ATTACH_LONG_FILENAME, PID_ATTACH_FILENAME, PID_ATTACH_DISPLAY_NAME]
            .iter()
            .filter_map(|&id| self.string(storage, id))
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_attachment_name(index));

        let content_type = self
            .string(storage, PID_ATTACH_MIME_TAG)
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty());

        let embedded = storage.join(stream_name(PID_ATTACH_DATA, PT_OBJECT));
        if self.file.is_storage(&embedded) {
            let data = self.export_embedded(&embedded).unwrap_or_else(|e| {
                warn!(attachment = %filename, error = %e, "Failed to export embedded message");
                Vec::new()
            });
            return Attachment {
                filename: embedded_filename(filename),
                content_type: content_type.unwrap_or_else(|| OUTLOOK_CONTENT_TYPE.to_string()),
                data,
                extracted_text: None,
            };
        }
        let content_type =
            content_type.unwrap_or_else(|| "application/octet-stream".to_string());

        let data_path = storage.join(stream_name(PID_ATTACH_DATA, PT_BINARY));
        let data = match self.stream(&data_path) {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!(attachment = %filename, error = %e, "Failed to read attachment data");
                Vec::new()
            }
            None => {
                warn!(attachment = %filename, "Attachment has no binary data stream");
                Vec::new()
            }
        };

        Attachment {
            filename,
            content_type,
            data,
            extracted_text: None,
        }
    }

    /// Copy an embedded message storage into a standalone `.msg` blob.
    fn export_embedded(&mut self, source: &Path) -> io::Result<Vec<u8>> {
        let mut out = CompoundFile::create(Cursor::new(Vec::new()))?;
        self.copy_storage(source, &mut out, Path::new("/"), 0)?;
        out.flush()?;
        Ok(out.into_inner().into_inner())
    }

    fn copy_storage(
        &mut self,
        source: &Path,
        out: &mut CompoundFile<Cursor<Vec<u8>>>,
        target: &Path,
        depth: usize,
    ) -> io::Result<()> {
        if depth > MAX_STORAGE_DEPTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "embedded message storages nested too deeply",
            ));
        }
        let entries: Vec<(String, bool)> = self
            .file
            .read_storage(source)?
            .map(|e| (e.name().to_string(), e.is_storage()))
            .collect();

        for (name, is_storage) in entries {
            let from = source.join(&name);
            let to = target.join(&name);
            if is_storage {
                out.create_storage(&to)?;
                self.copy_storage(&from, out, &to, depth + 1)?;
                continue;
            }
            let Some(bytes) = self.stream(&from) else {
                continue;
            };
            let mut bytes = bytes?;
            // A standalone message carries the longer top-level header.
            if depth == 0 && name == PROPERTIES_STREAM && bytes.len() >= EMBEDDED_HEADER {
                let properties = bytes.split_off(EMBEDDED_HEADER);
                bytes.resize(TOP_LEVEL_HEADER, 0);
                bytes.extend_from_slice(&properties);
            }
            out.create_stream(&to)?.write_all(&bytes)?;
        }
        Ok(())
    }
}

/// Attached messages are dispatched by extension, so make sure they end in `.msg`.
fn embedded_filename(name: String) -> String {
    if name.to_ascii_lowercase().ends_with(".msg") {
        name
    } else {
        format!("{name}.msg")
    }
}

/// `__substg1.0_IIIITTTT` for a property id and type.
fn stream_name(id: u16, kind: u16) -> String {
    format!("__substg1.0_{id:04X}{kind:04X}")
}

/// Decode a UTF-16LE property, dropping trailing NULs and an odd last byte.
fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(LittleEndian::read_u16)
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// One 16-byte entry of a `__properties_version1.0` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FixedProperty {
    kind: u16,
    id: u16,
    value: [u8; 8],
}

impl FixedProperty {
    fn as_u32(&self) -> u32 {
        LittleEndian::read_u32(&self.value[..4])
    }

    fn as_u64(&self) -> u64 {
        LittleEndian::read_u64(&self.value)
    }
}

fn parse_fixed_properties(bytes: &[u8], header_len: usize) -> Vec<FixedProperty> {
    bytes
        .get(header_len..)
        .unwrap_or_default()
        .chunks_exact(PROPERTY_ENTRY)
        .map(|entry| {
            let mut value = [0u8; 8];
            value.copy_from_slice(&entry[8..16]);
            FixedProperty {
                kind: LittleEndian::read_u16(&entry[0..2]),
                id: LittleEndian::read_u16(&entry[2..4]),
                value,
            }
        })
        .collect()
}

/// Windows FILETIME (100 ns ticks since 1601) rendered as RFC 2822.
fn filetime_to_rfc2822(ticks: u64) -> Option<String> {
    if ticks == 0 {
        return None;
    }
    let secs = i64::try_from(ticks / 10_000_000).ok()? - FILETIME_UNIX_OFFSET;
    let nanos = u32::try_from((ticks % 10_000_000) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.to_rfc2822())
}

/// Map a Windows code page number to an `encoding_rs` encoding.
fn encoding_for_codepage(codepage: u32) -> Option<&'static Encoding> {
    let label = match codepage {
        65001 => "utf-8",
        874 | 1250..=1258 => return Encoding::for_label(format!("windows-{codepage}").as_bytes()),
        866 => "ibm866",
        932 => "shift_jis",
        936 => "gbk",
        949 => "euc-kr",
        950 => "big5",
        20866 => "koi8-r",
        21866 => "koi8-u",
        20127 | 28591 => "windows-1252",
        28592..=28599 => return Encoding::for_label(format!("iso-8859-{}", codepage - 28590).as_bytes()),
        _ => return None,
    };
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn build_msg(streams: &[(&str, Vec<u8>)], storages: &[&str]) -> Vec<u8> {
        let mut file = CompoundFile::create(Cursor::new(Vec::new())).expect("create");
        for storage in storages {
            file.create_storage(storage).expect("storage");
        }
        for (path, bytes) in streams {
            let mut stream = file.create_stream(path).expect("stream");
            stream.write_all(bytes).expect("write");
        }
        file.flush().expect("flush");
        file.into_inner().into_inner()
    }

    fn properties_stream(entries: &[(u16, u16, u64)]) -> Vec<u8> {
        let mut bytes = vec![0u8; TOP_LEVEL_HEADER];
        for &(kind, id, value) in entries {
            let mut entry = [0u8; PROPERTY_ENTRY];
            LittleEndian::write_u16(&mut entry[0..2], kind);
            LittleEndian::write_u16(&mut entry[2..4], id);
            LittleEndian::write_u64(&mut entry[8..16], value);
            bytes.extend_from_slice(&entry);
        }
        bytes
    }

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name(PID_SUBJECT, PT_UNICODE), "__substg1.0_0037001F");
        assert_eq!(stream_name(PID_ATTACH_DATA, PT_BINARY), "__substg1.0_37010102");
    }

    #[test]
    fn test_filetime_conversion() {
        // 2024-01-01T00:00:00Z
        let ticks = (1_704_067_200 + FILETIME_UNIX_OFFSET) as u64 * 10_000_000;
        assert_eq!(
            filetime_to_rfc2822(ticks).as_deref(),
            Some("Mon, 1 Jan 2024 00:00:00 +0000")
        );
        assert_eq!(filetime_to_rfc2822(0), None);
    }

    #[test]
    fn test_codepage_mapping() {
        assert_eq!(encoding_for_codepage(1251), Some(encoding_rs::WINDOWS_1251));
        assert_eq!(encoding_for_codepage(20866), Some(encoding_rs::KOI8_R));
        assert_eq!(encoding_for_codepage(28595), Some(encoding_rs::ISO_8859_5));
        assert_eq!(encoding_for_codepage(65001), Some(encoding_rs::UTF_8));
        assert_eq!(encoding_for_codepage(1), None);
    }

    #[test]
    fn test_parse_fixed_properties() {
        let bytes = properties_stream(&[(PT_LONG, PID_MESSAGE_CODEPAGE, 1251)]);
        let props = parse_fixed_properties(&bytes, TOP_LEVEL_HEADER);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].id, PID_MESSAGE_CODEPAGE);
        assert_eq!(props[0].as_u32(), 1251);
        assert!(parse_fixed_properties(&bytes[..10], TOP_LEVEL_HEADER).is_empty());
    }

    #[test]
    fn test_decode_utf16le_trims_nul() {
        let mut bytes = utf16("Привет");
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(decode_utf16le(&bytes), "Привет");
    }

    #[test]
    fn test_parse_msg_fields_and_attachment() {
        let ticks = (1_704_067_200 + FILETIME_UNIX_OFFSET) as u64 * 10_000_000;
        let attach = "/__attach_version1.0_#00000000";
        let data = build_msg(
            &[
                ("/__substg1.0_0037001F", utf16("Quarterly report")),
                ("/__substg1.0_0C1A001F", utf16("Alice")),
                ("/__substg1.0_5D01001F", utf16("alice@example.com")),
                ("/__substg1.0_0E04001F", utf16("Bob")),
                ("/__substg1.0_1000001E", b"\xcf\xf0\xe8\xe2\xe5\xf2".to_vec()),
                (
                    "/__properties_version1.0",
                    properties_stream(&[
                        (PT_LONG, PID_MESSAGE_CODEPAGE, 1251),
                        (PT_SYSTIME, PID_CLIENT_SUBMIT_TIME, ticks),
                    ]),
                ),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_3707001F",
                    utf16("notes.txt"),
                ),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_37010102",
                    b"attached notes".to_vec(),
                ),
            ],
            &[attach],
        );

        let parsed = parse_msg(&data, "m.msg").expect("parse");
        assert_eq!(parsed.subject, "Quarterly report");
        assert_eq!(parsed.sender, "Alice <alice@example.com>");
        assert_eq!(parsed.recipients, "Bob");
        assert_eq!(parsed.body_plain, "Привет");
        assert_eq!(parsed.date, "Mon, 1 Jan 2024 00:00:00 +0000");
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "notes.txt");
        assert_eq!(parsed.attachments[0].data, b"attached notes");
    }

    #[test]
    fn test_embedded_message_is_exported() {
        let ticks = (1_704_067_200 + FILETIME_UNIX_OFFSET) as u64 * 10_000_000;
        let mut inner_props = properties_stream(&[(PT_SYSTIME, PID_CLIENT_SUBMIT_TIME, ticks)]);
        inner_props.drain(..TOP_LEVEL_HEADER - EMBEDDED_HEADER);

        let data = build_msg(
            &[
                ("/__substg1.0_0037001F", utf16("Fwd: budget")),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_3001001F",
                    utf16("Budget draft"),
                ),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_3701000D/__substg1.0_0037001F",
                    utf16("Budget draft"),
                ),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_3701000D/__substg1.0_1000001F",
                    utf16("Numbers for next quarter"),
                ),
                (
                    "/__attach_version1.0_#00000000/__substg1.0_3701000D/__properties_version1.0",
                    inner_props,
                ),
            ],
            &[
                "/__attach_version1.0_#00000000",
                "/__attach_version1.0_#00000000/__substg1.0_3701000D",
            ],
        );

        let parsed = parse_msg(&data, "outer.msg").expect("parse");
        assert_eq!(parsed.attachments.len(), 1);
        let attachment = &parsed.attachments[0];
        assert_eq!(attachment.filename, "Budget draft.msg");
        assert_eq!(attachment.content_type, OUTLOOK_CONTENT_TYPE);
        assert!(!attachment.data.is_empty());

        let inner = parse_msg(&attachment.data, &attachment.filename).expect("inner parse");
        assert_eq!(inner.subject, "Budget draft");
        assert_eq!(inner.body_plain, "Numbers for next quarter");
        assert_eq!(inner.date, "Mon, 1 Jan 2024 00:00:00 +0000");
    }

    #[test]
    fn test_embedded_filename() {
        assert_eq!(embedded_filename("Report".into()), "Report.msg");
        assert_eq!(embedded_filename("Report.MSG".into()), "Report.MSG");
    }

    #[test]
    fn test_missing_attachment_data_is_empty() {
        let data = build_msg(
            &[(
                "/__attach_version1.0_#00000000/__substg1.0_3704001F",
                utf16("lost.bin"),
            )],
            &["/__attach_version1.0_#00000000"],
        );
        let parsed = parse_msg(&data, "m.msg").expect("parse");
        assert_eq!(parsed.attachments.len(), 1);
        assert!(parsed.attachments[0].data.is_empty());
    }

    #[test]
    fn test_non_ole_input_is_rejected() {
        let err = parse_msg(b"definitely not OLE", "x.msg").unwrap_err();
        assert!(matches!(err, MailLensError::Parse { .. }));
    }
}
