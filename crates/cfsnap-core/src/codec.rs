//! Encoding and decoding of CatalogFS records.
//!
//! The current format (version 3) is a small UTF-8 text file:
//!
//! ```text
//! CatalogFS=3
//! size=1234
//! mtime=1700000000
//! sha256=<64 hex chars>
//! ```
//!
//! The header line is the version marker; the set of keys present in the body
//! tells a decoder which field set the record carries (see
//! [`FileRecord::field_set`]). Records written by format versions 1 and 2
//! (`CatalogFS.File.<ver>` header, `key: value` body) are still decodable so
//! old catalogs can be migrated; encoding always writes version 3.

use thiserror::Error;

use crate::record::FileRecord;

/// Format version written by [`encode`].
pub const CURRENT_VERSION: u32 = 3;

/// Upper bound on a record file's size. Any real record is far smaller; a
/// bigger file cannot be a catalog record and is rejected before parsing.
pub const MAX_RECORD_SIZE: u64 = 1024 * 1024;

const HEADER_KEY: &str = "CatalogFS";
const LEGACY_HEADER_PREFIX: &str = "CatalogFS.File.";
const FIELD_DELIMITER: char = '=';
const LEGACY_FIELD_DELIMITER: &str = ": ";
const TRIM_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

/// A record could not be decoded. Decoding never returns partial data.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The data does not start with a recognizable CatalogFS header.
    #[error("CatalogFS record expected but no valid header found")]
    MissingHeader,

    /// The header version is not an integer.
    #[error("CatalogFS record has invalid version string: {0:?}")]
    InvalidVersion(String),

    /// The header version is an integer this decoder does not support.
    #[error("CatalogFS record has unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// A non-blank body line has no field delimiter.
    #[error("invalid line in CatalogFS record: {0:?}")]
    InvalidLine(String),

    /// A field value failed to parse as an integer.
    #[error("field {field:?} has invalid value {value:?}")]
    InvalidValue { field: String, value: String },

    /// A field name this decoder does not know.
    #[error("unknown field in CatalogFS record: {0:?}")]
    UnknownField(String),

    /// The file is too large to be a record at all.
    #[error("file is too big ({0} bytes) to be a valid CatalogFS record")]
    TooLarge(u64),

    /// The file is not valid UTF-8.
    #[error("CatalogFS record is not valid UTF-8")]
    NotUtf8,
}

/// Serialize a record to its on-disk text form.
///
/// Only fields that are present are written; callers select the field set by
/// projecting the record first ([`FileRecord::project`]). Nanosecond fields
/// are omitted when zero, matching what other CatalogFS writers produce.
pub fn encode(record: &FileRecord) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(HEADER_KEY);
    out.push(FIELD_DELIMITER);
    out.push_str(&CURRENT_VERSION.to_string());
    out.push('\n');

    push_field(&mut out, "size", record.size.map(|v| v.to_string()));
    push_field(&mut out, "blocks", record.blocks.map(|v| v.to_string()));
    push_field(&mut out, "mode", record.mode.map(|v| v.to_string()));
    push_field(&mut out, "uid", record.uid.map(|v| v.to_string()));
    push_field(&mut out, "gid", record.gid.map(|v| v.to_string()));
    push_field(&mut out, "atime", record.atime.map(|v| v.to_string()));
    push_field(&mut out, "mtime", record.mtime.map(|v| v.to_string()));
    push_field(&mut out, "ctime", record.ctime.map(|v| v.to_string()));
    push_nsec(&mut out, "atimensec", record.atimensec);
    push_nsec(&mut out, "mtimensec", record.mtimensec);
    push_nsec(&mut out, "ctimensec", record.ctimensec);
    push_field(&mut out, "nlink", record.nlink.map(|v| v.to_string()));
    push_field(&mut out, "blksize", record.blksize.map(|v| v.to_string()));
    push_field(&mut out, "sha256", record.sha256.clone());

    out
}

fn push_field(out: &mut String, key: &str, value: Option<String>) {
    if let Some(value) = value {
        out.push_str(key);
        out.push(FIELD_DELIMITER);
        out.push_str(&value);
        out.push('\n');
    }
}

fn push_nsec(out: &mut String, key: &str, value: Option<u32>) {
    match value {
        Some(v) if v != 0 => push_field(out, key, Some(v.to_string())),
        _ => {}
    }
}

/// Deserialize a record from its on-disk text form, any supported version.
pub fn decode(data: &str) -> Result<FileRecord, RecordError> {
    if data.starts_with(LEGACY_HEADER_PREFIX) {
        return decode_legacy(data);
    }
    decode_v3(data)
}

/// Decode raw bytes read from a record file.
///
/// Applies the size cap and the UTF-8 requirement before parsing.
pub fn decode_bytes(data: &[u8]) -> Result<FileRecord, RecordError> {
    if data.len() as u64 > MAX_RECORD_SIZE {
        return Err(RecordError::TooLarge(data.len() as u64));
    }
    let text = std::str::from_utf8(data).map_err(|_| RecordError::NotUtf8)?;
    decode(text)
}

fn decode_v3(data: &str) -> Result<FileRecord, RecordError> {
    let mut lines = data.split(['\n', '\r']);

    // Header is the first non-blank line and must be CatalogFS=<version>.
    let header = loop {
        match lines.next() {
            Some(line) if line.trim_matches(TRIM_CHARS).is_empty() => continue,
            Some(line) => break line,
            None => return Err(RecordError::MissingHeader),
        }
    };
    let (key, version_str) = split_pair(header).map_err(|_| RecordError::MissingHeader)?;
    if key != HEADER_KEY {
        return Err(RecordError::MissingHeader);
    }
    let version: u32 = version_str
        .trim_matches(TRIM_CHARS)
        .parse()
        .map_err(|_| RecordError::InvalidVersion(version_str.to_string()))?;
    if version != CURRENT_VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }

    let mut record = FileRecord::new();
    for line in lines {
        if line.trim_matches(TRIM_CHARS).is_empty() {
            continue;
        }
        let (key, value) = split_pair(line)?;
        set_field(&mut record, key, value)?;
    }
    Ok(record)
}

/// Split a `key=value` line, trimming whitespace around the key.
fn split_pair(line: &str) -> Result<(&str, &str), RecordError> {
    match line.split_once(FIELD_DELIMITER) {
        Some((key, value)) => Ok((key.trim_matches(TRIM_CHARS), value)),
        None => Err(RecordError::InvalidLine(line.to_string())),
    }
}

fn set_field(record: &mut FileRecord, key: &str, value: &str) -> Result<(), RecordError> {
    match key {
        "size" => record.size = Some(parse_int(key, value)?),
        "blocks" => record.blocks = Some(parse_int(key, value)?),
        "mode" => record.mode = Some(parse_int(key, value)?),
        "uid" => record.uid = Some(parse_int(key, value)?),
        "gid" => record.gid = Some(parse_int(key, value)?),
        "atime" => record.atime = Some(parse_int(key, value)?),
        "mtime" => record.mtime = Some(parse_int(key, value)?),
        "ctime" => record.ctime = Some(parse_int(key, value)?),
        "atimensec" => record.atimensec = Some(parse_int(key, value)?),
        "mtimensec" => record.mtimensec = Some(parse_int(key, value)?),
        "ctimensec" => record.ctimensec = Some(parse_int(key, value)?),
        "nlink" => record.nlink = Some(parse_int(key, value)?),
        "blksize" => record.blksize = Some(parse_int(key, value)?),
        "sha256" => record.sha256 = Some(value.trim_matches(TRIM_CHARS).to_string()),
        _ => return Err(RecordError::UnknownField(key.to_string())),
    }
    Ok(())
}

fn parse_int<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, RecordError> {
    value
        .trim_matches(TRIM_CHARS)
        .parse()
        .map_err(|_| RecordError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Decode a version 1 or 2 record.
///
/// Legacy bodies use `key: value` lines. The `name` and `path` values may
/// contain any character except NUL (including newlines) and are terminated
/// by `\0\n`; both are obsolete and skipped.
fn decode_legacy(data: &str) -> Result<FileRecord, RecordError> {
    let header_end = data.find('\n').ok_or(RecordError::MissingHeader)?;
    let version_str = &data[LEGACY_HEADER_PREFIX.len()..header_end];
    let version: u32 = version_str
        .trim_matches(TRIM_CHARS)
        .parse()
        .map_err(|_| RecordError::InvalidVersion(version_str.to_string()))?;
    if version != 1 && version != 2 {
        return Err(RecordError::UnsupportedVersion(version));
    }

    let mut record = FileRecord::new();
    let mut rest = &data[header_end + 1..];

    while !rest.is_empty() {
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_end];

        let Some(delim) = line.find(LEGACY_FIELD_DELIMITER) else {
            if !line.trim_matches(TRIM_CHARS).is_empty() {
                return Err(RecordError::InvalidLine(line.to_string()));
            }
            rest = &rest[(line_end + 1).min(rest.len())..];
            continue;
        };

        let key = &line[..delim];
        let value_start = delim + LEGACY_FIELD_DELIMITER.len();

        if key == "name" || key == "path" {
            // Value runs until \0\n and may span multiple lines.
            let tail = &rest[value_start..];
            rest = match tail.find("\0\n") {
                Some(end) => &tail[end + 2..],
                None => "",
            };
            continue;
        }

        set_field(&mut record, key, &line[value_start..])?;
        rest = &rest[(line_end + 1).min(rest.len())..];
    }

    Ok(record)
}
