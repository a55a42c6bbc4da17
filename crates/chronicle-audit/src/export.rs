//! Export serialization to CSV and JSON.
//!
//! [`ExportStream`] renders a page lazily, one chunk per record. It owns the
//! page it renders, so dropping the stream at any point (a disconnected
//! client, for instance) releases the result set.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use chronicle_core::Timestamp;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::entry::LogRecord;
use crate::error::{AuditError, AuditResult};
use crate::search::Page;

/// Number of records an export is bounded to by default.
pub const DEFAULT_EXPORT_PAGE_LIMIT: u32 = 1000;

/// UTF-8 byte-order marker written at the start of a CSV export.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV column headers, in column order.
pub const CSV_HEADERS: [&str; 7] = [
    "Timestamp",
    "Actor",
    "System",
    "Action",
    "Resource",
    "Outcome",
    "Source Address",
];

const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const JSON_INDENT: &[u8] = b"    ";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated values with a BOM and header row.
    Csv,
    /// Pretty-printed JSON array.
    Json,
}

impl ExportFormat {
    /// Lowercase name, also used as the file extension.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// MIME type for the export body.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/plain; charset=UTF-8",
            Self::Json => "application/json; charset=UTF-8",
        }
    }

    /// Download filename for an export taken at `at`.
    #[must_use]
    pub fn filename(&self, at: Timestamp) -> String {
        format!("logs_{}.{}", at.format("%Y-%m-%d_%H%M%S"), self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(AuditError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preamble,
    Records,
    Done,
}

/// Lazy byte stream of an export.
///
/// Yields the preamble, then one chunk per record, then any closing bytes.
/// After an error the stream ends.
pub struct ExportStream {
    format: ExportFormat,
    page: Arc<Page>,
    next: usize,
    stage: Stage,
}

impl ExportStream {
    /// Stream `page` in the given format.
    #[must_use]
    pub fn new(page: Arc<Page>, format: ExportFormat) -> Self {
        Self {
            format,
            page,
            next: 0,
            stage: Stage::Preamble,
        }
    }

    /// The output format.
    #[must_use]
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Number of records the stream will emit in total.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.page.len()
    }

    /// Drain the stream into `writer`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails. Output already
    /// written stays written.
    pub fn write_to<W: Write>(self, writer: &mut W) -> AuditResult<u64> {
        let mut written: u64 = 0;
        for chunk in self {
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        }
        writer.flush()?;
        Ok(written)
    }

    /// Render the whole export into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn into_bytes(self) -> AuditResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn preamble(&self) -> Vec<u8> {
        match self.format {
            ExportFormat::Csv => {
                let mut out = UTF8_BOM.to_vec();
                push_csv_line(&mut out, &CSV_HEADERS);
                out
            },
            ExportFormat::Json => b"[\n".to_vec(),
        }
    }

    fn render(&self, record: &LogRecord, first: bool) -> AuditResult<Vec<u8>> {
        match self.format {
            ExportFormat::Csv => Ok(csv_row(record)),
            ExportFormat::Json => json_element(record, first),
        }
    }
}

impl Iterator for ExportStream {
    type Item = AuditResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Preamble => {
                if self.format == ExportFormat::Json && self.page.is_empty() {
                    self.stage = Stage::Done;
                    return Some(Ok(b"[]".to_vec()));
                }
                self.stage = Stage::Records;
                Some(Ok(self.preamble()))
            },
            Stage::Records => {
                let Some(record) = self.page.records.get(self.next) else {
                    self.stage = Stage::Done;
                    return match self.format {
                        ExportFormat::Csv => None,
                        ExportFormat::Json => Some(Ok(b"\n]".to_vec())),
                    };
                };
                let chunk = self.render(record, self.next == 0);
                self.next = self.next.saturating_add(1);
                if chunk.is_err() {
                    self.stage = Stage::Done;
                }
                Some(chunk)
            },
            Stage::Done => None,
        }
    }
}

impl std::iter::FusedIterator for ExportStream {}

impl fmt::Debug for ExportStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportStream")
            .field("format", &self.format)
            .field("records", &self.page.len())
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

/// Parse `format` and stream `page` in it.
///
/// # Errors
///
/// Returns [`AuditError::UnsupportedFormat`] before producing any output if
/// the format is not recognized.
pub fn serialize(page: Arc<Page>, format: &str) -> AuditResult<ExportStream> {
    let format = format.parse()?;
    Ok(ExportStream::new(page, format))
}

/// A ready-to-send export.
#[derive(Debug)]
pub struct Export {
    /// Suggested download filename.
    pub filename: String,
    /// Output format.
    pub format: ExportFormat,
    /// The body.
    pub stream: ExportStream,
}

impl Export {
    /// MIME type for the body.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

fn csv_row(record: &LogRecord) -> Vec<u8> {
    let body = &record.body;
    let timestamp = body.timestamp.format(CSV_TIMESTAMP_FORMAT);
    let address = body.source_address.to_string();
    let mut out = Vec::new();
    push_csv_line(
        &mut out,
        &[
            timestamp.as_str(),
            &body.actor,
            &body.system,
            &body.action,
            &body.resource,
            &body.outcome,
            address.as_str(),
        ],
    );
    out
}

fn push_csv_line(out: &mut Vec<u8>, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        push_csv_field(out, field);
    }
    out.push(b'\n');
}

/// RFC 4180 quoting: wrap in quotes when needed, double embedded quotes.
fn push_csv_field(out: &mut Vec<u8>, field: &str) {
    if !field.contains([',', '"', '\r', '\n']) {
        out.extend_from_slice(field.as_bytes());
        return;
    }
    out.push(b'"');
    for b in field.bytes() {
        if b == b'"' {
            out.push(b'"');
        }
        out.push(b);
    }
    out.push(b'"');
}

/// One array element, indented one level, preceded by a separator unless first.
fn json_element(record: &LogRecord, first: bool) -> AuditResult<Vec<u8>> {
    let mut rendered = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut rendered,
        PrettyFormatter::with_indent(JSON_INDENT),
    );
    record.serialize(&mut serializer)?;

    let mut out = Vec::with_capacity(rendered.len().saturating_add(64));
    if !first {
        out.extend_from_slice(b",\n");
    }
    out.extend_from_slice(JSON_INDENT);
    for b in rendered {
        out.push(b);
        // Pretty output never has raw newlines inside strings.
        if b == b'\n' {
            out.extend_from_slice(JSON_INDENT);
        }
    }
    Ok(out)
}
