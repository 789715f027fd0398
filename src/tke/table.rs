use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tabled::builder::Builder;
use tabled::settings::Style;
use thiserror::Error;

// CSI sequences (colours, cursor movement), OSC sequences (window titles) and lone escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid ANSI escape pattern")
});

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("table header not found: {0}")]
    HeaderNotFound(String),

    #[error("marker not found: '{0}'")]
    MarkerNotFound(String),
}

pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").replace('\r', "")
}

/// Returns the text after the first line containing `marker`.
pub fn section_after<'a>(text: &'a str, marker: &str) -> Result<&'a str, TableError> {
    let start = text
        .find(marker)
        .ok_or_else(|| TableError::MarkerNotFound(marker.to_string()))?;
    let rest = &text[start..];
    Ok(match rest.find('\n') {
        Some(end) => &rest[end + 1..],
        None => "",
    })
}

/// One row of a CLI table, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: BTreeMap<String, String>,
}

impl Record {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, header: &str, value: &str) -> Option<&Record> {
        self.rows.iter().find(|row| row.get(header) == Some(value))
    }

    pub fn column(&self, header: &str) -> Vec<&str> {
        self.rows.iter().filter_map(|row| row.get(header)).collect()
    }

    pub fn render(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().cloned());
        for row in &self.rows {
            builder.push_record(
                self.headers
                    .iter()
                    .map(|h| row.get(h).unwrap_or_default().to_string()),
            );
        }
        let mut table = builder.build();
        table.with(Style::psql());
        table.to_string()
    }
}

/// Parses a fixed-width table printed by the TKE plugin.
///
/// Column boundaries come from the header positions. Rows run until the first blank
/// line; a row whose first column is empty continues the previous record.
pub fn parse_table(text: &str, headers: &[&str]) -> Result<Table, TableError> {
    let clean = strip_ansi(text);
    let mut lines = clean.lines();

    let offsets = loop {
        let line = lines
            .next()
            .ok_or_else(|| TableError::HeaderNotFound(headers.join(" | ")))?;
        if let Some(offsets) = header_offsets(line, headers) {
            break offsets;
        }
    };

    let mut rows: Vec<Record> = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let cells = split_at_offsets(line, &offsets);
        let continuation = cells.first().is_some_and(|c| c.is_empty());

        match rows.last_mut() {
            Some(previous) if continuation => {
                for (header, cell) in headers.iter().zip(cells) {
                    if cell.is_empty() {
                        continue;
                    }
                    let entry = previous.cells.entry(header.to_string()).or_default();
                    if !entry.is_empty() {
                        entry.push(' ');
                    }
                    entry.push_str(&cell);
                }
            }
            _ => rows.push(Record {
                cells: headers
                    .iter()
                    .map(|h| h.to_string())
                    .zip(cells)
                    .collect(),
            }),
        }
    }

    Ok(Table {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    })
}

fn header_offsets(line: &str, headers: &[&str]) -> Option<Vec<usize>> {
    let mut offsets = Vec::with_capacity(headers.len());
    let mut cursor = 0;
    for header in headers {
        let found = line[cursor..].find(header)? + cursor;
        // Rows are sliced by character, not byte
        offsets.push(line[..found].chars().count());
        cursor = found + header.len();
    }
    Some(offsets)
}

fn split_at_offsets(line: &str, offsets: &[usize]) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    offsets
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = offsets.get(i + 1).copied().unwrap_or(chars.len());
            if start >= chars.len() {
                return String::new();
            }
            chars[start..end.min(chars.len())]
                .iter()
                .collect::<String>()
                .trim()
                .to_string()
        })
        .collect()
}
