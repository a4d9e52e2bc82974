//! Markdown rendering helpers shared by the handlers.

use chrono::{DateTime, Utc};
use tm_domain::error::{Error, Result};

/// Rows shown in CSV previews.
pub const PREVIEW_ROWS: usize = 5;

pub fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "Unknown".into(),
    }
}

pub fn last_login(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "Never".into(),
    }
}

/// `1234567` → `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `1572864` → `1,572,864 bytes (1.5 MB)`.
pub fn byte_size(bytes: u64) -> String {
    format!(
        "{} bytes ({:.1} MB)",
        thousands(bytes),
        bytes as f64 / (1024.0 * 1024.0)
    )
}

/// Split a Tableau enum such as `SiteAdministratorCreator` into words.
pub fn humanize(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut prev_lower = false;
    for ch in identifier.chars() {
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.push(ch);
    }
    out
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Render a Markdown table. Short rows are padded with empty cells.
pub fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| cell(h)).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("| {} |\n", vec!["---"; headers.len()].join(" | ")));
    for row in rows {
        let cells: Vec<String> = (0..headers.len())
            .map(|i| row.get(i).map(|c| cell(c)).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CSV
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A parsed view export: the header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse a view export. Tableau writes RFC 4180 CSV with an optional
    /// UTF-8 BOM; blank lines are skipped and rows may be ragged.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let headers = match records.next() {
            Some(record) => row(record.map_err(csv_error)?),
            None => return Ok(Self::default()),
        };
        let rows = records
            .map(|record| record.map(row).map_err(csv_error))
            .collect::<Result<_>>()?;
        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Markdown preview of the first `limit` rows, with a trailer naming
    /// how many rows were left out.
    pub fn preview(&self, limit: usize) -> String {
        let shown = &self.rows[..self.rows.len().min(limit)];
        let mut out = markdown_table(&self.headers, shown);
        if self.rows.len() > limit {
            out.push_str(&format!("\n... and {} more rows.\n", self.rows.len() - limit));
        }
        out
    }
}

fn row(record: csv::StringRecord) -> Vec<String> {
    record.iter().map(str::to_owned).collect()
}

fn csv_error(e: csv::Error) -> Error {
    Error::Remote(format!("unreadable view CSV: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn byte_size_reports_megabytes() {
        assert_eq!(byte_size(1_572_864), "1,572,864 bytes (1.5 MB)");
    }

    #[test]
    fn humanize_splits_camel_case() {
        assert_eq!(humanize("SiteAdministratorCreator"), "Site Administrator Creator");
        assert_eq!(humanize("Viewer"), "Viewer");
        assert_eq!(humanize("ContentAndUsers"), "Content And Users");
    }

    #[test]
    fn csv_handles_quotes_and_crlf() {
        let table = CsvTable::parse("\u{feff}Name,Note\r\n\"Smith, J\",\"said \"\"hi\"\"\"\r\nLee,\"two\nlines\"\r\n").unwrap();
        assert_eq!(table.headers, ["Name", "Note"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], ["Smith, J", "said \"hi\""]);
        assert_eq!(table.rows[1][1], "two\nlines");
    }

    #[test]
    fn csv_without_trailing_newline_keeps_last_row() {
        let table = CsvTable::parse("a,b\n1,2").unwrap();
        assert_eq!(table.rows, vec![vec!["1".to_owned(), "2".to_owned()]]);
    }

    #[test]
    fn empty_csv_has_no_headers() {
        assert!(CsvTable::parse("").unwrap().is_empty());
        assert!(CsvTable::parse("\n\n").unwrap().is_empty());
    }

    #[test]
    fn preview_truncates_and_escapes() {
        let table = CsvTable::parse("k,v\na,1\nb,2\nc|d,3\n").unwrap();
        let preview = table.preview(2);
        assert!(preview.starts_with("| k | v |\n| --- | --- |\n| a | 1 |\n| b | 2 |\n"));
        assert!(preview.contains("... and 1 more rows."));

        let full = table.preview(10);
        assert!(full.contains("c\\|d"));
    }
}
