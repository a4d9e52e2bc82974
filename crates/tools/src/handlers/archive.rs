//! Inspection of downloaded data source packages.
//!
//! Tableau returns a `.tdsx` zip archive when the data source has an
//! extract and a bare `.tds` XML document otherwise.

use std::io::{Cursor, Read};

use tm_domain::error::{Error, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const DATA_EXTENSIONS: &[&str] = &[".csv", ".hyper", ".tde"];
const LISTED_FILES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
}

/// What was found inside a downloaded data source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSummary {
    pub is_archive: bool,
    pub entry_count: usize,
    pub data_files: Vec<ArchiveEntry>,
    pub hyper_files: Vec<ArchiveEntry>,
    pub connection_files: usize,
    /// `<column` elements in the first `.tds` document.
    pub estimated_columns: Option<usize>,
}

impl PackageSummary {
    pub fn file_extension(&self) -> &'static str {
        if self.is_archive {
            "tdsx"
        } else {
            "tds"
        }
    }

    pub fn render(&self) -> String {
        use super::format::thousands;

        let mut out = String::new();
        if self.is_archive {
            out.push_str(&format!("**Archive Contents:** {} files\n", self.entry_count));
        } else {
            out.push_str("**Format:** .tds (connection only, no extract)\n");
        }
        if !self.data_files.is_empty() {
            out.push_str(&format!("**Data Files Found:** {}\n", self.data_files.len()));
            for entry in self.data_files.iter().take(LISTED_FILES) {
                out.push_str(&format!("  - {} ({} bytes)\n", entry.name, thousands(entry.size)));
            }
            if self.data_files.len() > LISTED_FILES {
                out.push_str(&format!(
                    "  - ... and {} more data files\n",
                    self.data_files.len() - LISTED_FILES
                ));
            }
        }
        if self.connection_files > 0 {
            out.push_str(&format!("**Connection Files:** {}\n", self.connection_files));
        }
        if let Some(columns) = self.estimated_columns {
            out.push_str(&format!("**Estimated Columns:** ~{columns}\n"));
        }
        if !self.hyper_files.is_empty() {
            out.push_str(&format!("**Hyper Extract Files:** {}\n", self.hyper_files.len()));
            for entry in &self.hyper_files {
                out.push_str(&format!("  - {} ({} bytes)\n", entry.name, thousands(entry.size)));
            }
        }
        out
    }
}

/// Summarise a downloaded package without extracting it to disk.
pub fn inspect(bytes: &[u8]) -> Result<PackageSummary> {
    if !bytes.starts_with(ZIP_MAGIC) {
        let text = String::from_utf8_lossy(bytes);
        return Ok(PackageSummary {
            is_archive: false,
            entry_count: 1,
            connection_files: 1,
            estimated_columns: count_columns(&text),
            ..Default::default()
        });
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Remote(format!("data source archive is unreadable: {e}")))?;

    let mut summary = PackageSummary {
        is_archive: true,
        entry_count: archive.len(),
        ..Default::default()
    };
    let mut first_tds: Option<usize> = None;

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| Error::Remote(format!("data source archive entry {i}: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();
        let lower = name.to_ascii_lowercase();
        let entry = ArchiveEntry {
            name,
            size: file.size(),
        };

        if lower.ends_with(".tds") {
            summary.connection_files += 1;
            first_tds.get_or_insert(i);
        }
        if lower.ends_with(".hyper") {
            summary.hyper_files.push(entry.clone());
        }
        if DATA_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            summary.data_files.push(entry);
        }
    }

    if let Some(index) = first_tds {
        let mut text = String::new();
        let read = archive
            .by_index(index)
            .map_err(|e| e.to_string())
            .and_then(|mut file| file.read_to_string(&mut text).map_err(|e| e.to_string()));
        match read {
            Ok(_) => summary.estimated_columns = count_columns(&text),
            Err(e) => tracing::debug!(error = %e, "could not read .tds from archive"),
        }
    }

    Ok(summary)
}

fn count_columns(tds: &str) -> Option<usize> {
    let count = tds.to_ascii_lowercase().matches("<column").count();
    (count > 0).then_some(count)
}
