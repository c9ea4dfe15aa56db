use crate::domain::model::RosterEntry;
use crate::utils::error::{CertError, Result};
use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;
use std::path::Path;

const NAME_COLUMN: &str = "Name";
const EMAIL_COLUMN: &str = "Email";

/// Where the rows come from: a delimited text file or the first sheet of a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    Delimited(u8),
    Spreadsheet,
}

/// Parses a participant file into ordered, validated entries.
#[derive(Debug, Clone, Copy)]
pub struct RosterLoader {
    format: RosterFormat,
}

impl RosterLoader {
    pub fn new(delimiter: u8) -> Self {
        Self {
            format: RosterFormat::Delimited(delimiter),
        }
    }

    pub fn spreadsheet() -> Self {
        Self {
            format: RosterFormat::Spreadsheet,
        }
    }

    pub fn format(&self) -> RosterFormat {
        self.format
    }

    /// Picks the reader from the extension: `.csv`, `.tsv`, or `.xlsx`/`.xls` workbooks.
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(Self::new(b',')),
            Some("tsv") => Ok(Self::new(b'\t')),
            Some("xlsx") | Some("xls") => Ok(Self::spreadsheet()),
            _ => Err(CertError::MalformedRoster {
                message: format!("{} is not a .csv, .tsv, .xlsx or .xls file", path.display()),
            }),
        }
    }

    pub async fn load(path: &Path) -> Result<Vec<RosterEntry>> {
        let loader = Self::for_path(path)?;
        let data = tokio::fs::read(path).await?;
        let entries = loader.parse(&data)?;
        tracing::info!("👥 Loaded {} participants from {}", entries.len(), path.display());
        Ok(entries)
    }

    pub fn parse(&self, data: &[u8]) -> Result<Vec<RosterEntry>> {
        match self.format {
            RosterFormat::Delimited(delimiter) => parse_delimited(delimiter, data),
            RosterFormat::Spreadsheet => parse_spreadsheet(data),
        }
    }
}

impl Default for RosterLoader {
    fn default() -> Self {
        Self::new(b',')
    }
}

fn parse_delimited(delimiter: u8, data: &[u8]) -> Result<Vec<RosterEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .into_records()
        .map(|row| {
            row.map(|r| r.iter().map(str::to_string).collect::<Vec<String>>())
                .map_err(CertError::from)
        });
    collect_entries(&headers, rows)
}

// 只讀第一個工作表，第一列是標題
fn parse_spreadsheet(data: &[u8]) -> Result<Vec<RosterEntry>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CertError::MalformedRoster {
            message: "workbook has no sheets".to_string(),
        })??;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<String>>());
    let headers = rows.next().ok_or_else(|| CertError::MalformedRoster {
        message: "first sheet is empty".to_string(),
    })?;
    collect_entries(&headers, rows.map(Ok))
}

/// Shared row loop: resolves the two columns, numbers rows from 1, skips nameless rows.
fn collect_entries<I>(headers: &[String], rows: I) -> Result<Vec<RosterEntry>>
where
    I: Iterator<Item = Result<Vec<String>>>,
{
    let name_idx = find_column(headers, NAME_COLUMN);
    let email_idx = find_column(headers, EMAIL_COLUMN);

    let (name_idx, email_idx) = match (name_idx, email_idx) {
        (Some(n), Some(e)) => (n, e),
        (n, e) => {
            let missing: Vec<&str> = [(n, NAME_COLUMN), (e, EMAIL_COLUMN)]
                .iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, col)| *col)
                .collect();
            return Err(CertError::MalformedRoster {
                message: format!("missing required column(s): {}", missing.join(", ")),
            });
        }
    };

    let mut entries = Vec::new();
    for (position, row) in rows.enumerate() {
        let row = row?;
        let row_index = position as u32 + 1;
        let name = row.get(name_idx).cloned().unwrap_or_default();
        let email = row.get(email_idx).cloned().unwrap_or_default();

        if name.is_empty() {
            tracing::warn!("⚠️ Row {} has no name, skipping", row_index);
            continue;
        }

        let email_missing = email.is_empty();
        if email_missing {
            tracing::debug!("Row {} ({}) has no email, it can only be generated", row_index, name);
        }

        entries.push(RosterEntry {
            row_index,
            name,
            email,
            email_missing,
        });
    }

    Ok(entries)
}

// 先精確比對，找不到再忽略大小寫
fn find_column(headers: &[String], wanted: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim() == wanted)
        .or_else(|| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(wanted)))
}
