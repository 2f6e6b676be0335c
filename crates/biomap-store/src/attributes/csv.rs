use std::path::{Path, PathBuf};

use biomap_core::config::FieldConfig;
use biomap_core::error::{BiomapError, Result};
use biomap_core::models::AttributeRecord;
use biomap_core::ports::AttributeStore;

use super::MemoryAttributeStore;

/// Attribute table loaded from a CSV file.
///
/// The name and code columns are found through the configured polygon field
/// names. Every other column holding numbers becomes a value field; blank or
/// non-numeric cells are left absent. Semicolon-separated files with decimal
/// commas are accepted.
#[derive(Debug, Clone)]
pub struct CsvAttributeStore {
    path: PathBuf,
    inner: MemoryAttributeStore,
}

impl CsvAttributeStore {
    pub fn from_path(path: impl AsRef<Path>, fields: &FieldConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| BiomapError::unavailable("attribute table", format!("{}: {}", path.display(), e)))?;
        let inner = parse(&content, fields).map_err(|message| BiomapError::Format {
            format: "CSV".to_string(),
            path: path.clone(),
            message,
        })?;

        tracing::info!(path = %path.display(), rows = inner.len(), "Attribute table loaded");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttributeStore for CsvAttributeStore {
    fn lookup(&self, name: &str, external_code: Option<&str>) -> Result<Option<AttributeRecord>> {
        self.inner.lookup(name, external_code)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn parse_number(cell: &str, decimal_comma: bool) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    let value = if decimal_comma {
        cell.replace('.', "").replace(',', ".").parse::<f64>().ok()
    } else {
        cell.parse::<f64>().ok()
    };
    value.filter(|v| v.is_finite())
}

fn find_column(headers: &csv::StringRecord, candidates: &[String]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(c)))
}

fn parse(content: &str, fields: &FieldConfig) -> std::result::Result<MemoryAttributeStore, String> {
    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let name_col = find_column(&headers, &fields.polygon_name).ok_or_else(|| {
        format!("no name column, expected one of {}", fields.polygon_name.join(", "))
    })?;
    let code_col = find_column(&headers, &fields.polygon_code);

    let mut store = MemoryAttributeStore::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| format!("row {}: {}", line + 2, e))?;
        let Some(name) = row.get(name_col).filter(|n| !n.is_empty()) else {
            tracing::debug!(row = line + 2, "Skipping attribute row without a name");
            continue;
        };

        let mut record = AttributeRecord::new(name);
        if let Some(code) = code_col.and_then(|i| row.get(i)).filter(|c| !c.is_empty()) {
            record = record.with_code(code);
        }
        for (i, header) in headers.iter().enumerate() {
            if i == name_col || Some(i) == code_col {
                continue;
            }
            if let Some(value) = row.get(i).and_then(|cell| parse_number(cell, delimiter == b';')) {
                record = record.with_value(header.trim(), value);
            }
        }
        store.insert(record);
    }
    Ok(store)
}
