use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx, open_workbook};
use log::debug;
use serde_json::{Map, Value};

use super::DocumentSource;

/// Reads spreadsheet exports: `<base_dir>/<stem>.xlsx` when present,
/// otherwise `<base_dir>/<stem>.csv`. The first row holds the column names.
#[derive(Debug, Clone)]
pub struct SheetSource {
    base_dir: PathBuf,
    /// Worksheet to read from workbooks; the first sheet when unset.
    sheet: Option<String>,
}

/// Header row plus data rows, as read from a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SheetSource {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            sheet: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }
}

#[async_trait]
impl DocumentSource for SheetSource {
    async fn fetch_rows(&self, stem: &str) -> Result<Vec<Value>> {
        let xlsx = self.base_dir.join(format!("{}.xlsx", stem));
        let csv = self.base_dir.join(format!("{}.csv", stem));
        let sheet = self.sheet.clone();

        let data = tokio::task::spawn_blocking(move || {
            if xlsx.exists() {
                read_workbook(&xlsx, sheet.as_deref())
            } else {
                read_csv(&csv)
            }
        })
        .await
        .context("Sheet reader task failed")??;

        debug!(
            "Read sheet '{}': {} columns, {} rows",
            data.name,
            data.column_count(),
            data.row_count()
        );
        Ok(data.into_objects())
    }

    fn describe(&self) -> String {
        self.base_dir.display().to_string()
    }
}

impl SheetData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// One JSON object per data row, keyed by header. Empty cells and
    /// unnamed columns are left out so optional fields stay absent.
    pub fn into_objects(self) -> Vec<Value> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_null()))
            .map(|row| {
                let columns: Map<String, Value> = headers
                    .iter()
                    .zip(row)
                    .filter(|(header, cell)| !header.is_empty() && !cell.is_null())
                    .map(|(header, cell)| (header.clone(), cell))
                    .collect();
                Value::Object(columns)
            })
            .collect()
    }
}

pub fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("{} contains no sheets", path.display()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| anyhow!("Error reading sheet '{}': {}", sheet_name, e))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(cell_value).collect()).collect();

    Ok(SheetData {
        name: sheet_name,
        headers,
        rows,
    })
}

pub fn read_csv(path: &Path) -> Result<SheetData> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read record {} of {}", i + 1, path.display()))?;
        rows.push(record.iter().map(text_value).collect());
    }

    Ok(SheetData {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        headers,
        rows,
    })
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => text_value(s),
        other => Value::String(other.to_string()),
    }
}

fn text_value(text: &str) -> Value {
    if text.trim().is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_objects_skips_empty_cells_and_rows() {
        let data = SheetData {
            name: "GRI".into(),
            headers: vec!["question_external_id".into(), "".into(), "monthly".into()],
            rows: vec![
                vec![json!("Q1"), json!("ignored"), Value::Null],
                vec![Value::Null, Value::Null, Value::Null],
                vec![json!("Q2"), Value::Null, json!(true)],
            ],
        };
        let objects = data.into_objects();
        assert_eq!(objects, vec![
            json!({"question_external_id": "Q1"}),
            json!({"question_external_id": "Q2", "monthly": true}),
        ]);
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Int(3)), json!(3));
        assert_eq!(cell_value(&Data::String("  ".into())), Value::Null);
        assert_eq!(cell_value(&Data::Empty), Value::Null);
    }
}
