use calamine::{open_workbook_auto, Data, Reader};
use sha2::{Digest, Sha256};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),
    #[error("workbook has no worksheets")]
    NoWorksheet,
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Rectangular grid of normalized cell text. Missing cells read as "".
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    rows: usize,
    cols: usize,
    cells: Vec<String>,
}

impl CellGrid {
    /// Builds a grid from ragged rows; short rows are padded with blanks.
    pub fn from_rows<R, S>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<Vec<String>> = rows
            .into_iter()
            .map(|r| r.into_iter().map(|s| normalize_cell_text(s.as_ref())).collect())
            .collect();
        let cols = raw.iter().map(|r| r.len()).max().unwrap_or(0);
        let rows = raw.len();
        let mut cells = Vec::with_capacity(rows * cols);
        for mut r in raw {
            r.resize(cols, String::new());
            cells.extend(r);
        }
        Self {
            rows,
            cols,
            cells,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn col_count(&self) -> usize {
        self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        if row >= self.rows || col >= self.cols {
            return "";
        }
        &self.cells[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[String] {
        if row >= self.rows {
            return &[];
        }
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Cell text, or `None` when blank.
    pub fn value(&self, row: usize, col: usize) -> Option<String> {
        let v = self.cell(row, col);
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    }
}

/// NFC-normalizes and trims; NaN placeholders left behind by other tools become blank.
pub fn normalize_cell_text(raw: &str) -> String {
    let text: String = raw.nfc().collect();
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    text.to_string()
}

pub fn data_to_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn json_to_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Grid from an inline JSON array of arrays. Numbers keep their JSON spelling.
pub fn grid_from_json(rows: &[serde_json::Value]) -> CellGrid {
    CellGrid::from_rows(rows.iter().map(|r| {
        r.as_array()
            .map(|cells| cells.iter().map(json_to_text).collect::<Vec<_>>())
            .unwrap_or_default()
    }))
}

/// Loads the first worksheet of a spreadsheet file, or a headerless CSV.
pub fn load_grid(path: &Path) -> Result<CellGrid, GridError> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => load_csv(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path),
        _ => Err(GridError::UnsupportedExtension(ext)),
    }
}

fn load_workbook(path: &Path) -> Result<CellGrid, GridError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(GridError::NoWorksheet)??;
    Ok(CellGrid::from_rows(
        range
            .rows()
            .map(|r| r.iter().map(data_to_text).collect::<Vec<_>>()),
    ))
}

fn load_csv(path: &Path) -> Result<CellGrid, GridError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(CellGrid::from_rows(rows))
}

pub fn file_sha256(path: &Path) -> Result<String, GridError> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
