use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, FitresTable};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a light-curve fit table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.fitres` / `.txt` / `.dat` – SNANA FITRES text (`VARNAMES:` + `SN:` rows)
/// * `.csv`     – header row with one column per field
/// * `.json`    – `[{ "CID": ..., "zHD": ..., ... }, ...]` or `{ "zHD": [...], ... }`
/// * `.parquet` – one flat column per field
pub fn load_file(path: &Path) -> Result<FitresTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "fitres" | "txt" | "dat" => load_fitres(path),
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.column_names().len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Cell typing
// ---------------------------------------------------------------------------

/// A column is numeric when every cell parses as a float; otherwise it is
/// kept as text. Blank cells (how pandas writes NaN) count as NaN.
fn typed_column(cells: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = cells.iter().map(|s| parse_cell(s)).collect();
    match parsed {
        Some(values) => Column::Float(values),
        None => Column::Text(cells),
    }
}

fn parse_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        Some(f64::NAN)
    } else {
        s.parse::<f64>().ok()
    }
}

fn build_table(headers: Vec<String>, mut cells: Vec<Vec<String>>) -> Result<FitresTable> {
    let mut table = FitresTable::new();
    for (name, column) in headers.into_iter().zip(cells.drain(..)) {
        if table.has_column(&name) {
            bail!("duplicate column '{name}'");
        }
        table
            .insert_column(name, typed_column(column))
            .context("assembling table")?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// FITRES loader
// ---------------------------------------------------------------------------

/// SNANA FITRES layout:
///
/// ```text
/// # comment
/// NVAR: 4
/// VARNAMES: CID zHD x1 c
/// SN: 5999398 0.0307 0.43 -0.05
/// ```
///
/// Other `KEY:` lines before the header are ignored.
fn load_fitres(path: &Path) -> Result<FitresTable> {
    let text = std::fs::read_to_string(path).context("reading FITRES file")?;
    parse_fitres(&text)
}

pub(crate) fn parse_fitres(text: &str) -> Result<FitresTable> {
    let mut headers: Option<Vec<String>> = None;
    let mut cells: Vec<Vec<String>> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };

        match key {
            "VARNAMES:" => {
                if headers.is_some() {
                    bail!("line {}: second VARNAMES header", line_no + 1);
                }
                let names: Vec<String> = tokens.map(str::to_string).collect();
                cells = vec![Vec::new(); names.len()];
                headers = Some(names);
            }
            "SN:" => {
                let names = headers
                    .as_ref()
                    .with_context(|| format!("line {}: SN row before VARNAMES", line_no + 1))?;
                let values: Vec<&str> = tokens.collect();
                if values.len() != names.len() {
                    bail!(
                        "line {}: {} values for {} VARNAMES",
                        line_no + 1,
                        values.len(),
                        names.len()
                    );
                }
                for (column, value) in cells.iter_mut().zip(values) {
                    column.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    let headers = headers.context("FITRES file has no VARNAMES header")?;
    build_table(headers, cells)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with field names, one row per supernova.
fn load_csv(path: &Path) -> Result<FitresTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, column) in cells.iter_mut().enumerate() {
            column.push(record.get(col_idx).unwrap_or("").to_string());
        }
    }

    build_table(headers, cells)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Two orientations are accepted, matching pandas `to_json`:
///
/// * records: `[{"CID": "a", "zHD": 0.1}, ...]`
/// * columns-as-lists: `{"CID": ["a", ...], "zHD": [0.1, ...]}`
fn load_json(path: &Path) -> Result<FitresTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

/// Field order follows the document (first record for the records form).
pub(crate) fn parse_json(text: &str) -> Result<FitresTable> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    match &root {
        JsonValue::Array(records) => json_records(records),
        JsonValue::Object(columns) => json_columns(columns),
        _ => bail!("Expected a top-level JSON array or object"),
    }
}

fn json_records(records: &[JsonValue]) -> Result<FitresTable> {
    let mut headers: Vec<String> = Vec::new();
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        if i == 0 {
            headers = obj.keys().cloned().collect();
        }
        if obj.len() != headers.len() {
            bail!("Row {i} has {} fields, expected {}", obj.len(), headers.len());
        }
        for name in &headers {
            let value = obj
                .get(name)
                .with_context(|| format!("Row {i}: missing field '{name}'"))?;
            by_name
                .entry(name.clone())
                .or_default()
                .push(json_cell(value));
        }
    }

    let cells = headers
        .iter()
        .map(|h| by_name.remove(h).unwrap_or_default())
        .collect();
    build_table(headers, cells)
}

fn json_columns(columns: &serde_json::Map<String, JsonValue>) -> Result<FitresTable> {
    let mut headers = Vec::with_capacity(columns.len());
    let mut cells = Vec::with_capacity(columns.len());
    for (name, values) in columns {
        let values = values
            .as_array()
            .with_context(|| format!("column '{name}' is not an array"))?;
        headers.push(name.clone());
        cells.push(values.iter().map(json_cell).collect());
    }
    build_table(headers, cells)
}

/// JSON `null` becomes `nan` so numeric columns with gaps stay numeric.
fn json_cell(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => "nan".to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per field.
///
/// Integer and float columns become numeric; strings and booleans are kept
/// as text. Works with files written by both **Pandas** and **Polars**.
fn load_parquet(path: &Path) -> Result<FitresTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Column> = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (idx, name) in names.iter().enumerate() {
            let chunk = extract_column(batch.column(idx))
                .with_context(|| format!("reading column '{name}'"))?;
            match columns.get_mut(idx) {
                Some(existing) => append_column(existing, chunk)?,
                None => columns.push(chunk),
            }
        }
    }
    if columns.is_empty() {
        columns = names.iter().map(|_| Column::Float(Vec::new())).collect();
    }

    let mut table = FitresTable::new();
    for (name, column) in names.into_iter().zip(columns) {
        table.insert_column(name, column).context("assembling table")?;
    }
    Ok(table)
}

fn append_column(existing: &mut Column, chunk: Column) -> Result<()> {
    match (existing, chunk) {
        (Column::Float(a), Column::Float(b)) => a.extend(b),
        (Column::Text(a), Column::Text(b)) => a.extend(b),
        _ => bail!("column changes type between record batches"),
    }
    Ok(())
}

// -- Parquet / Arrow helpers --

/// Convert one Arrow column chunk. Nulls become NaN (numeric) or "" (text).
fn extract_column(col: &Arc<dyn Array>) -> Result<Column> {
    fn floats<I: Iterator<Item = Option<f64>>>(it: I) -> Column {
        Column::Float(it.map(|v| v.unwrap_or(f64::NAN)).collect())
    }

    let column = match col.data_type() {
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            floats(arr.iter())
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            floats(arr.iter().map(|v| v.map(f64::from)))
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            floats(arr.iter().map(|v| v.map(|i| i as f64)))
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            floats(arr.iter().map(|v| v.map(f64::from)))
        }
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            Column::Text(
                arr.iter()
                    .map(|v| v.unwrap_or("").to_string())
                    .collect(),
            )
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            Column::Text(
                arr.iter()
                    .map(|v| v.unwrap_or("").to_string())
                    .collect(),
            )
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            Column::Text(
                arr.iter()
                    .map(|v| v.map(|b| b.to_string()).unwrap_or_default())
                    .collect(),
            )
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fields;

    const SAMPLE: &str = "\
# written by a light-curve fitter
NVAR: 4
VARNAMES: CID zHD x1 FIELD
SN: 5999398 0.0307 0.43 C3

SN: 5999399 0.1100 -1.2 X1
";

    #[test]
    fn parses_fitres_text() {
        let t = parse_fitres(SAMPLE).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column_names(), &["CID", "zHD", "x1", "FIELD"]);
        assert_eq!(t.floats(fields::Z_HD).unwrap(), &[0.0307, 0.11]);
        assert_eq!(t.floats(fields::CID).unwrap(), &[5999398.0, 5999399.0]);
        assert_eq!(
            t.column("FIELD"),
            Some(&Column::Text(vec!["C3".into(), "X1".into()]))
        );
    }

    #[test]
    fn rejects_short_rows_and_missing_header() {
        assert!(parse_fitres("VARNAMES: a b\nSN: 1\n").is_err());
        assert!(parse_fitres("SN: 1 2\n").is_err());
        assert!(parse_fitres("# nothing\n").is_err());
    }

    #[test]
    fn header_without_rows_gives_empty_table() {
        let t = parse_fitres("VARNAMES: CID zHD\n").unwrap();
        assert!(t.is_empty());
        assert_eq!(t.column_names().len(), 2);
    }

    #[test]
    fn blank_csv_cells_keep_column_numeric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gap.csv");
        let csv = "CID,HOST_LOGMASS,zHD\nsn1,10.5,0.02\nsn2,,0.03\nsn3, ,0.04\n";
        std::fs::write(&path, csv).unwrap();

        let t = load_file(&path).unwrap();
        let mass = t.floats(fields::HOST_LOGMASS).unwrap();
        assert_eq!(mass[0], 10.5);
        assert!(mass[1].is_nan() && mass[2].is_nan());
        assert_eq!(t.floats(fields::Z_HD).unwrap(), &[0.02, 0.03, 0.04]);
    }

    #[test]
    fn text_columns_keep_their_blank_cells() {
        assert_eq!(
            typed_column(vec!["C3".into(), "".into()]),
            Column::Text(vec!["C3".into(), "".into()])
        );
    }

    #[test]
    fn json_records_keep_field_order() {
        let t = parse_json(
            r#"[
                {"zHD": 0.05, "CID": "sn1", "x1": 0.4, "HOST_LOGMASS": null},
                {"zHD": 0.07, "CID": "sn2", "x1": -1.1, "HOST_LOGMASS": 10.8}
            ]"#,
        )
        .unwrap();
        assert_eq!(t.column_names(), &["zHD", "CID", "x1", "HOST_LOGMASS"]);
        assert_eq!(t.floats(fields::Z_HD).unwrap(), &[0.05, 0.07]);
        assert_eq!(t.floats(fields::X1).unwrap(), &[0.4, -1.1]);
        assert_eq!(
            t.column(fields::CID),
            Some(&Column::Text(vec!["sn1".into(), "sn2".into()]))
        );
        let mass = t.floats(fields::HOST_LOGMASS).unwrap();
        assert!(mass[0].is_nan());
        assert_eq!(mass[1], 10.8);
    }

    #[test]
    fn json_columns_keep_field_order() {
        let t = parse_json(r#"{"x1": [1.0], "CID": ["sn1"], "c": [0.1]}"#).unwrap();
        assert_eq!(t.column_names(), &["x1", "CID", "c"]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("sample.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
