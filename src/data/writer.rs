use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use super::model::{Column, FitresTable};

/// Save a table, choosing the format from the extension (same set as
/// [`super::loader::load_file`]).
pub fn save_file(table: &FitresTable, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "fitres" | "txt" | "dat" => save_fitres(table, path),
        "csv" => save_csv(table, path),
        "json" => save_json(table, path),
        "parquet" | "pq" => save_parquet(table, path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    debug!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// FITRES
// ---------------------------------------------------------------------------

pub(crate) fn render_fitres(table: &FitresTable) -> String {
    let names = table.column_names();
    let mut out = format!("NVAR: {}\nVARNAMES: {}\n", names.len(), names.join(" "));
    let columns: Vec<&Column> = names.iter().filter_map(|n| table.column(n)).collect();
    for row in 0..table.len() {
        out.push_str("SN:");
        for col in &columns {
            out.push(' ');
            out.push_str(&col.cell(row).to_string());
        }
        out.push('\n');
    }
    out
}

fn save_fitres(table: &FitresTable, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path).context("creating FITRES file")?;
    file.write_all(render_fitres(table).as_bytes())
        .context("writing FITRES file")
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn save_csv(table: &FitresTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let names = table.column_names();
    writer.write_record(names).context("writing CSV header")?;

    let columns: Vec<&Column> = names.iter().filter_map(|n| table.column(n)).collect();
    for row in 0..table.len() {
        let record: Vec<String> = columns.iter().map(|c| c.cell(row).to_string()).collect();
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON (columns-as-lists)
// ---------------------------------------------------------------------------

fn save_json(table: &FitresTable, path: &Path) -> Result<()> {
    let mut root = Map::new();
    for name in table.column_names() {
        let values = match table.column(name) {
            // Non-finite floats have no JSON form; write them as null.
            Some(Column::Float(v)) => v.iter().map(|&x| JsonValue::from(x)).collect(),
            Some(Column::Text(v)) => v.iter().map(|s| JsonValue::from(s.as_str())).collect(),
            None => continue,
        };
        root.insert(name.clone(), JsonValue::Array(values));
    }
    let text = serde_json::to_string_pretty(&JsonValue::Object(root)).context("encoding JSON")?;
    std::fs::write(path, text).context("writing JSON file")
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn save_parquet(table: &FitresTable, path: &Path) -> Result<()> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for name in table.column_names() {
        match table.column(name) {
            Some(Column::Float(v)) => {
                fields.push(Field::new(name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(v.clone())));
            }
            Some(Column::Text(v)) => {
                fields.push(Field::new(name, DataType::Utf8, false));
                arrays.push(Arc::new(StringArray::from(v.clone())));
            }
            None => {}
        }
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
