use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Plain-text tables
// ---------------------------------------------------------------------------

/// Write one value per line in full precision.
pub fn write_column(path: &Path, values: &[f64]) -> Result<()> {
    let rows: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
    write_rows(path, None, &rows)
}

/// Write rows of whitespace-separated values, with an optional `#` header.
pub fn write_rows(path: &Path, header: Option<&str>, rows: &[Vec<f64>]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    if let Some(header) = header {
        writeln!(out, "# {header}")?;
    }
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.18e}")).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    log::debug!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON summaries
// ---------------------------------------------------------------------------

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing JSON to {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Write named `f64` columns of equal length to a Parquet file.
pub fn write_parquet(path: &Path, names: &[&str], columns: &[Vec<f64>]) -> Result<()> {
    if names.len() != columns.len() {
        bail!("{} column names for {} columns", names.len(), columns.len());
    }
    ensure_parent(path)?;

    let schema = Arc::new(Schema::new(
        names
            .iter()
            .map(|n| Field::new(*n, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|c| Arc::new(Float64Array::from(c.clone())) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load_column, load_table};

    #[test]
    fn test_text_column_reloads_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/values.txt");
        let values = vec![0.0, 1.0 / 3.0, 6.02e23, -1.5e-300];
        write_column(&path, &values).unwrap();
        assert_eq!(load_column(&path).unwrap(), values);
    }

    #[test]
    fn test_header_is_a_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.txt");
        write_rows(&path, Some("a b"), &[vec![1.0, 2.0]]).unwrap();
        let table = load_table(&path).unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.column(1).unwrap(), &[2.0]);
    }

    #[test]
    fn test_parquet_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.parquet");
        write_parquet(&path, &["energy", "flux"], &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let table = load_table(&path).unwrap();
        assert_eq!(table.column_names, vec!["energy", "flux"]);
        assert_eq!(table.column(1).unwrap(), &[3.0, 4.0]);
    }
}
