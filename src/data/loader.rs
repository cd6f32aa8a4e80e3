use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{FluxTable, NumericTable, StoppingPowerTable};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a numeric table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.dat` / no extension – whitespace-separated columns, `#` comments
/// * `.csv`     – comma-separated, optional header row
/// * `.json`    – `[[...], [...]]` rows or `{ "name": [...], ... }` columns
/// * `.parquet` – one numeric column per table column
pub fn load_table(path: &Path) -> Result<NumericTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        "txt" | "dat" | "" => load_text(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading table {}", path.display()))?;

    log::debug!(
        "loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_columns(),
        path.display()
    );
    Ok(table)
}

/// Load a stopping-power table (keV, eV/Å electronic, eV/Å nuclear).
pub fn load_stopping_power(path: &Path) -> Result<StoppingPowerTable> {
    let table = load_table(path)?;
    StoppingPowerTable::from_table(&table)
        .with_context(|| format!("interpreting {} as a stopping-power table", path.display()))
}

/// Load a continuum flux table (MeV, then fluxes in 1/(cm² s MeV)).
pub fn load_flux_table(path: &Path) -> Result<FluxTable> {
    let table = load_table(path)?;
    FluxTable::from_table(&table)
        .with_context(|| format!("interpreting {} as a flux table", path.display()))
}

/// Load a single-column table (one value per line).
pub fn load_column(path: &Path) -> Result<Vec<f64>> {
    let table = load_table(path)?;
    if table.n_columns() != 1 {
        bail!(
            "{}: expected a single column, found {}",
            path.display(),
            table.n_columns()
        );
    }
    Ok(table.columns.into_iter().next().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Plain-text loader
// ---------------------------------------------------------------------------

/// Whitespace-separated numbers, one row per line. Blank lines and anything
/// after `#` are ignored.
fn load_text(path: &Path) -> Result<NumericTable> {
    let text = std::fs::read_to_string(path).context("reading text table")?;
    parse_text(&text)
}

pub(crate) fn parse_text(text: &str) -> Result<NumericTable> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let row = content
            .split_whitespace()
            .enumerate()
            .map(|(j, tok)| {
                tok.parse::<f64>().with_context(|| {
                    format!("line {}, column {j}: '{tok}' is not a number", line_no + 1)
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(NumericTable::from_rows(None, &rows)?)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: optional header row, then one row of numbers per record.
/// The header is detected by the first record not parsing as numbers.
fn load_csv(path: &Path) -> Result<NumericTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .context("opening CSV")?;

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let parsed: std::result::Result<Vec<f64>, _> =
            record.iter().map(|v| v.parse::<f64>()).collect();
        match parsed {
            Ok(row) => rows.push(row),
            Err(_) if row_no == 0 => {
                headers = Some(record.iter().map(|h| h.to_string()).collect());
            }
            Err(e) => bail!("CSV row {row_no}: {e}"),
        }
    }

    Ok(NumericTable::from_rows(headers, &rows)?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema, either row-oriented:
///
/// ```json
/// [[1.0, 0.12, 0.01], [2.0, 0.14, 0.02]]
/// ```
///
/// or column-oriented (the default `df.to_json(orient='list')`-style dict):
///
/// ```json
/// { "energy": [1.0, 2.0], "flux": [0.12, 0.14] }
/// ```
fn load_json(path: &Path) -> Result<NumericTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    json_to_table(&root)
}

pub(crate) fn json_to_table(root: &JsonValue) -> Result<NumericTable> {
    match root {
        JsonValue::Array(records) => {
            let rows = records
                .iter()
                .enumerate()
                .map(|(i, rec)| match rec {
                    JsonValue::Array(_) => json_array_to_f64(Some(rec), i, "row"),
                    other => other
                        .as_f64()
                        .map(|v| vec![v])
                        .with_context(|| format!("Row {i}: not a number or array")),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(NumericTable::from_rows(None, &rows)?)
        }
        JsonValue::Object(obj) => {
            let mut names = Vec::with_capacity(obj.len());
            let mut columns = Vec::with_capacity(obj.len());
            for (key, val) in obj {
                names.push(key.clone());
                columns.push(json_array_to_f64(Some(val), 0, key)?);
            }
            Ok(NumericTable::from_columns(names, columns)?)
        }
        _ => bail!("Expected top-level JSON array or object"),
    }
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one primitive numeric column per table column.
/// Column order follows the schema; names are kept.
fn load_parquet(path: &Path) -> Result<NumericTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let values = extract_f64_column(batch.column(col_idx))
                .with_context(|| format!("column '{}'", names[col_idx]))?;
            column.extend(values);
        }
    }

    Ok(NumericTable::from_columns(names, columns)?)
}

// -- Parquet / Arrow helpers --

/// Extract a numeric column as `f64`. Nulls are rejected.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        bail!("{} null values in numeric column", col.null_count());
    }
    let values = match col.data_type() {
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array")?
            .values()
            .to_vec(),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32Array")?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect(),
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_text_table_with_comments() {
        let table = parse_text("# energy  el  nucl\n1.0 2.0 3.0\n\n4.0 5.0 6.0  # trailing\n").unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column(2).unwrap(), &[3.0, 6.0]);
    }

    #[test]
    fn test_text_table_rejects_garbage() {
        assert!(parse_text("1.0 abc\n").is_err());
        assert!(parse_text("1.0 2.0\n3.0\n").is_err());
    }

    #[test]
    fn test_csv_with_header() {
        let file = temp_with(".csv", "energy,flux\n1.0,10\n2.0,20\n");
        let table = load_table(file.path()).unwrap();
        assert_eq!(table.column_names, vec!["energy", "flux"]);
        assert_eq!(table.column(1).unwrap(), &[10.0, 20.0]);
    }

    #[test]
    fn test_csv_without_header() {
        let file = temp_with(".csv", "1.0,10\n2.0,20\n");
        let table = load_table(file.path()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names, vec!["col0", "col1"]);
    }

    #[test]
    fn test_json_rows_and_columns() {
        let rows = json_to_table(&serde_json::json!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(rows.column(0).unwrap(), &[1.0, 3.0]);

        let single = json_to_table(&serde_json::json!([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(single.n_columns(), 1);

        let cols = json_to_table(&serde_json::json!({"a": [1.0, 2.0], "b": [3.0, 4.0]})).unwrap();
        assert_eq!(cols.column_names, vec!["a", "b"]);
        assert!(json_to_table(&serde_json::json!({"a": [1.0], "b": [3.0, 4.0]})).is_err());
    }

    #[test]
    fn test_load_column_requires_single_column() {
        let file = temp_with(".txt", "1 2\n3 4\n");
        assert!(load_column(file.path()).is_err());
        let file = temp_with(".txt", "1\n3\n");
        assert_eq!(load_column(file.path()).unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_with(".xlsx", "");
        assert!(load_table(file.path()).is_err());
    }
}
