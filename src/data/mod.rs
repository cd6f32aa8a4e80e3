/// Data layer: table types, loading, and writing.
///
/// Architecture:
/// ```text
///  .txt / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → NumericTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────────────┐
///   │ StoppingPowerTable, FluxTable │  SI units, typed columns
///   └──────────────────────────────┘
///        │  (physics / analysis stages)
///        ▼
///   ┌──────────┐
///   │  writer   │  flat text tables, JSON summary, parquet
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
