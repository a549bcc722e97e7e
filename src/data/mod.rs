/// Data layer: fit-table model, loading and writing.
///
/// Architecture:
/// ```text
///  .fitres / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → FitresTable
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ FitresTable  │  named columns, one row per SN
///   └─────────────┘
///        │   cuts::apply_cuts  → row mask → select
///        │   salt2::getmu      → mu / muerr / mures columns
///        ▼
///   ┌──────────┐
///   │  writer   │  FitresTable → file
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
