//! Windowed cut-and-count analysis: binning, resolution smearing and the
//! exhaustive signal-to-noise window search.

pub mod histogram;
pub mod optimizer;

pub use histogram::{bin_edges, CompositeSpectrum, CumulativeSumTable, Histogram, SmearingKernel};
pub use optimizer::{best_window, SearchCriteria, SensitivityOptimizer, SensitivityResult, Window};
