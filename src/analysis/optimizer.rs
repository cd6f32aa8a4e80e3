use serde::Serialize;

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::numeric::Quadrature;

use super::histogram::{bin_edges, CompositeSpectrum, CumulativeSumTable, Histogram, SmearingKernel};

/// Final sensitivity for one hypothesis mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityResult {
    /// Cross-section (cm²) at which the best window reaches the detection
    /// threshold.
    pub minimum_detectable_cross_section: f64,
    /// Lower edge of the window in nm.
    pub window_start: f64,
    /// Upper edge of the window in nm.
    pub window_end: f64,
    /// Signal events in the window at the minimum detectable cross-section.
    pub signal_events: f64,
    /// Background events in the window.
    pub background_events: f64,
}

/// Window selection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchCriteria {
    pub background_systematic: f64,
    pub signal_floor: f64,
}

/// Best window found by [`best_window`], as bin indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub snr: f64,
    pub signal: f64,
    pub background: f64,
}

/// S / sqrt(B + (σ_sys · B)²)
pub fn signal_to_noise(signal: f64, background: f64, systematic: f64) -> f64 {
    signal / (background + (systematic * background).powi(2)).sqrt()
}

/// Exhaustive search over all windows spanning at least two bins.
///
/// Windows with zero background or fewer signal events than the floor are
/// skipped. Scanning is row-major (start, then end) and only a strictly
/// larger ratio replaces the current best, so the first maximum wins.
pub fn best_window(
    signal: &CumulativeSumTable,
    background: &CumulativeSumTable,
    criteria: &SearchCriteria,
) -> Result<Window> {
    if signal.n_bins() != background.n_bins() {
        return Err(Error::domain(format!(
            "signal has {} bins but background has {}",
            signal.n_bins(),
            background.n_bins()
        )));
    }
    let n = signal.n_bins();

    let mut best: Option<Window> = None;
    for start in 0..n {
        for end in start + 2..=n {
            let s = signal.get(start, end);
            let b = background.get(start, end);
            if b == 0.0 || !(s >= criteria.signal_floor) {
                continue;
            }
            let snr = signal_to_noise(s, b, criteria.background_systematic);
            if best.map_or(true, |w| snr > w.snr) {
                best = Some(Window {
                    start,
                    end,
                    snr,
                    signal: s,
                    background: b,
                });
            }
        }
    }

    match best {
        Some(w) if w.snr > 0.0 && w.snr.is_finite() => Ok(w),
        Some(w) => Err(Error::not_found(format!(
            "best window [{}, {}) has signal-to-noise {}",
            w.start, w.end, w.snr
        ))),
        None => Err(Error::not_found(format!(
            "no window of at least 2 bins has non-zero background and ≥ {} signal events",
            criteria.signal_floor
        ))),
    }
}

// ---------------------------------------------------------------------------
// SensitivityOptimizer
// ---------------------------------------------------------------------------

/// Bins, smears and searches signal spectra against a fixed background.
///
/// The background histogram and its cumulative sums are computed once at
/// construction; each [`optimize`](Self::optimize) call depends only on its
/// argument.
#[derive(Debug, Clone)]
pub struct SensitivityOptimizer {
    edges: Vec<f64>,
    signal_kernel: SmearingKernel,
    criteria: SearchCriteria,
    detection_threshold: f64,
    reference_cross_section_cm2: f64,
    quadrature: Quadrature,
    background: Histogram,
    background_sums: CumulativeSumTable,
}

impl SensitivityOptimizer {
    pub fn new(
        detector: &DetectorConfig,
        reference_cross_section_cm2: f64,
        background: &CompositeSpectrum,
        quadrature: Quadrature,
    ) -> Result<Self> {
        if !(reference_cross_section_cm2 > 0.0) {
            return Err(Error::domain(format!(
                "reference cross-section must be positive, got {reference_cross_section_cm2}"
            )));
        }
        let width = detector.bin_width_nm;
        let edges = bin_edges(detector.first_edge_nm(), width, detector.max_track_length_nm)?;

        let raw = Histogram::from_spectrum(background, &edges, &quadrature)?;
        let smeared = raw.smeared(&SmearingKernel::background(width, detector.kernel_anchor), &quadrature)?;
        log::info!(
            "background: {:.4e} events in {} bins ({:.4e} before smearing)",
            smeared.total(),
            smeared.n_bins(),
            raw.total()
        );
        let background_sums = CumulativeSumTable::from_histogram(&smeared);

        Ok(Self {
            edges,
            signal_kernel: SmearingKernel::signal(width, detector.kernel_anchor, detector.suppression_offset_bins),
            criteria: SearchCriteria {
                background_systematic: detector.background_systematic,
                signal_floor: detector.signal_floor,
            },
            detection_threshold: detector.detection_threshold,
            reference_cross_section_cm2,
            quadrature,
            background: smeared,
            background_sums,
        })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Smeared background histogram.
    pub fn background(&self) -> &Histogram {
        &self.background
    }

    /// Smeared signal histogram for a spectrum generated at the reference
    /// cross-section.
    pub fn signal_histogram(&self, signal: &CompositeSpectrum) -> Result<Histogram> {
        Histogram::from_spectrum(signal, &self.edges, &self.quadrature)?.smeared(&self.signal_kernel, &self.quadrature)
    }

    pub fn optimize(&self, signal: &CompositeSpectrum) -> Result<SensitivityResult> {
        let smeared = self.signal_histogram(signal)?;
        let signal_sums = CumulativeSumTable::from_histogram(&smeared);
        let window = best_window(&signal_sums, &self.background_sums, &self.criteria)?;

        let scale = self.detection_threshold / window.snr;
        Ok(SensitivityResult {
            minimum_detectable_cross_section: scale * self.reference_cross_section_cm2,
            window_start: self.edges[window.start],
            window_end: self.edges[window.end],
            signal_events: (window.signal * scale).round_ties_even(),
            background_events: window.background.round_ties_even(),
        })
    }
}
