use crate::config::KernelAnchor;
use crate::data::model::RateSpectrum;
use crate::error::{Error, Result};
use crate::numeric::special::{normal_cdf, normal_pdf};
use crate::numeric::{CubicSpline, Quadrature};
use crate::units;

// ---------------------------------------------------------------------------
// Bin edges
// ---------------------------------------------------------------------------

/// Edges `first, first + width, ...`, stopping at the last edge that does
/// not exceed `max`.
pub fn bin_edges(first: f64, width: f64, max: f64) -> Result<Vec<f64>> {
    if !(width > 0.0 && width.is_finite() && first.is_finite() && max.is_finite()) {
        return Err(Error::domain(format!(
            "invalid binning: first edge {first}, width {width}, max {max}"
        )));
    }
    let n = ((max - first) / width).floor();
    if !(n >= 1.0) {
        return Err(Error::domain(format!(
            "no complete bin of width {width} fits in [{first}, {max}]"
        )));
    }
    Ok((0..=n as usize).map(|k| first + k as f64 * width).collect())
}

// ---------------------------------------------------------------------------
// CompositeSpectrum – weighted sum over nuclides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct WeightedSpline {
    weight: f64,
    spline: CubicSpline,
}

/// Mass-fraction weighted sum of per-nuclide spectra, each interpolated on
/// its own track-length grid.
///
/// Works in analysis units: track length in nm, expected events per nm for
/// the configured exposure.
#[derive(Debug, Clone, Default)]
pub struct CompositeSpectrum {
    parts: Vec<WeightedSpline>,
}

impl CompositeSpectrum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one component already in analysis units.
    pub fn add(&mut self, weight: f64, track_length_nm: &[f64], rate: &[f64]) -> Result<()> {
        if !(weight >= 0.0 && weight.is_finite()) {
            return Err(Error::domain(format!("component weight must be non-negative, got {weight}")));
        }
        let spline = CubicSpline::new(track_length_nm, rate)?;
        self.parts.push(WeightedSpline { weight, spline });
        Ok(())
    }

    /// Combine SI spectra (m, 1/(kg s m)) weighted by mass fraction, scaled
    /// to `exposure_kg_myr`.
    pub fn from_spectra<'a, I>(parts: I, exposure_kg_myr: f64) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, &'a RateSpectrum)>,
    {
        let mut composite = Self::new();
        for (weight, spectrum) in parts {
            let x: Vec<f64> = spectrum.samples.iter().map(|s| units::meters_to_nm(s.track_length)).collect();
            let rate: Vec<f64> = spectrum
                .samples
                .iter()
                .map(|s| units::rate_si_to_per_kg_myr_nm(s.rate) * exposure_kg_myr)
                .collect();
            composite.add(weight, &x, &rate)?;
        }
        if composite.is_empty() {
            return Err(Error::domain("composite spectrum needs at least one component"));
        }
        Ok(composite)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Intersection of the component domains; `None` without components.
    pub fn domain(&self) -> Option<(f64, f64)> {
        self.parts.iter().map(|p| p.spline.domain()).reduce(|(lo, hi), (a, b)| (lo.max(a), hi.min(b)))
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.parts.iter().map(|p| p.weight * p.spline.evaluate(x)).sum()
    }

    /// ∫ over `[a, b]`, split at every component knot so each piece is a
    /// single cubic. Fails if `[a, b]` leaves the common domain.
    pub fn integrate(&self, a: f64, b: f64, quadrature: &Quadrature) -> Result<f64> {
        let (lo, hi) = self
            .domain()
            .ok_or_else(|| Error::domain("composite spectrum has no components"))?;
        if a < lo || b > hi {
            return Err(Error::numerical(format!(
                "integration range [{a}, {b}] nm outside interpolation domain [{lo}, {hi}] nm"
            )));
        }

        let mut cuts: Vec<f64> = self
            .parts
            .iter()
            .flat_map(|p| p.spline.knots().iter().copied())
            .filter(|&k| k > a && k < b)
            .collect();
        cuts.push(a);
        cuts.push(b);
        cuts.sort_by(f64::total_cmp);
        cuts.dedup();

        cuts.windows(2)
            .map(|w| quadrature.integrate(|x| self.evaluate(x), w[0], w[1]))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Expected event counts per bin. Counts are expectation values and need
/// not be integers.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<f64>,
}

impl Histogram {
    pub fn new(edges: Vec<f64>, counts: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 || counts.len() + 1 != edges.len() {
            return Err(Error::domain(format!(
                "{} edges cannot hold {} bins",
                edges.len(),
                counts.len()
            )));
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::domain("bin edges must be strictly increasing"));
        }
        if let Some(c) = counts.iter().find(|c| !(**c >= 0.0)) {
            return Err(Error::domain(format!("bin count must be non-negative, found {c}")));
        }
        Ok(Self { edges, counts })
    }

    /// Integrate `spectrum` over every bin. Negative bin integrals (spline
    /// overshoot around zero) are clamped to zero.
    pub fn from_spectrum(spectrum: &CompositeSpectrum, edges: &[f64], quadrature: &Quadrature) -> Result<Self> {
        let counts = edges
            .windows(2)
            .map(|w| spectrum.integrate(w[0], w[1], quadrature).map(|v| v.max(0.0)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(edges.to_vec(), counts)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Redistribute every bin's count with `kernel` and re-integrate over
    /// the same edges. Probability falling outside the outer edges is lost.
    pub fn smeared(&self, kernel: &SmearingKernel, quadrature: &Quadrature) -> Result<Self> {
        let mut smeared = vec![0.0; self.n_bins()];
        for (i, &count) in self.counts.iter().enumerate() {
            if count == 0.0 {
                continue;
            }
            let center = kernel.center(self.edges[i], self.edges[i + 1]);
            for (j, target) in smeared.iter_mut().enumerate() {
                *target += count * kernel.weight(center, self.edges[j], self.edges[j + 1], quadrature)?;
            }
        }
        Self::new(self.edges.clone(), smeared)
    }
}

// ---------------------------------------------------------------------------
// SmearingKernel – detector resolution
// ---------------------------------------------------------------------------

/// Gaussian resolution kernel. The signal variant is additionally weighted
/// by a normal CDF that suppresses short tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmearingKernel {
    /// Standard deviation in nm.
    pub resolution: f64,
    pub anchor: KernelAnchor,
    /// Location of the suppression CDF in nm (same scale as the kernel).
    pub suppression_center: Option<f64>,
}

impl SmearingKernel {
    pub fn background(resolution: f64, anchor: KernelAnchor) -> Self {
        Self {
            resolution,
            anchor,
            suppression_center: None,
        }
    }

    pub fn signal(resolution: f64, anchor: KernelAnchor, suppression_offset_bins: f64) -> Self {
        Self {
            resolution,
            anchor,
            suppression_center: Some(suppression_offset_bins * resolution),
        }
    }

    fn center(&self, lower: f64, upper: f64) -> f64 {
        match self.anchor {
            KernelAnchor::BinStart => lower,
            KernelAnchor::BinCenter => 0.5 * (lower + upper),
        }
    }

    /// Fraction of an event recorded at `center` that lands in `[a, b]`.
    fn weight(&self, center: f64, a: f64, b: f64, quadrature: &Quadrature) -> Result<f64> {
        let sigma = self.resolution;
        match self.suppression_center {
            None => Ok((normal_cdf(b, center, sigma) - normal_cdf(a, center, sigma)).max(0.0)),
            Some(loc) => quadrature.integrate(
                |x| normal_pdf(x, center, sigma) * normal_cdf(x, loc, sigma),
                a,
                b,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// CumulativeSumTable
// ---------------------------------------------------------------------------

/// Sums of bin counts over every half-open bin range `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeSumTable {
    n_bins: usize,
    sums: Vec<f64>,
}

impl CumulativeSumTable {
    pub fn new(counts: &[f64]) -> Self {
        let n = counts.len();
        let stride = n + 1;
        let mut sums = vec![0.0; stride * stride];
        // each row is accumulated on its own so entries match a direct
        // summation instead of a difference of prefix sums
        for start in 0..n {
            let mut acc = 0.0;
            for end in start + 1..=n {
                acc += counts[end - 1];
                sums[start * stride + end] = acc;
            }
        }
        Self { n_bins: n, sums }
    }

    pub fn from_histogram(histogram: &Histogram) -> Self {
        Self::new(histogram.counts())
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Sum of bins `start..end`; zero when `end <= start`.
    ///
    /// # Panics
    /// If either index exceeds the number of bins.
    pub fn get(&self, start: usize, end: usize) -> f64 {
        assert!(
            start <= self.n_bins && end <= self.n_bins,
            "range {start}..{end} outside {} bins",
            self.n_bins
        );
        self.sums[start * (self.n_bins + 1) + end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RateSample;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn composite(weight: f64, x: &[f64], y: &[f64]) -> CompositeSpectrum {
        let mut c = CompositeSpectrum::new();
        c.add(weight, x, y).unwrap();
        c
    }

    fn grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        (0..=n).map(|i| lo + (hi - lo) * i as f64 / n as f64).collect()
    }

    #[test]
    fn test_reference_edges() {
        let edges = bin_edges(15.0, 30.0, 1000.0).unwrap();
        assert_eq!(edges.len(), 33);
        assert_eq!(edges[0], 15.0);
        assert_eq!(edges[32], 975.0);
        assert!(bin_edges(0.0, 30.0, 20.0).is_err());
        assert!(bin_edges(0.0, 0.0, 20.0).is_err());
    }

    #[test]
    fn test_composite_weighted_sum_and_domain() {
        let mut c = CompositeSpectrum::new();
        let x1 = grid(0.0, 1200.0, 60);
        let x2 = grid(0.0, 1100.0, 37);
        c.add(0.5, &x1, &x1.iter().map(|x| 2.0 * x).collect::<Vec<_>>()).unwrap();
        c.add(0.25, &x2, &vec![4.0; x2.len()]).unwrap();
        assert_eq!(c.domain(), Some((0.0, 1100.0)));
        assert_relative_eq!(c.evaluate(100.0), 100.0 + 1.0, max_relative = 1e-12);

        // ∫₁₀^₄₀ (x + 1) dx = 780
        let v = c.integrate(10.0, 40.0, &Quadrature::default()).unwrap();
        assert_relative_eq!(v, 780.0, max_relative = 1e-10);

        let outside = c.integrate(1000.0, 1150.0, &Quadrature::default());
        assert!(matches!(outside, Err(Error::Numerical(_))));
        assert!(CompositeSpectrum::new().integrate(0.0, 1.0, &Quadrature::default()).is_err());
    }

    #[test]
    fn test_from_spectra_converts_units() {
        let spectrum = RateSpectrum {
            samples: (0..=10)
                .map(|i| RateSample {
                    track_length: i as f64 * 1e-7,
                    rate: 1.0,
                })
                .collect(),
        };
        let c = CompositeSpectrum::from_spectra([(0.5, &spectrum)], 2.0).unwrap();
        let (lo, hi) = c.domain().unwrap();
        assert_eq!(lo, 0.0);
        assert_relative_eq!(hi, 1000.0, max_relative = 1e-12);
        // 1/(kg s m) → 3.1536e4/(kg Myr nm), × 2 kg Myr × 0.5
        assert_relative_eq!(c.evaluate(500.0), 3.1536e4, max_relative = 1e-10);
    }

    #[test]
    fn test_negative_bin_integrals_clamped() {
        let x = grid(0.0, 200.0, 10);
        let c = composite(1.0, &x, &vec![-1.0; x.len()]);
        let h = Histogram::from_spectrum(&c, &[10.0, 40.0, 70.0], &Quadrature::default()).unwrap();
        assert_eq!(h.counts(), &[0.0, 0.0]);
    }

    #[test]
    fn test_background_smearing_conserves_total() {
        // narrow bump well inside [15, 975] nm
        let x = grid(0.0, 1200.0, 1200);
        let y: Vec<f64> = x.iter().map(|&v| 100.0 * (-((v - 500.0) / 20.0).powi(2)).exp()).collect();
        let c = composite(1.0, &x, &y);
        let edges = bin_edges(15.0, 30.0, 1000.0).unwrap();
        let quad = Quadrature::default();
        let raw = Histogram::from_spectrum(&c, &edges, &quad).unwrap();
        let smeared = raw.smeared(&SmearingKernel::background(30.0, KernelAnchor::BinStart), &quad).unwrap();
        assert!(raw.total() > 0.0);
        assert!((smeared.total() - raw.total()).abs() < 0.01 * raw.total());
        assert!(smeared.counts().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_anchor_sets_kernel_mean() {
        let edges = bin_edges(15.0, 30.0, 1000.0).unwrap();
        let mut counts = vec![0.0; edges.len() - 1];
        counts[16] = 1.0;
        let raw = Histogram::new(edges.clone(), counts).unwrap();
        let quad = Quadrature::default();
        let mean = |h: &Histogram| -> f64 {
            h.counts()
                .iter()
                .zip(h.edges().windows(2))
                .map(|(c, w)| c * 0.5 * (w[0] + w[1]))
                .sum::<f64>()
                / h.total()
        };
        let start = raw.smeared(&SmearingKernel::background(30.0, KernelAnchor::BinStart), &quad).unwrap();
        let center = raw.smeared(&SmearingKernel::background(30.0, KernelAnchor::BinCenter), &quad).unwrap();
        assert_relative_eq!(mean(&start), edges[16], epsilon = 0.1);
        assert_relative_eq!(mean(&center), edges[16] + 15.0, epsilon = 0.1);
    }

    #[test]
    fn test_signal_kernel_suppresses_short_tracks() {
        let edges = bin_edges(15.0, 30.0, 1000.0).unwrap();
        let raw = Histogram::new(edges.clone(), vec![1.0; edges.len() - 1]).unwrap();
        let quad = Quadrature::default();
        let bg = raw.smeared(&SmearingKernel::background(30.0, KernelAnchor::BinStart), &quad).unwrap();
        let sig = raw.smeared(&SmearingKernel::signal(30.0, KernelAnchor::BinStart, 5.0), &quad).unwrap();
        // centre of the suppression at 150 nm: strongly reduced below, untouched far above
        assert!(sig.counts()[0] < 0.01 * bg.counts()[0]);
        assert_relative_eq!(sig.counts()[25], bg.counts()[25], max_relative = 1e-6);
        assert!(sig.counts().iter().zip(bg.counts()).all(|(s, b)| *s <= b * (1.0 + 1e-6) + 1e-12));
    }

    #[test]
    fn test_cumulative_sums() {
        let table = CumulativeSumTable::new(&[1.0, 2.0, 3.0]);
        assert_eq!(table.n_bins(), 3);
        assert_eq!(table.get(0, 3), 6.0);
        assert_eq!(table.get(1, 3), 5.0);
        assert_eq!(table.get(2, 2), 0.0);
        assert_eq!(table.get(3, 1), 0.0);
    }

    proptest! {
        #[test]
        fn cumulative_sums_are_additive(counts in proptest::collection::vec(0.0f64..100.0, 1..40)) {
            let table = CumulativeSumTable::new(&counts);
            let n = counts.len();
            let mid = n / 2;
            prop_assert!((table.get(0, mid) + table.get(mid, n) - table.get(0, n)).abs() <= 1e-9 * (1.0 + table.get(0, n)));
            for start in 0..n {
                prop_assert!(table.get(start, start + 1) == counts[start]);
            }
        }
    }
}
