use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy shared by every stage
// ---------------------------------------------------------------------------

/// Failure modes of the computation stages.
///
/// The table loader and the binaries work with `anyhow` and wrap these with
/// file context; the stages themselves only ever return one of the three
/// kinds below.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Invalid physical input: non-positive stopping power, degenerate
    /// masses or velocities, malformed grids.
    #[error("domain error: {0}")]
    Domain(String),

    /// Quadrature did not converge, or an interpolant was evaluated
    /// outside the range it was built on.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// No track-length window satisfies the selection constraints.
    #[error("no sensitivity achievable: {0}")]
    NotFound(String),
}

impl Error {
    pub fn domain(msg: impl Into<String>) -> Self {
        Error::Domain(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Error::Numerical(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Whether this is the "no window found" outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
