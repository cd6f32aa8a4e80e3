//! Numerical building blocks shared by the stages: interpolation,
//! adaptive quadrature and the special functions of the halo and
//! resolution models.

pub mod quadrature;
pub mod special;
pub mod spline;

pub use quadrature::{integrate, Quadrature};
pub use spline::CubicSpline;
