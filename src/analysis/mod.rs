/// Forecasting core for the air-quality service.
///
/// Everything here is pure computation over already-windowed history; no
/// I/O happens in this module tree. Reads and writes live in `db` and
/// `predictions`.
///
/// Submodules:
/// - `features`: daily grouping, the AQI/fire merge and training pairs.
/// - `scaling`: the reversible mean-scaling transform used before SGD.
/// - `trend`: the three-weight linear model and its SGD fit.
/// - `forecast`: cold-start fallback and the autoregressive rollout.

pub mod features;
pub mod forecast;
pub mod scaling;
pub mod trend;
