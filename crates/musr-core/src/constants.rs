//! Physical constants used by the reduction (Particle Data Group 2017).

/// Muon mean lifetime in microseconds.
pub const TAU_MU_US: f64 = 2.1969811;

/// Nanoseconds per microsecond.
pub const NS_PER_US: f64 = 1000.0;
