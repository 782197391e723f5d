pub const PI: f64 = std::f64::consts::PI;
pub const TWO_PI: f64 = 2.0 * PI;

// Reserved cluster-history indices. Real indices stay well below these
// because a history can hold at most 2N-1 entries.
pub const INVALID: usize = usize::MAX;
pub const BEAM_JET: usize = usize::MAX - 1;
pub const INEXISTENT_PARENT: usize = usize::MAX - 2;

/// Upper bound on 1 - cos(theta); any real pair distance beats it.
pub const LARGE_DISTANCE: f64 = 16.0;
/// Pair distance reported for a jet with no partner left in the event.
pub const LARGE_DIJ: f64 = 1.0e6;

// kt^2 guards for (near-)massless degenerate input.
pub const KT2_FLOOR: f64 = 1.0e-300;
pub const KT2_OVERFLOW: f64 = 1.0e300;

/// Rapidity assigned to particles travelling exactly along the beam.
pub const MAX_RAP: f64 = 1.0e5;
