//! Domain constants for the baking passes.

/// Per-channel color span under which a whole channel collapses to one color.
pub const SOLID_EPSILON: f32 = 4.0;

/// Mean per-luxel difference budget for twin detection.
pub const LUXEL_TOLERANCE: f32 = 8.0;

/// Plane-equality tolerances used when grouping surfaces.
pub const PLANE_NORMAL_EPS: f32 = 1e-3;
pub const PLANE_DIST_EPS: f32 = 0.01;

/// Barycentric slack when rasterizing triangles into the super grid, so
/// texels straddling an edge still get mapped.
pub const BARY_EPSILON: f32 = 0.1;

/// How many times an occluded sample origin is nudged toward the group
/// centroid before the luxel is left occluded.
pub const OCCLUDED_NUDGE_TRIES: usize = 4;

/// Upper bound on patch subdivision rounds; each round doubles the grid.
pub const MAX_PATCH_ITERATIONS: usize = 5;

/// Distance under which a patch row/column counts as colinear and is dropped.
pub const COLINEAR_EPSILON: f32 = 0.1;

/// Distance under which coinciding first/last patch rows/columns wrap.
pub const WRAP_EPSILON: f32 = 1.0;

/// How many oversized-lightmap warnings are printed before going quiet.
pub const MAX_RESIZE_WARNINGS: usize = 8;

/// World-unit shift of sample origins along the surface normal, so texels
/// do not land exactly on the geometry that spawned them.
pub const SAMPLE_OFFSET: f32 = 1.0;
