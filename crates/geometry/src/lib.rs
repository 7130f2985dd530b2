//! Axis-aligned bounding-box algebra shared by the detection, inpainting,
//! and rendering stages. All coordinates are absolute pixels of the source
//! image, stored as `f64` and rounded only at the raster boundary.

mod bbox;
mod ops;

pub use bbox::{BBox, BBoxError};
pub use ops::{
    calc_render_bbox, clip_to_bounds, find_bubble, inscribed_rect, intersect, overlap_ratio,
};

/// Fraction of a bubble's half-extents covered by the axis-aligned rectangle
/// inscribed in its bounding ellipse. The mathematical ceiling is 1/sqrt(2)
/// (~0.707); 0.65 leaves a margin against the ellipse outline.
pub const INSCRIBED_RATIO: f64 = 0.65;

/// Minimum overlap ratio for a text box to be attributed to a bubble.
pub const OVERLAP_THRESHOLD: f64 = 0.5;
