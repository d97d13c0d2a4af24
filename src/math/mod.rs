pub mod distance_2d;
pub mod intersect_2d;
pub mod polygon_2d;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-9;

/// 2D cross product (z component of the 3D cross).
#[must_use]
pub fn cross2(a: Vector2, b: Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Left-pointing normal of a direction vector.
#[must_use]
pub fn left_normal(dir: Vector2) -> Vector2 {
    Vector2::new(-dir.y, dir.x)
}

/// Per-block local metric frame.
///
/// The core works in a local frame anchored at the block's bounding-box
/// minimum, with an independent scale per axis (so callers working in
/// geographic coordinates can map degrees to meters). Extraction
/// reverse-transforms all output back into the caller's frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    origin: Point2,
    scale: Vector2,
}

impl Frame {
    /// Builds a frame anchored at `min` with the given per-axis scale.
    #[must_use]
    pub fn from_bounds(min: Point2, scale: Vector2) -> Self {
        debug_assert!(scale.x.abs() > TOLERANCE && scale.y.abs() > TOLERANCE);
        Self { origin: min, scale }
    }

    /// The identity frame (caller coordinates are already metric).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            origin: Point2::origin(),
            scale: Vector2::new(1.0, 1.0),
        }
    }

    /// Caller frame → local metric frame.
    #[must_use]
    pub fn forward(&self, p: Point2) -> Point2 {
        Point2::new(
            (p.x - self.origin.x) * self.scale.x,
            (p.y - self.origin.y) * self.scale.y,
        )
    }

    /// Local metric frame → caller frame.
    #[must_use]
    pub fn reverse(&self, p: Point2) -> Point2 {
        Point2::new(
            p.x / self.scale.x + self.origin.x,
            p.y / self.scale.y + self.origin.y,
        )
    }
}
