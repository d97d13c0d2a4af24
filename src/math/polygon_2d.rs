use super::{Point2, TOLERANCE};

/// Computes the signed area of a polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Returns `true` if the ring winds counter-clockwise.
#[must_use]
pub fn is_ccw(points: &[Point2]) -> bool {
    signed_area(points) > 0.0
}

/// Even-odd point-in-ring test (leftward ray cast).
#[must_use]
pub fn point_in_ring(p: Point2, ring: &[Point2]) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        // Half-open rule: count edges that span p.y.
        if (a.y <= p.y) != (b.y <= p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if x < p.x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Axis-aligned bounding box of a point set.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn bounding_box(points: &[Point2]) -> Option<(Point2, Point2)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

/// Signed area of the triangle `a`, `b`, `c`.
#[must_use]
pub fn triangle_area(a: Point2, b: Point2, c: Point2) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

/// Returns `true` if `a` and `b` coincide within `tol`.
#[must_use]
pub fn coincident(a: Point2, b: Point2, tol: f64) -> bool {
    (a - b).norm_squared() < tol * tol
}

/// Returns `true` if the three points are collinear within `TOLERANCE`
/// relative to the span `a`–`c`.
#[must_use]
pub fn collinear(a: Point2, b: Point2, c: Point2) -> bool {
    let span = (c - a).norm();
    if span < TOLERANCE {
        return true;
    }
    triangle_area(a, b, c).abs() * 2.0 / span < 1e-6
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn signed_area_ccw_square() {
        assert!((signed_area(&square()) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn signed_area_cw_square() {
        let mut pts = square();
        pts.reverse();
        assert!((signed_area(&pts) + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn point_in_ring_basic() {
        let pts = square();
        assert!(point_in_ring(Point2::new(0.5, 0.5), &pts));
        assert!(!point_in_ring(Point2::new(1.5, 0.5), &pts));
        assert!(!point_in_ring(Point2::new(-0.5, 0.5), &pts));
    }

    #[test]
    fn bounding_box_basic() {
        let (min, max) = bounding_box(&square()).unwrap();
        assert_eq!(min, Point2::new(0.0, 0.0));
        assert_eq!(max, Point2::new(1.0, 1.0));
    }

    #[test]
    fn collinear_detects_spike() {
        assert!(collinear(
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(10.0, 0.0)
        ));
        assert!(!collinear(
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 1.0),
            Point2::new(10.0, 0.0)
        ));
    }
}
