//! Small 2-D geometry kit shared by the map builder, the map cache and the
//! renderer's inner loops.
//!
//! Every predicate here is a total function: degenerate input (zero-length
//! segments, parallel lines) yields "no intersection" rather than an error.

use glam::Vec2;

/// Tolerance for exact geometric predicates.
pub const EPSILON: f32 = 1e-5;

/// Relaxed tolerance used by the map builder when reconciling co-linear
/// vertices of neighbouring polygons.
pub const PRECISION_LOW: f32 = 1e-2;

/// 2-D cross product (z component of the 3-D cross).
#[inline(always)]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Line function of `p0 -> p1` evaluated at `point`.
///
/// Positive when `point` is on the left of the directed line.
#[inline(always)]
pub fn sign(p0: Vec2, p1: Vec2, point: Vec2) -> f32 {
    (p1.x - p0.x) * (point.y - p0.y) - (point.x - p0.x) * (p1.y - p0.y)
}

/// Proper intersection of segments `a -> b` and `c -> d`.
///
/// Returns the intersection point and the parameter `u` along `a -> b`.
/// Parallel and degenerate pairs report no intersection.
#[inline]
pub fn lines_intersect(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> Option<(Vec2, f32)> {
    lines_intersect_cached(a, c, b - a, d - c)
}

/// Same as [`lines_intersect`] with both direction vectors precomputed.
///
/// The renderer and the map cache call this once per linedef per ray; the
/// linedef's stored direction saves the subtraction in the inner loop.
#[inline]
pub fn lines_intersect_cached(a: Vec2, c: Vec2, ba: Vec2, dc: Vec2) -> Option<(Vec2, f32)> {
    let denom = dc.y * ba.x - dc.x * ba.y;
    if denom.abs() < EPSILON {
        return None;
    }
    let denom = 1.0 / denom;
    let ac = a - c;

    let ub = (ba.x * ac.y - ba.y * ac.x) * denom;
    if !(0.0..=1.0).contains(&ub) {
        return None;
    }

    let ua = (dc.x * ac.y - dc.y * ac.x) * denom;
    if !(0.0..=1.0).contains(&ua) {
        return None;
    }

    Some((a + ba * ua, ua))
}

/// Perpendicular distance from `point` to the infinite line through `a -> b`.
#[inline]
pub fn segment_point_perpendicular_distance(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    cross(b - a, a - point).abs() / (b - a).length()
}

/// Scalar projection of `point` onto `a -> b`, in world units from `a`.
#[inline]
pub fn segment_point_projected_distance(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    (point - a).dot(b - a) / (b - a).length()
}

/// Does `point` lie on the segment `a -> b`, within `tolerance`?
///
/// Pass [`EPSILON`] for exact geometry and [`PRECISION_LOW`] for the map
/// builder's co-linear merge.
pub fn point_on_segment(point: Vec2, a: Vec2, b: Vec2, tolerance: f32) -> bool {
    let length = (b - a).length();
    if length < EPSILON {
        return (point - a).length() <= tolerance;
    }
    if segment_point_perpendicular_distance(a, b, point) > tolerance {
        return false;
    }
    let projected = segment_point_projected_distance(a, b, point);
    projected >= -tolerance && projected <= length + tolerance
}

/// Point-in-triangle via three sign tests of the line function.
pub fn point_in_triangle(point: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d0 = sign(a, b, point);
    let d1 = sign(b, c, point);
    let d2 = sign(c, a, point);

    let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(has_neg && has_pos)
}

/// Standard up/down-crossing winding number of `point` against a set of
/// directed edges.  The interior test accepts `|wn| == 1` so that edge lists
/// with mixed orientation (a sector's linedefs) still work.
pub fn winding_number<I>(edges: I, point: Vec2) -> i32
where
    I: IntoIterator<Item = (Vec2, Vec2)>,
{
    let mut wn = 0;
    for (v0, v1) in edges {
        if v0.y <= point.y {
            if v1.y > point.y && sign(v0, v1, point) > 0.0 {
                wn += 1;
            }
        } else if v1.y <= point.y && sign(v0, v1, point) < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn crossing_segments_intersect() {
        let (point, u) =
            lines_intersect(vec2(0.0, 5.0), vec2(10.0, 5.0), vec2(5.0, 0.0), vec2(5.0, 10.0))
                .expect("segments should intersect");
        assert!((point - vec2(5.0, 5.0)).length() < EPSILON);
        assert!((u - 0.5).abs() < EPSILON);
    }

    #[test]
    fn intersection_at_endpoint_has_unit_parameter() {
        let (point, u) =
            lines_intersect(vec2(5.0, 10.0), vec2(5.0, 0.0), vec2(0.0, 0.0), vec2(10.0, 0.0))
                .expect("segments should intersect");
        assert!((point - vec2(5.0, 0.0)).length() < EPSILON);
        assert!((u - 1.0).abs() < EPSILON);
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        assert!(
            lines_intersect(vec2(0.0, 0.0), vec2(10.0, 0.0), vec2(15.0, -10.0), vec2(15.0, 10.0))
                .is_none()
        );
    }

    #[test]
    fn collinear_segments_do_not_intersect() {
        // Disjoint on the same carrier line.
        assert!(
            lines_intersect(vec2(0.0, 0.0), vec2(256.0, 0.0), vec2(512.0, 0.0), vec2(768.0, 0.0))
                .is_none()
        );
        // Overlapping on the same carrier line: degenerate, reported as a miss.
        assert!(
            lines_intersect(
                vec2(0.0, 250.0),
                vec2(200.0, 250.0),
                vec2(100.0, 250.0),
                vec2(300.0, 250.0)
            )
            .is_none()
        );
    }

    #[test]
    fn parallel_ray_never_hits() {
        assert!(
            lines_intersect(vec2(0.0, 1.0), vec2(100.0, 1.0), vec2(0.0, 0.0), vec2(100.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn perpendicular_distance() {
        let a = vec2(0.0, 0.0);
        let b = vec2(10.0, 0.0);
        assert!((segment_point_perpendicular_distance(a, b, vec2(5.0, 5.0)) - 5.0).abs() < EPSILON);
        assert!((segment_point_perpendicular_distance(a, b, vec2(1.0, 1.0)) - 1.0).abs() < EPSILON);
        assert!(segment_point_perpendicular_distance(a, b, vec2(10.0, 0.0)).abs() < EPSILON);
    }

    #[test]
    fn projected_distance_runs_along_the_segment() {
        let a = vec2(0.0, 0.0);
        let b = vec2(10.0, 0.0);
        assert!((segment_point_projected_distance(a, b, vec2(3.0, 4.0)) - 3.0).abs() < EPSILON);
        assert!(segment_point_projected_distance(a, b, vec2(-2.0, 0.0)) < 0.0);
    }

    #[test]
    fn sign_of_the_line_function() {
        let a = vec2(0.0, 0.0);
        let b = vec2(10.0, 10.0);
        assert!(sign(a, b, vec2(2.0, 5.0)) > 0.0);
        assert!(sign(a, b, vec2(7.0, 5.0)) < 0.0);
        assert!(sign(a, b, vec2(5.0, 5.0)) == 0.0);
    }

    #[test]
    fn point_on_segment_respects_tolerance() {
        let a = vec2(0.0, 0.0);
        let b = vec2(100.0, 0.0);
        assert!(point_on_segment(vec2(50.0, 0.0), a, b, EPSILON));
        assert!(!point_on_segment(vec2(50.0, 0.5), a, b, EPSILON));
        assert!(point_on_segment(vec2(50.0, 0.005), a, b, PRECISION_LOW));
        assert!(!point_on_segment(vec2(101.0, 0.0), a, b, PRECISION_LOW));
    }

    #[test]
    fn triangle_containment() {
        let (a, b, c) = (vec2(0.0, -5.0), vec2(-5.0, 5.0), vec2(5.0, 5.0));
        assert!(point_in_triangle(vec2(0.0, 0.0), a, b, c));
        assert!(point_in_triangle(vec2(1.0, 3.0), a, b, c));
        assert!(!point_in_triangle(vec2(0.0, -6.0), a, b, c));
    }

    #[test]
    fn winding_number_of_a_square() {
        let square = [
            vec2(0.0, 0.0),
            vec2(0.0, 100.0),
            vec2(100.0, 100.0),
            vec2(100.0, 0.0),
        ];
        let edges: Vec<_> = (0..4).map(|i| (square[i], square[(i + 1) % 4])).collect();

        assert_eq!(winding_number(edges.iter().copied(), vec2(50.0, 50.0)).abs(), 1);
        assert_eq!(winding_number(edges.iter().copied(), vec2(150.0, 50.0)), 0);
    }
}
