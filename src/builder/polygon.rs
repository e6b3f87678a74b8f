//! Source polygon fed to the map builder, with the containment and overlap
//! predicates the clip-resolution step relies on.

use glam::Vec2;

use crate::math;
use crate::texture::TextureRef;

#[derive(Clone, Debug)]
pub struct Polygon {
    pub vertices: Vec<Vec2>,
    pub floor_height: f32,
    pub ceiling_height: f32,
    pub brightness: f32,
    pub wall_texture: Option<TextureRef>,
    pub floor_texture: Option<TextureRef>,
    pub ceiling_texture: Option<TextureRef>,
}

impl Polygon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        floor_height: f32,
        ceiling_height: f32,
        brightness: f32,
        wall_texture: Option<TextureRef>,
        floor_texture: Option<TextureRef>,
        ceiling_texture: Option<TextureRef>,
        vertices: Vec<Vec2>,
    ) -> Self {
        Self {
            vertices,
            floor_height,
            ceiling_height,
            brightness,
            wall_texture,
            floor_texture,
            ceiling_texture,
        }
    }

    /// Same attributes, different outline.  Used for clip fragments.
    pub fn with_vertices(&self, vertices: Vec<Vec2>) -> Self {
        Self {
            vertices,
            ..self.clone()
        }
    }

    /*-------------------------- predicates --------------------------*/

    /// Shoelace area; negative for clockwise outlines.
    pub fn signed_area(&self) -> f32 {
        let mut area = 0.0;
        for i in 0..self.vertices.len() {
            let v0 = self.vertices[i];
            let v1 = self.vertices[(i + 1) % self.vertices.len()];
            area += math::cross(v0, v1);
        }
        area * 0.5
    }

    #[inline]
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() <= 0.0
    }

    /// Is `point` one of the outline vertices (within [`math::EPSILON`])?
    pub fn vertices_contain_point(&self, point: Vec2) -> bool {
        self.contains_vertex_within(point, math::EPSILON)
    }

    /// Like [`Self::vertices_contain_point`] with a caller-chosen tolerance;
    /// the builder's reconciliation pass uses the 1-unit vertex snap.
    pub fn contains_vertex_within(&self, point: Vec2, tolerance: f32) -> bool {
        self.vertices.iter().any(|&v| (v - point).length() <= tolerance)
    }

    /// Winding-number containment; points on the outline resolve to
    /// `include_edges`.
    pub fn is_point_inside(&self, point: Vec2, include_edges: bool) -> bool {
        for i in 0..self.vertices.len() {
            let v0 = self.vertices[i];
            let v1 = self.vertices[(i + 1) % self.vertices.len()];
            if math::point_on_segment(point, v0, v1, math::EPSILON) {
                return include_edges;
            }
        }

        let edges = (0..self.vertices.len())
            .map(|i| (self.vertices[i], self.vertices[(i + 1) % self.vertices.len()]));
        math::winding_number(edges, point).abs() == 1
    }

    /// Do the outlines overlap: any vertex of `other` strictly inside, or
    /// any edge crossing?  Edges that share endpoints do not count as
    /// crossings.
    pub fn overlaps(&self, other: &Polygon) -> bool {
        for i in 0..other.vertices.len() {
            let v = other.vertices[i];
            if self.vertices_contain_point(v) {
                continue;
            }
            if self.is_point_inside(v, true) {
                return true;
            }

            let v_next = other.vertices[(i + 1) % other.vertices.len()];
            for j in 0..self.vertices.len() {
                let w = self.vertices[j];
                let w_next = self.vertices[(j + 1) % self.vertices.len()];
                let shared = |a: Vec2, b: Vec2| (a - b).length() <= math::EPSILON;
                if shared(v, w) || shared(v_next, w) || shared(v, w_next) || shared(v_next, w_next)
                {
                    continue;
                }
                if math::lines_intersect(v, v_next, w, w_next).is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// Are all vertices of `other` inside this polygon?
    pub fn contains(&self, other: &Polygon, include_edges: bool) -> bool {
        other
            .vertices
            .iter()
            .all(|&v| self.is_point_inside(v, include_edges))
    }

    /*-------------------------- mutation ----------------------------*/

    /// Insert `point` between the consecutive vertices `after` and `before`
    /// (matched in either order).  No-op when the pair is not an edge.
    pub fn insert_point(&mut self, point: Vec2, after: Vec2, before: Vec2) {
        let eq = |a: Vec2, b: Vec2| (a - b).length() <= math::EPSILON;
        for i in 0..self.vertices.len() {
            let v0 = self.vertices[i];
            let v1 = self.vertices[(i + 1) % self.vertices.len()];
            if (eq(v0, after) && eq(v1, before)) || (eq(v0, before) && eq(v1, after)) {
                self.vertices.insert(i + 1, point);
                return;
            }
        }
    }

    /// Remove the first vertex matching `point`.
    pub fn remove_point(&mut self, point: Vec2) {
        let eq = |a: Vec2| (a - point).length() <= math::EPSILON;
        if let Some(i) = self.vertices.iter().position(|&v| eq(v)) {
            self.vertices.remove(i);
        }
    }

    pub fn reverse_vertices(&mut self) {
        self.vertices.reverse();
    }

    /// Drop vertices that are co-linear with their neighbours.
    pub fn optimize(&mut self) {
        let mut i = 0;
        while self.vertices.len() > 3 && i < self.vertices.len() {
            let prev = self.vertices[(i + self.vertices.len() - 1) % self.vertices.len()];
            let cur = self.vertices[i];
            let next = self.vertices[(i + 1) % self.vertices.len()];
            if math::point_on_segment(cur, prev, next, math::EPSILON) {
                self.vertices.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    fn poly(vertices: Vec<Vec2>) -> Polygon {
        Polygon::new(0.0, 128.0, 1.0, None, None, None, vertices)
    }

    fn unit_square() -> Polygon {
        poly(vec![
            vec2(0.0, 0.0),
            vec2(0.0, 100.0),
            vec2(100.0, 100.0),
            vec2(100.0, 0.0),
        ])
    }

    #[test]
    fn signed_area_is_negative_iff_clockwise() {
        let cw = unit_square();
        assert!(cw.signed_area() < 0.0);
        assert!(cw.is_clockwise());

        let mut ccw = unit_square();
        ccw.reverse_vertices();
        assert!(ccw.signed_area() > 0.0);
        assert!(!ccw.is_clockwise());
        assert!((cw.signed_area() + ccw.signed_area()).abs() < 1e-3);
    }

    #[test]
    fn inside_holds_on_vertices_and_edge_midpoints() {
        let square = unit_square();
        for i in 0..square.vertices.len() {
            let v0 = square.vertices[i];
            let v1 = square.vertices[(i + 1) % square.vertices.len()];
            assert!(square.is_point_inside(v0, true));
            assert!(square.is_point_inside((v0 + v1) * 0.5, true));
            assert!(!square.is_point_inside((v0 + v1) * 0.5, false));
        }
        assert!(square.is_point_inside(vec2(50.0, 50.0), false));
        assert!(!square.is_point_inside(vec2(150.0, 50.0), true));
    }

    #[test]
    fn concave_outline_containment() {
        let pentagon = poly(vec![
            vec2(0.0, 0.0),
            vec2(0.0, 100.0),
            vec2(50.0, 50.0),
            vec2(100.0, 100.0),
            vec2(100.0, 0.0),
        ]);
        assert!(pentagon.is_point_inside(vec2(10.0, 10.0), false));
        assert!(!pentagon.is_point_inside(vec2(50.0, 75.0), false));
    }

    #[test]
    fn overlap_and_containment() {
        let outer = unit_square();
        let inner = poly(vec![
            vec2(25.0, 25.0),
            vec2(25.0, 75.0),
            vec2(75.0, 75.0),
            vec2(75.0, 25.0),
        ]);
        let crossing = poly(vec![
            vec2(50.0, 25.0),
            vec2(50.0, 75.0),
            vec2(150.0, 75.0),
            vec2(150.0, 25.0),
        ]);
        let apart = poly(vec![
            vec2(300.0, 0.0),
            vec2(300.0, 50.0),
            vec2(350.0, 50.0),
            vec2(350.0, 0.0),
        ]);

        assert!(outer.contains(&inner, false));
        assert!(outer.overlaps(&inner));
        assert!(outer.overlaps(&crossing));
        assert!(!outer.contains(&crossing, true));
        assert!(!outer.overlaps(&apart));
    }

    #[test]
    fn sharing_only_an_edge_is_not_an_overlap() {
        let left = unit_square();
        let right = poly(vec![
            vec2(100.0, 0.0),
            vec2(100.0, 100.0),
            vec2(200.0, 100.0),
            vec2(200.0, 0.0),
        ]);
        assert!(!left.overlaps(&right));
        assert!(!right.overlaps(&left));
    }

    #[test]
    fn insert_and_remove_points() {
        let mut square = unit_square();
        square.insert_point(vec2(50.0, 100.0), vec2(0.0, 100.0), vec2(100.0, 100.0));
        assert_eq!(square.vertices.len(), 5);
        assert_eq!(square.vertices[2], vec2(50.0, 100.0));

        // Pair given in the reverse order still finds the edge.
        square.insert_point(vec2(100.0, 50.0), vec2(100.0, 0.0), vec2(100.0, 100.0));
        assert_eq!(square.vertices.len(), 6);

        square.remove_point(vec2(50.0, 100.0));
        assert_eq!(square.vertices.len(), 5);
        assert!(!square.vertices_contain_point(vec2(50.0, 100.0)));

        // Unknown edge pair: no change.
        let before = square.vertices.clone();
        square.insert_point(vec2(1.0, 1.0), vec2(5.0, 5.0), vec2(6.0, 6.0));
        assert_eq!(square.vertices, before);
    }

    #[test]
    fn optimize_strips_collinear_vertices() {
        let mut square = poly(vec![
            vec2(0.0, 0.0),
            vec2(0.0, 50.0),
            vec2(0.0, 100.0),
            vec2(100.0, 100.0),
            vec2(100.0, 0.0),
        ]);
        square.optimize();
        assert_eq!(square.vertices.len(), 4);
        assert!(!square.vertices_contain_point(vec2(0.0, 50.0)));
    }
}
