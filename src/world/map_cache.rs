//! Uniform-grid spatial cache over the level.
//!
//! Each cell lists the linedefs whose segment touches it and the lights whose
//! disk touches it.  The renderer's light-visibility checks and the level's
//! static light precomputation both funnel through [`MapCache::intersect_3d`],
//! a DDA walk over the grid with a per-cell Z-interval early-reject.

use glam::{Vec2, Vec3};
use log::debug;

use crate::math;
use crate::world::geometry::{
    push_surface_light, Light, LightId, Linedef, LinedefId, SurfaceLights, Vertex,
};

/// Grid cell edge length in world units.  Independent of the wall segment
/// length; correctness does not depend on their ratio.
pub const CELL_SIZE: f32 = 76.0;

#[derive(Clone, Debug, Default)]
pub struct Cell {
    pub linedefs: Vec<LinedefId>,
    pub lights: SurfaceLights,
}

#[derive(Clone, Debug, Default)]
pub struct MapCache {
    /// Level minimum; cell coordinates are relative to it.
    pub origin: Vec2,
    pub width: i32,
    pub height: i32,
    cells: Vec<Cell>,
}

impl MapCache {
    /// Build the grid from the level's current geometry.
    ///
    /// A linedef belongs to a cell when either endpoint lies inside the
    /// cell's box or the line crosses one of its four edges.
    pub fn build(min: Vec2, max: Vec2, linedefs: &[Linedef], vertices: &[Vertex]) -> Self {
        let width = (((max.x - min.x) / CELL_SIZE).ceil() as i32).max(1);
        let height = (((max.y - min.y) / CELL_SIZE).ceil() as i32).max(1);
        let mut cells = vec![Cell::default(); (width * height) as usize];

        for y in 0..height {
            for x in 0..width {
                let p0 = Vec2::new(x as f32 * CELL_SIZE, y as f32 * CELL_SIZE);
                let p1 = p0 + Vec2::new(CELL_SIZE, 0.0);
                let p2 = p0 + Vec2::new(CELL_SIZE, CELL_SIZE);
                let p3 = p0 + Vec2::new(0.0, CELL_SIZE);
                let cell = &mut cells[(y * width + x) as usize];

                for (id, line) in linedefs.iter().enumerate() {
                    let v0 = vertices[line.v0 as usize].point - min;
                    let v1 = vertices[line.v1 as usize].point - min;

                    let endpoint_inside = |v: Vec2| {
                        v.x >= p0.x && v.y >= p0.y && v.x < p2.x && v.y < p2.y
                    };

                    if endpoint_inside(v0)
                        || endpoint_inside(v1)
                        || math::lines_intersect(v0, v1, p0, p1).is_some()
                        || math::lines_intersect(v0, v1, p1, p2).is_some()
                        || math::lines_intersect(v0, v1, p2, p3).is_some()
                        || math::lines_intersect(v0, v1, p3, p0).is_some()
                    {
                        cell.linedefs.push(id as LinedefId);
                    }
                }
            }
        }

        debug!(
            "map cache: {}x{} cells over [{:.1},{:.1}]..[{:.1},{:.1}]",
            width, height, min.x, min.y, max.x, max.y
        );

        Self {
            origin: min,
            width,
            height,
            cells,
        }
    }

    /*---------------------------- lookup ----------------------------*/

    #[inline]
    pub fn cell_at(&self, world: Vec2) -> Option<&Cell> {
        let local = world - self.origin;
        let x = (local.x / CELL_SIZE).floor() as i32;
        let y = (local.y / CELL_SIZE).floor() as i32;
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.cells[(y * self.width + x) as usize])
    }

    /*---------------------------- lights ----------------------------*/

    /// Cell-coordinate range touched by a light disk at `position`.
    fn light_range(&self, position: Vec3, radius: f32) -> (i32, i32, i32, i32) {
        let local = Vec2::new(position.x, position.y) - self.origin;
        let x0 = ((local.x - radius) / CELL_SIZE).floor() as i32;
        let y0 = ((local.y - radius) / CELL_SIZE).floor() as i32;
        let x1 = ((local.x + radius) / CELL_SIZE).floor() as i32;
        let y1 = ((local.y + radius) / CELL_SIZE).floor() as i32;
        (
            x0.clamp(0, self.width - 1),
            y0.clamp(0, self.height - 1),
            x1.clamp(0, self.width - 1),
            y1.clamp(0, self.height - 1),
        )
    }

    /// Drop `light` from every cell its disk at `position` used to touch.
    pub fn remove_light(&mut self, light: LightId, position: Vec3, radius: f32) {
        if self.cells.is_empty() {
            return;
        }
        let (x0, y0, x1, y1) = self.light_range(position, radius);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell = &mut self.cells[(y * self.width + x) as usize];
                cell.lights.retain(|&mut id| id != light);
            }
        }
    }

    /// Register `light` with every cell its disk touches.  Full cells drop
    /// the light silently.
    pub fn add_light(&mut self, light: LightId, source: &Light) {
        if self.cells.is_empty() {
            return;
        }
        let (x0, y0, x1, y1) = self.light_range(source.position, source.radius);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell = &mut self.cells[(y * self.width + x) as usize];
                if !cell.lights.contains(&light) {
                    push_surface_light(&mut cell.lights, light);
                }
            }
        }
    }

    /*------------------------ 3-D intersection ----------------------*/

    /// Does the segment `start -> end` hit any wall or closed portal step?
    ///
    /// The query is a ray in the XY plane plus a linear Z interpolation.
    /// Leaving the grid counts as blocked.
    pub fn intersect_3d(
        &self,
        start: Vec3,
        end: Vec3,
        linedefs: &[Linedef],
        vertices: &[Vertex],
    ) -> bool {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let dz = end.z - start.z;

        let ray_start_xy = Vec2::new(start.x, start.y);
        let ray_dir_xy = Vec2::new(dx, dy);

        // Nudge both endpoints along the direction of travel so a query that
        // starts exactly on a cell boundary does not graze at t = 0.
        let nudge = Vec2::new(0.001 * dx.signum(), 0.001 * dy.signum());
        let local_start = ray_start_xy - self.origin + nudge;
        let local_end = Vec2::new(end.x, end.y) - self.origin + nudge;

        let mut ix = (local_start.x / CELL_SIZE).floor() as i32;
        let mut iy = (local_start.y / CELL_SIZE).floor() as i32;
        if ix < 0 || iy < 0 || ix >= self.width || iy >= self.height {
            return true;
        }

        let ix_end = (local_end.x / CELL_SIZE).floor() as i32;
        let iy_end = (local_end.y / CELL_SIZE).floor() as i32;
        if ix_end < 0 || iy_end < 0 || ix_end >= self.width || iy_end >= self.height {
            return true;
        }

        let fdx = 1.0 / dx.abs();
        let fdy = 1.0 / dy.abs();
        let step_x = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
        let step_y = if dy > 0.0 { 1 } else if dy < 0.0 { -1 } else { 0 };
        let t_delta_x = if step_x != 0 { CELL_SIZE * fdx } else { f32::MAX };
        let t_delta_y = if step_y != 0 { CELL_SIZE * fdy } else { f32::MAX };
        let x_offset = if step_x > 0 {
            CELL_SIZE * (ix + 1) as f32 - local_start.x
        } else {
            local_start.x - CELL_SIZE * ix as f32
        };
        let y_offset = if step_y > 0 {
            CELL_SIZE * (iy + 1) as f32 - local_start.y
        } else {
            local_start.y - CELL_SIZE * iy as f32
        };
        let mut t_max_x = if step_x != 0 { x_offset * fdx } else { f32::MAX };
        let mut t_max_y = if step_y != 0 { y_offset * fdy } else { f32::MAX };
        let mut t = 0.0f32;

        loop {
            let t_next = t_max_x.min(t_max_y);
            if self.cell_blocks(
                ix,
                iy,
                start.z + t * dz,
                start.z + t_next * dz,
                dz,
                start.z,
                ray_start_xy,
                ray_dir_xy,
                linedefs,
                vertices,
            ) {
                return true;
            }

            if ix == ix_end && iy == iy_end {
                return false;
            }

            if t_max_x < t_max_y {
                t = t_max_x;
                t_max_x += t_delta_x;
                ix += step_x;
            } else {
                t = t_max_y;
                t_max_y += t_delta_y;
                iy += step_y;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn cell_blocks(
        &self,
        x: i32,
        y: i32,
        current_z: f32,
        next_z: f32,
        dz: f32,
        start_z: f32,
        ray_start: Vec2,
        ray_dir: Vec2,
        linedefs: &[Linedef],
        vertices: &[Vertex],
    ) -> bool {
        let cell = &self.cells[(y * self.width + x) as usize];
        if cell.linedefs.is_empty() {
            return false;
        }

        for &id in &cell.linedefs {
            let line = &linedefs[id as usize];

            // The ray's Z interval inside this cell misses the line's
            // opening entirely: it can neither clip a floor step nor a
            // ceiling step here.
            if dz < 0.0 {
                if line.max_floor < next_z && line.min_ceiling > current_z {
                    continue;
                }
            } else if line.max_floor < current_z && line.min_ceiling > next_z {
                continue;
            }

            let v0 = vertices[line.v0 as usize].point;
            if let Some((_, ray_t)) =
                math::lines_intersect_cached(ray_start, v0, ray_dir, line.direction)
            {
                if ray_t <= math::EPSILON {
                    continue;
                }
                if !line.two_sided() {
                    return true;
                }
                let z = start_z + dz * ray_t;
                if z < line.max_floor || z > line.min_ceiling {
                    return true;
                }
            }
        }

        false
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::geometry::{Aabb, Side};
    use glam::{vec2, vec3, Vec2};

    /// Hand-built wall, bypassing the map builder.
    fn wall(
        vertices: &mut Vec<Vertex>,
        a: Vec2,
        b: Vec2,
        max_floor: f32,
        min_ceiling: f32,
        two_sided: bool,
    ) -> Linedef {
        let v0 = vertices.len() as u32;
        vertices.push(Vertex { point: a });
        let v1 = vertices.len() as u32;
        vertices.push(Vertex { point: b });
        Linedef {
            v0,
            v1,
            front: Side::new(0, [None; 3]),
            back: two_sided.then(|| Side::new(1, [None; 3])),
            direction: b - a,
            length: (b - a).length(),
            bounds: Aabb::of_segment(a, b),
            segment_count: 1,
            max_floor,
            min_ceiling,
        }
    }

    fn world_with(lines: Vec<Linedef>, vertices: Vec<Vertex>) -> (MapCache, Vec<Linedef>, Vec<Vertex>) {
        let cache = MapCache::build(vec2(0.0, 0.0), vec2(400.0, 400.0), &lines, &vertices);
        (cache, lines, vertices)
    }

    #[test]
    fn lookup_outside_the_grid_is_none() {
        let (cache, ..) = world_with(Vec::new(), Vec::new());
        assert!(cache.cell_at(vec2(10.0, 10.0)).is_some());
        assert!(cache.cell_at(vec2(-1.0, 10.0)).is_none());
        assert!(cache.cell_at(vec2(10.0, 1e6)).is_none());
    }

    #[test]
    fn diagonal_line_lands_in_crossed_cells() {
        let mut vertices = Vec::new();
        let line = wall(&mut vertices, vec2(10.0, 10.0), vec2(390.0, 390.0), 0.0, 0.0, false);
        let (cache, ..) = world_with(vec![line], vertices);

        assert!(cache.cell_at(vec2(20.0, 20.0)).unwrap().linedefs.contains(&0));
        assert!(cache.cell_at(vec2(200.0, 200.0)).unwrap().linedefs.contains(&0));
        // A corner the diagonal never touches.
        assert!(cache.cell_at(vec2(380.0, 20.0)).unwrap().linedefs.is_empty());
    }

    #[test]
    fn ray_leaving_the_grid_counts_as_blocked() {
        let (cache, lines, vertices) = world_with(Vec::new(), Vec::new());
        assert!(cache.intersect_3d(
            vec3(10.0, 10.0, 0.0),
            vec3(-500.0, 10.0, 0.0),
            &lines,
            &vertices
        ));
    }

    #[test]
    fn one_sided_wall_blocks() {
        let mut vertices = Vec::new();
        let line = wall(&mut vertices, vec2(200.0, 0.0), vec2(200.0, 400.0), 0.0, 0.0, false);
        let (cache, lines, vertices) = world_with(vec![line], vertices);

        assert!(cache.intersect_3d(
            vec3(100.0, 200.0, 32.0),
            vec3(300.0, 200.0, 32.0),
            &lines,
            &vertices
        ));
        // Parallel to the wall, never crossing it.
        assert!(!cache.intersect_3d(
            vec3(100.0, 50.0, 32.0),
            vec3(100.0, 350.0, 32.0),
            &lines,
            &vertices
        ));
    }

    #[test]
    fn portal_opening_passes_only_matching_heights() {
        let mut vertices = Vec::new();
        let line = wall(&mut vertices, vec2(200.0, 0.0), vec2(200.0, 400.0), 32.0, 96.0, true);
        let (cache, lines, vertices) = world_with(vec![line], vertices);

        // Inside the opening.
        assert!(!cache.intersect_3d(
            vec3(100.0, 200.0, 64.0),
            vec3(300.0, 200.0, 64.0),
            &lines,
            &vertices
        ));
        // Below the step.
        assert!(cache.intersect_3d(
            vec3(100.0, 200.0, 10.0),
            vec3(300.0, 200.0, 10.0),
            &lines,
            &vertices
        ));
        // Above the lowered ceiling.
        assert!(cache.intersect_3d(
            vec3(100.0, 200.0, 120.0),
            vec3(300.0, 200.0, 120.0),
            &lines,
            &vertices
        ));
    }

    #[test]
    fn intersection_is_commutative_in_xy() {
        let mut vertices = Vec::new();
        let line = wall(&mut vertices, vec2(200.0, 0.0), vec2(200.0, 400.0), 32.0, 96.0, true);
        let (cache, lines, vertices) = world_with(vec![line], vertices);

        let cases = [
            (vec3(100.0, 200.0, 64.0), vec3(300.0, 200.0, 64.0)),
            (vec3(100.0, 200.0, 10.0), vec3(300.0, 200.0, 10.0)),
            (vec3(50.0, 50.0, 64.0), vec3(350.0, 390.0, 64.0)),
        ];
        for (a, b) in cases {
            assert_eq!(
                cache.intersect_3d(a, b, &lines, &vertices),
                cache.intersect_3d(b, a, &lines, &vertices),
            );
        }
    }

    #[test]
    fn light_cell_registration_follows_moves() {
        let (mut cache, ..) = world_with(Vec::new(), Vec::new());
        let light = Light::new(vec3(100.0, 100.0, 64.0), 80.0, 1.0);

        cache.add_light(3, &light);
        assert!(cache.cell_at(vec2(100.0, 100.0)).unwrap().lights.contains(&3));
        assert!(cache.cell_at(vec2(160.0, 100.0)).unwrap().lights.contains(&3));
        assert!(!cache.cell_at(vec2(390.0, 390.0)).unwrap().lights.contains(&3));

        cache.remove_light(3, light.position, light.radius);
        assert!(!cache.cell_at(vec2(100.0, 100.0)).unwrap().lights.contains(&3));

        let moved = Light::new(vec3(350.0, 350.0, 64.0), 80.0, 1.0);
        cache.add_light(3, &moved);
        assert!(cache.cell_at(vec2(350.0, 350.0)).unwrap().lights.contains(&3));
    }
}
