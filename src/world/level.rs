//! Level operations: vertex/linedef interning, the sector factory used by the
//! map builder, light management and the debug 3-D occlusion query.

use glam::{Vec2, Vec3};
use log::{debug, trace};

use crate::builder::polygon::Polygon;
use crate::math;
use crate::texture::TextureRef;
use crate::world::geometry::{
    push_surface_light, Level, Light, LightId, LineSide, Linedef, LinedefId, Aabb, Sector,
    SectorId, SectorPlane, Side, VertexId, Vertex, MAX_LIGHTS, SEGMENT_LENGTH, WallTexture,
};
use crate::world::map_cache::MapCache;

/// Two points closer than this are the same vertex.
pub const VERTEX_SNAP: f32 = 1.0;

impl Level {
    /*------------------------ construction --------------------------*/

    /// Find the vertex within [`VERTEX_SNAP`] of `point`, or append one.
    /// Level bounds grow with every new vertex.
    pub fn get_vertex(&mut self, point: Vec2) -> VertexId {
        for (id, vertex) in self.vertices.iter().enumerate() {
            if (vertex.point - point).length() < VERTEX_SNAP {
                return id as VertexId;
            }
        }

        if self.vertices.is_empty() {
            self.min = point;
            self.max = point;
        } else {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        }

        self.vertices.push(Vertex { point });
        (self.vertices.len() - 1) as VertexId
    }

    /// Find the linedef between `v0` and `v1` (either direction), or create
    /// one fronting `sector`.
    ///
    /// Reusing an existing linedef makes it two-sided: the new caller takes
    /// over the front textures, the previous front textures move to the back
    /// side, and the middle texture is cleared on both sides so the line
    /// becomes a portal.
    pub fn get_linedef(
        &mut self,
        sector: SectorId,
        v0: VertexId,
        v1: VertexId,
        wall_textures: [Option<TextureRef>; 3],
    ) -> LinedefId {
        let p0 = self.vertices[v0 as usize].point;
        let p1 = self.vertices[v1 as usize].point;

        for (id, line) in self.linedefs.iter_mut().enumerate() {
            if !line.connects(v0, v1) {
                continue;
            }

            let mut back = Side::new(sector, line.front.textures);
            line.front.textures = wall_textures;
            line.front.textures[WallTexture::Middle as usize] = None;
            back.textures[WallTexture::Middle as usize] = None;

            let line_p0 = self.vertices[line.v0 as usize].point;
            let line_p1 = self.vertices[line.v1 as usize].point;
            back.materialize_segments(line_p0, line_p1, line.segment_count);
            line.back = Some(back);

            trace!("reuse linedef {id}: ({p0}) <-> ({p1}) now two-sided");
            return id as LinedefId;
        }

        let direction = p1 - p0;
        let length = direction.length();
        let segment_count = (length / SEGMENT_LENGTH).ceil().max(1.0) as u32;
        let mut front = Side::new(sector, wall_textures);
        front.materialize_segments(p0, p1, segment_count);

        self.linedefs.push(Linedef {
            v0,
            v1,
            front,
            back: None,
            direction,
            length,
            bounds: Aabb::of_segment(p0, p1),
            segment_count,
            max_floor: 0.0,
            min_ceiling: 0.0,
        });
        (self.linedefs.len() - 1) as LinedefId
    }

    /// Append a sector built from `poly` and intern its vertices and
    /// linedefs.
    pub fn create_sector_from_polygon(&mut self, poly: &Polygon) -> SectorId {
        let sector = self.sectors.len() as SectorId;
        self.sectors.push(Sector::new(
            SectorPlane::new(poly.floor_height, poly.floor_texture),
            SectorPlane::new(poly.ceiling_height, poly.ceiling_texture),
            poly.brightness,
        ));

        let wall = [poly.wall_texture; 3];
        for i in 0..poly.vertices.len() {
            let v0 = self.get_vertex(poly.vertices[i]);
            let v1 = self.get_vertex(poly.vertices[(i + 1) % poly.vertices.len()]);
            let line = self.get_linedef(sector, v0, v1, wall);
            self.sectors[sector as usize].linedefs.push(line);
            self.linedefs[line as usize].update_floor_ceiling_limits(&self.sectors);
        }

        sector
    }

    /// Rebuild the spatial cache from the current geometry and re-register
    /// every light with it.
    pub fn rebuild_cache(&mut self) {
        self.cache = MapCache::build(self.min, self.max, &self.linedefs, &self.vertices);
        for (id, light) in self.lights.iter().enumerate() {
            self.cache.add_light(id as LightId, light);
        }
    }

    /*-------------------------- queries -----------------------------*/

    #[inline]
    pub fn sector_contains(&self, sector: SectorId, point: Vec2) -> bool {
        let edges = self.sectors[sector as usize].linedefs.iter().map(|&id| {
            let line = &self.linedefs[id as usize];
            (
                self.vertices[line.v0 as usize].point,
                self.vertices[line.v1 as usize].point,
            )
        });
        math::winding_number(edges, point).abs() == 1
    }

    /// First sector containing `point`, scanning in creation order.
    pub fn sector_at(&self, point: Vec2) -> Option<SectorId> {
        (0..self.sectors.len() as SectorId).find(|&s| self.sector_contains(s, point))
    }

    pub fn sector_references_vertex(&self, sector: SectorId, v: VertexId) -> bool {
        self.sectors[sector as usize]
            .linedefs
            .iter()
            .any(|&id| self.linedefs[id as usize].touches(v))
    }

    pub fn sector_connects_vertices(&self, sector: SectorId, v0: VertexId, v1: VertexId) -> bool {
        self.sectors[sector as usize]
            .linedefs
            .iter()
            .any(|&id| self.linedefs[id as usize].connects(v0, v1))
    }

    /// Debug/test occlusion query.  The renderer's hot paths call the map
    /// cache directly.
    pub fn intersect_3d(&self, p0: Vec3, p1: Vec3) -> bool {
        self.cache.intersect_3d(p0, p1, &self.linedefs, &self.vertices)
    }

    /*------------------------ height mutators -----------------------*/

    /// Set a sector's floor height, clamped to its ceiling, and re-derive the
    /// openings of its linedefs.
    pub fn set_floor_height(&mut self, sector: SectorId, height: f32) {
        let ceiling = self.sectors[sector as usize].ceiling.height;
        self.sectors[sector as usize].floor.height = height.min(ceiling);
        self.update_sector_line_limits(sector);
    }

    /// Set a sector's ceiling height, clamped to its floor, and re-derive the
    /// openings of its linedefs.
    pub fn set_ceiling_height(&mut self, sector: SectorId, height: f32) {
        let floor = self.sectors[sector as usize].floor.height;
        self.sectors[sector as usize].ceiling.height = height.max(floor);
        self.update_sector_line_limits(sector);
    }

    fn update_sector_line_limits(&mut self, sector: SectorId) {
        let lines = self.sectors[sector as usize].linedefs.clone();
        for id in lines {
            self.linedefs[id as usize].update_floor_ceiling_limits(&self.sectors);
        }
    }

    /*--------------------------- lights -----------------------------*/

    /// Add a light, recompute the per-surface light lists and register the
    /// light with the map cache.  Returns `None` once [`MAX_LIGHTS`] is
    /// reached.
    pub fn add_light(&mut self, position: Vec3, radius: f32, strength: f32) -> Option<LightId> {
        if self.lights.len() >= MAX_LIGHTS {
            return None;
        }
        let id = self.lights.len() as LightId;
        self.lights.push(Light::new(position, radius, strength));
        self.update_lights();
        self.cache.add_light(id, &self.lights[id as usize]);
        Some(id)
    }

    /// Move a light: cache cell membership follows the move and every
    /// surface light list is recomputed.
    pub fn set_light_position(&mut self, light: LightId, position: Vec3) {
        let previous = self.lights[light as usize].position;
        let radius = self.lights[light as usize].radius;
        self.cache.remove_light(light, previous, radius);
        self.lights[light as usize].position = position;
        self.update_lights();
        self.cache.add_light(light, &self.lights[light as usize]);
    }

    /// Recompute the bounded light list of every wall segment.
    ///
    /// A segment is lit by a light when the segment midpoint lies within the
    /// light radius and the segment faces the light.  Without the
    /// `dynamic-shadows` feature, at least one of the four wall corners must
    /// additionally have an unoccluded line of sight to the light; with it,
    /// occlusion is evaluated per pixel at draw time instead.
    pub fn update_lights(&mut self) {
        self.light_overflows = 0;

        for line in &mut self.linedefs {
            for segment in &mut line.front.segments {
                segment.lights.clear();
            }
            if let Some(back) = &mut line.back {
                for segment in &mut back.segments {
                    segment.lights.clear();
                }
            }
        }

        // Decide with shared borrows only, apply afterwards.
        let mut lit: Vec<(LinedefId, LineSide, usize, LightId)> = Vec::new();

        for (light_id, light) in self.lights.iter().enumerate() {
            let light_xy = Vec2::new(light.position.x, light.position.y);

            for (sector_id, sector) in self.sectors.iter().enumerate() {
                for &line_id in &sector.linedefs {
                    let line = &self.linedefs[line_id as usize];
                    let which = line.side_of(sector_id as SectorId);
                    let Some(side) = line.side(which) else { continue };
                    if side.sector != sector_id as SectorId {
                        continue;
                    }

                    for (seg_idx, segment) in side.segments.iter().enumerate() {
                        if (segment.midpoint() - light_xy).length() > light.radius {
                            continue;
                        }
                        if !segment_faces(segment.p0, segment.p1, which, light_xy) {
                            continue;
                        }
                        if segment.lights.contains(&(light_id as LightId)) {
                            continue;
                        }
                        if !cfg!(feature = "dynamic-shadows")
                            && !self.any_corner_sees(segment.p0, segment.p1, sector, light)
                        {
                            continue;
                        }
                        lit.push((line_id, which, seg_idx, light_id as LightId));
                    }
                }
            }
        }

        for (line_id, which, seg_idx, light_id) in lit {
            let line = &mut self.linedefs[line_id as usize];
            let side = match which {
                LineSide::Front => &mut line.front,
                LineSide::Back => match &mut line.back {
                    Some(back) => back,
                    None => continue,
                },
            };
            if !push_surface_light(&mut side.segments[seg_idx].lights, light_id) {
                self.light_overflows += 1;
            }
        }

        trace!(
            "light update: {} lights, {} overflow drops",
            self.lights.len(),
            self.light_overflows
        );
    }

    /// At least one of the four wall corners (segment endpoints at the
    /// sector's floor and ceiling) has line of sight to the light.
    fn any_corner_sees(&self, p0: Vec2, p1: Vec2, sector: &Sector, light: &Light) -> bool {
        let heights = [sector.floor.height, sector.ceiling.height];
        for p in [p0, p1] {
            for z in heights {
                let corner = Vec3::new(p.x, p.y, z);
                if !self
                    .cache
                    .intersect_3d(corner, light.position, &self.linedefs, &self.vertices)
                {
                    return true;
                }
            }
        }
        false
    }
}

/// Half-plane facing test: the side's sector interior lies to the right of
/// the stored direction (clockwise winding), so a front side faces points
/// with a negative line function and a back side the opposite.
#[inline]
fn segment_faces(p0: Vec2, p1: Vec2, which: LineSide, point: Vec2) -> bool {
    let s = math::sign(p0, p1, point);
    match which {
        LineSide::Front => s < 0.0,
        LineSide::Back => s > 0.0,
    }
}

impl Level {
    /// Debug summary used by the demo viewer.
    pub fn log_stats(&self) {
        debug!(
            "level: {} vertices, {} linedefs, {} sectors, {} lights",
            self.vertices.len(),
            self.linedefs.len(),
            self.sectors.len(),
            self.lights.len()
        );
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use glam::{vec2, vec3};

    fn square(origin: Vec2, size: f32) -> Vec<Vec2> {
        vec![
            origin,
            origin + vec2(0.0, size),
            origin + vec2(size, size),
            origin + vec2(size, 0.0),
        ]
    }

    fn one_room() -> Level {
        let mut level = Level::default();
        let poly = Polygon::new(0.0, 128.0, 1.0, Some(1), Some(2), Some(3), square(vec2(0.0, 0.0), 256.0));
        level.create_sector_from_polygon(&poly);
        level.rebuild_cache();
        level
    }

    #[test]
    fn vertices_snap_within_one_unit() {
        let mut level = Level::default();
        let a = level.get_vertex(vec2(10.0, 10.0));
        let b = level.get_vertex(vec2(10.5, 10.0));
        let c = level.get_vertex(vec2(12.0, 10.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(level.vertices.len(), 2);
    }

    #[test]
    fn bounds_follow_vertices() {
        let mut level = Level::default();
        level.get_vertex(vec2(10.0, 20.0));
        level.get_vertex(vec2(-30.0, 5.0));
        assert_eq!(level.min, vec2(-30.0, 5.0));
        assert_eq!(level.max, vec2(10.0, 20.0));
    }

    #[test]
    fn reused_linedef_migrates_textures() {
        let mut level = Level::default();
        let poly = Polygon::new(0.0, 128.0, 1.0, Some(7), None, None, square(vec2(0.0, 0.0), 100.0));
        let first = level.create_sector_from_polygon(&poly);

        let v0 = level.get_vertex(vec2(100.0, 100.0));
        let v1 = level.get_vertex(vec2(100.0, 0.0));
        let line = level.get_linedef(1, v0, v1, [Some(9), Some(9), Some(9)]);

        let line = &level.linedefs[line as usize];
        assert!(line.two_sided());
        assert_eq!(line.front.sector, first);
        assert_eq!(line.back.as_ref().map(|s| s.sector), Some(1));
        // New caller's textures take the front; the old front moves back.
        assert_eq!(line.front.texture(WallTexture::Top), Some(9));
        assert_eq!(line.back.as_ref().unwrap().texture(WallTexture::Top), Some(7));
        // Two-sided lines lose their middle texture on both sides.
        assert_eq!(line.front.texture(WallTexture::Middle), None);
        assert_eq!(line.back.as_ref().unwrap().texture(WallTexture::Middle), None);
        // Both sides carry materialized segments.
        assert!(!line.front.segments.is_empty());
        assert!(!line.back.as_ref().unwrap().segments.is_empty());
    }

    #[test]
    fn sector_point_queries() {
        let level = one_room();
        assert!(level.sector_contains(0, vec2(50.0, 75.0)));
        assert!(!level.sector_contains(0, vec2(-10.0, -10.0)));
        assert_eq!(level.sector_at(vec2(128.0, 128.0)), Some(0));
        assert_eq!(level.sector_at(vec2(-5.0, -5.0)), None);
    }

    #[test]
    fn floor_never_rises_above_ceiling() {
        let mut level = one_room();
        level.set_floor_height(0, 500.0);
        assert_eq!(level.sectors[0].floor.height, 128.0);
        level.set_ceiling_height(0, -100.0);
        assert_eq!(level.sectors[0].ceiling.height, 128.0);
        // Openings follow the mutation.
        for line in &level.linedefs {
            assert_eq!(line.max_floor, 128.0);
        }
    }

    #[test]
    fn light_cap_is_enforced() {
        let mut level = one_room();
        for i in 0..MAX_LIGHTS {
            assert!(
                level
                    .add_light(vec3(50.0, 50.0, 64.0 + i as f32), 50.0, 1.0)
                    .is_some()
            );
        }
        assert!(level.add_light(vec3(50.0, 50.0, 64.0), 50.0, 1.0).is_none());
        assert_eq!(level.lights.len(), MAX_LIGHTS);
    }

    #[test]
    fn lights_attach_to_nearby_facing_segments() {
        let mut level = one_room();
        let light = level
            .add_light(vec3(128.0, 30.0, 64.0), 200.0, 1.0)
            .expect("under the light cap");

        // The southern wall (y = 0) faces the light from its front side.
        let south = level
            .linedefs
            .iter()
            .find(|l| {
                let p0 = level.vertices[l.v0 as usize].point;
                let p1 = level.vertices[l.v1 as usize].point;
                p0.y == 0.0 && p1.y == 0.0
            })
            .expect("one axis-aligned south wall");
        assert!(
            south
                .front
                .segments
                .iter()
                .any(|seg| seg.lights.contains(&light))
        );
    }

    #[test]
    fn grid_world_ray_queries_are_deterministic() {
        use crate::builder::MapBuilder;

        const N: i32 = 16;
        const SIZE: f32 = 256.0;

        let mut builder = MapBuilder::new();
        for y in 0..N {
            for x in 0..N {
                let x0 = x as f32 * SIZE;
                let y0 = y as f32 * SIZE;
                builder.add_polygon(
                    0.0,
                    256.0,
                    1.0,
                    None,
                    None,
                    None,
                    vec![
                        vec2(x0, y0),
                        vec2(x0 + SIZE, y0),
                        vec2(x0 + SIZE, y0 + SIZE),
                        vec2(x0, y0 + SIZE),
                    ],
                );
            }
        }
        let level = builder.build();
        assert_eq!(level.sectors.len(), (N * N) as usize);

        // Every interior line is an open portal at z = 128: the long
        // diagonal crosses the whole grid without a block.
        let a = vec3(10.0, 10.0, 128.0);
        let b = vec3(4000.0, 4000.0, 128.0);
        assert!(!level.intersect_3d(a, b));
        assert!(!level.intersect_3d(b, a));

        // Straight into the neighbouring sector at the same height.
        assert!(!level.intersect_3d(
            vec3(100.0, 100.0, 128.0),
            vec3(400.0, 100.0, 128.0)
        ));

        // Leaving the world counts as blocked.
        assert!(level.intersect_3d(a, vec3(-100.0, 10.0, 128.0)));
    }

    #[test]
    fn moving_a_light_to_its_own_position_changes_nothing() {
        let mut level = one_room();
        let light = level
            .add_light(vec3(128.0, 128.0, 64.0), 150.0, 1.0)
            .expect("under the light cap");

        let before: Vec<Vec<_>> = level
            .linedefs
            .iter()
            .map(|l| l.front.segments.iter().map(|s| s.lights.clone()).collect())
            .collect();

        let position = level.lights[light as usize].position;
        level.set_light_position(light, position);

        let after: Vec<Vec<_>> = level
            .linedefs
            .iter()
            .map(|l| l.front.segments.iter().map(|s| s.lights.clone()).collect())
            .collect();
        assert_eq!(before, after);
    }
}
