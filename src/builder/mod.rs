//! Polygon-soup to sector-map builder.
//!
//! Polygons are added in order; later polygons carve into earlier ones.  The
//! build runs in three phases: clip resolution (Boolean differences plus
//! co-linear vertex reconciliation), sector creation through the level's
//! interning API, and containment linking of portals for sectors that float
//! inside other sectors.

pub mod polygon;

use geo::{BooleanOps, LineString, Polygon as GeoPolygon};
use glam::Vec2;
use log::{debug, info};

use crate::math;
use crate::texture::TextureRef;
use crate::world::{Level, SectorId, Side, WallTexture, VERTEX_SNAP};
use polygon::Polygon;

#[derive(Default)]
pub struct MapBuilder {
    polygons: Vec<Polygon>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a polygon.  Anti-clockwise outlines are reversed so every
    /// polygon is clockwise from here on; outlines with fewer than three
    /// vertices are dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn add_polygon(
        &mut self,
        floor_height: f32,
        ceiling_height: f32,
        brightness: f32,
        wall_texture: Option<TextureRef>,
        floor_texture: Option<TextureRef>,
        ceiling_texture: Option<TextureRef>,
        vertices: Vec<Vec2>,
    ) {
        if vertices.len() < 3 {
            debug!("dropping degenerate polygon with {} vertices", vertices.len());
            return;
        }
        let mut poly = Polygon::new(
            floor_height,
            ceiling_height,
            brightness,
            wall_texture,
            floor_texture,
            ceiling_texture,
            vertices,
        );
        if !poly.is_clockwise() {
            poly.reverse_vertices();
        }
        self.polygons.push(poly);
    }

    /// First queued polygon strictly containing `point`.
    pub fn polygon_at_point(&self, point: Vec2) -> Option<usize> {
        self.polygons
            .iter()
            .position(|p| p.is_point_inside(point, false))
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Consume the queued polygons and produce a level.
    pub fn build(mut self) -> Level {
        info!("building level from {} polygons", self.polygons.len());

        debug!("1. resolve polygon intersections");
        self.resolve_intersections();

        debug!("2. create sectors from {} polygons", self.polygons.len());
        let mut level = Level::default();
        for poly in &self.polygons {
            level.create_sector_from_polygon(poly);
        }

        debug!("3. link contained linedefs");
        self.link_contained_lines(&mut level);

        level.rebuild_cache();
        level.log_stats();
        level
    }

    /*--------------------- phase 1: clip resolution -----------------*/

    /// Carve every earlier polygon by every later one, then reconcile
    /// co-linear vertices so shared boundaries share exact outline points.
    fn resolve_intersections(&mut self) {
        let mut i = 1;
        while i < self.polygons.len() {
            let mut j = 0;
            while j < i {
                let contained = self.polygons[j].contains(&self.polygons[i], false);
                let overlapping = self.polygons[j].overlaps(&self.polygons[i])
                    || self.polygons[i].overlaps(&self.polygons[j]);
                if contained || !overlapping {
                    // Floating sectors are linked in phase 3; disjoint
                    // polygons have nothing to resolve.
                    j += 1;
                    continue;
                }

                let contours = difference(&self.polygons[j], &self.polygons[i]);
                debug!(
                    "polygon {j} clipped by polygon {i}: {} external contours",
                    contours.len()
                );

                let mut contours = contours.into_iter();
                let Some(first) = contours.next() else {
                    // Entirely swallowed by the newer polygon.
                    self.polygons.remove(j);
                    i -= 1;
                    continue;
                };
                self.polygons[j].vertices = first;

                // Extra contours spawn sectors of their own, inheriting the
                // carved polygon's attributes.  They are already disjoint
                // from polygon i, so the carve loop skips over them.
                let mut extra = 0;
                for ring in contours {
                    extra += 1;
                    let fragment = self.polygons[j].with_vertices(ring);
                    self.polygons.insert(j + extra, fragment);
                }
                i += extra;
                j += extra + 1;
            }
            i += 1;
        }

        for poly in &mut self.polygons {
            poly.optimize();
        }
        self.polygons.retain(|p| p.vertices.len() >= 3);

        self.reconcile_shared_edges();
    }

    /// Insert any vertex of one polygon that lies on an edge of another into
    /// the latter, so neighbouring outlines agree on their shared points.
    fn reconcile_shared_edges(&mut self) {
        for a in 0..self.polygons.len() {
            for b in 0..self.polygons.len() {
                if a == b {
                    continue;
                }
                let vertices = self.polygons[a].vertices.clone();
                for v in vertices {
                    if self.polygons[b].contains_vertex_within(v, VERTEX_SNAP) {
                        continue;
                    }
                    let edge = {
                        let poly = &self.polygons[b];
                        (0..poly.vertices.len()).find_map(|k| {
                            let e0 = poly.vertices[k];
                            let e1 = poly.vertices[(k + 1) % poly.vertices.len()];
                            math::point_on_segment(v, e0, e1, math::PRECISION_LOW)
                                .then_some((e0, e1))
                        })
                    };
                    if let Some((e0, e1)) = edge {
                        self.polygons[b].insert_point(v, e0, e1);
                    }
                }
            }
        }
    }

    /*------------------- phase 3: containment links ------------------*/

    /// One-sided linedefs lying strictly inside another polygon become
    /// portals into that polygon's sector.
    ///
    /// Containment is judged against the post-clip polygon list in creation
    /// order, exactly as the sectors were emitted.  A polygon split after
    /// its sector was matched could in principle attribute a line to a stale
    /// outline; the behaviour is kept as is.
    fn link_contained_lines(&self, level: &mut Level) {
        for j in 0..self.polygons.len() {
            // Candidates are tried from the most recently added downwards, so
            // a line nested in several polygons links to the innermost one.
            for i in (0..j).rev() {
                let lines = level.sectors[j].linedefs.clone();
                for line_id in lines {
                    let line = &level.linedefs[line_id as usize];
                    if line.two_sided() {
                        continue;
                    }
                    let p0 = level.vertices[line.v0 as usize].point;
                    let p1 = level.vertices[line.v1 as usize].point;
                    if !self.polygons[i].is_point_inside(p0, false)
                        || !self.polygons[i].is_point_inside(p1, false)
                    {
                        continue;
                    }

                    let mut textures = line.front.textures;
                    textures[WallTexture::Middle as usize] = None;
                    let mut back = Side::new(i as SectorId, textures);
                    back.materialize_segments(p0, p1, line.segment_count);

                    level.linedefs[line_id as usize].back = Some(back);
                    level.linedefs[line_id as usize]
                        .front
                        .textures[WallTexture::Middle as usize] = None;
                    level.sectors[i].linedefs.push(line_id);
                    level.linedefs[line_id as usize].update_floor_ceiling_limits(&level.sectors);
                }
            }
        }
    }
}

/// Boolean difference `a - b` through the clipping backend.  Returns the
/// external contours as clockwise rings; holes are discarded.
fn difference(a: &Polygon, b: &Polygon) -> Vec<Vec<Vec2>> {
    let to_geo = |p: &Polygon| {
        GeoPolygon::new(
            LineString::from(
                p.vertices
                    .iter()
                    .map(|v| (v.x, v.y))
                    .collect::<Vec<(f32, f32)>>(),
            ),
            Vec::new(),
        )
    };

    to_geo(a)
        .difference(&to_geo(b))
        .into_iter()
        .filter_map(|poly| {
            let mut ring: Vec<Vec2> = poly
                .exterior()
                .coords()
                .map(|c| Vec2::new(c.x, c.y))
                .collect();
            // The backend closes its rings; drop the duplicate endpoint.
            if ring.len() > 1 && (ring[0] - ring[ring.len() - 1]).length() < math::EPSILON {
                ring.pop();
            }
            if ring.len() < 3 {
                return None;
            }
            let area: f32 = (0..ring.len())
                .map(|k| math::cross(ring[k], ring[(k + 1) % ring.len()]))
                .sum();
            if area > 0.0 {
                ring.reverse();
            }
            Some(ring)
        })
        .collect()
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
