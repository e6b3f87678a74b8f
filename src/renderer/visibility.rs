//! Optional pre-pass: refresh each sector's visible-linedef subset before
//! the column loop.
//!
//! A recursive walk from the camera's sector keeps linedefs that face the
//! camera and touch the view triangle (camera, far-left ray end, far-right
//! ray end), recursing through portals.  Each sector is visited at most once
//! per tick.

use glam::Vec2;

use crate::math;
use crate::renderer::{Counters, DRAW_DISTANCE};
use crate::world::{Camera, Level, LineSide, Linedef, Sector, SectorId, Vertex, VertexId};

pub(crate) fn refresh(
    level: &mut Level,
    start: SectorId,
    camera: &Camera,
    tick: u32,
    counters: &Counters,
    vertex_vis: &mut [(u32, bool)],
) {
    let far_left = camera.position + (camera.direction - camera.plane) * DRAW_DISTANCE;
    let far_right = camera.position + (camera.direction + camera.plane) * DRAW_DISTANCE;

    let Level {
        sectors,
        linedefs,
        vertices,
        ..
    } = level;

    let mut walker = Walker {
        sectors,
        linedefs,
        vertices,
        camera: camera.position,
        far_left,
        far_right,
        tick,
        counters,
        vertex_vis,
    };
    walker.walk(start);
}

struct Walker<'a> {
    sectors: &'a mut [Sector],
    linedefs: &'a [Linedef],
    vertices: &'a [Vertex],
    camera: Vec2,
    far_left: Vec2,
    far_right: Vec2,
    tick: u32,
    counters: &'a Counters,
    vertex_vis: &'a mut [(u32, bool)],
}

impl Walker<'_> {
    fn walk(&mut self, sector_id: SectorId) {
        let sector = &mut self.sectors[sector_id as usize];
        if sector.visited_tick == self.tick {
            return;
        }
        sector.visited_tick = self.tick;

        let lines = sector.linedefs.clone();
        let mut visible = Vec::new();
        let mut portals = Vec::new();

        for line_id in lines {
            Counters::bump(&self.counters.line_checks);
            let line = &self.linedefs[line_id as usize];
            let p0 = self.vertices[line.v0 as usize].point;
            let p1 = self.vertices[line.v1 as usize].point;

            // Sector interiors lie to the right of their clockwise outlines;
            // a line whose viewed side looks away from the camera is skipped.
            let s = math::sign(p0, p1, self.camera);
            let facing = match line.side_of(sector_id) {
                LineSide::Front => s < 0.0,
                LineSide::Back => s > 0.0,
            };
            if !facing {
                continue;
            }

            let visible_line = self.vertex_visible(line.v0)
                || self.vertex_visible(line.v1)
                || math::lines_intersect(p0, p1, self.camera, self.far_left).is_some()
                || math::lines_intersect(p0, p1, self.camera, self.far_right).is_some();
            if !visible_line {
                continue;
            }

            Counters::bump(&self.counters.visible_lines);
            visible.push(line_id);
            if let Some(back) = line.sector_behind(sector_id) {
                portals.push(back);
            }
        }

        self.sectors[sector_id as usize].visible_linedefs = visible;

        for back in portals {
            self.walk(back);
        }
    }

    /// Vertex-in-view-triangle, cached per tick.
    fn vertex_visible(&mut self, v: VertexId) -> bool {
        let entry = &mut self.vertex_vis[v as usize];
        if entry.0 == self.tick {
            return entry.1;
        }

        Counters::bump(&self.counters.vertex_checks);
        let visible = math::point_in_triangle(
            self.vertices[v as usize].point,
            self.camera,
            self.far_left,
            self.far_right,
        );
        if visible {
            Counters::bump(&self.counters.visible_vertices);
        }
        *entry = (self.tick, visible);
        visible
    }
}
