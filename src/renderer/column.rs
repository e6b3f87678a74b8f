//! Per-column state: ray generation, portal-graph intersection collection
//! and the near-to-far draw recursion.

use glam::Vec2;
use smallvec::SmallVec;

use crate::math;
use crate::renderer::lighting;
use crate::renderer::{
    Counters, Frame, Pixel, StepHook, DRAW_DISTANCE, MAX_COLUMN_INTERSECTIONS,
    MAX_SECTOR_HISTORY,
};
use crate::world::{LineSide, LinedefId, SectorId, WallTexture};

/// One ray/linedef intersection, recorded while descending the portal graph.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Hit {
    pub line: LinedefId,
    /// Sector that was being traversed when the hit was found; its planes
    /// and brightness drive the drawing at this depth.
    pub sector: SectorId,
    /// Sector on the far side of the line; `None` for a solid wall.
    pub through: Option<SectorId>,
    pub side: LineSide,
    pub point: Vec2,
    /// Distance from the camera plane; drives perspective scale.
    pub planar: f32,
    pub planar_inv: f32,
    /// Euclidean camera distance; drives light falloff.
    pub point_dist: f32,
    pub point_dist_inv: f32,
    /// Parameter along the linedef, `0` at `v0`.
    pub line_t: f32,
    /// Precomputed distance attenuation for this depth.
    pub dim: f32,
}

/// Column state machine: collecting intersections, then drawing them in
/// order until a solid wall, a closed window or the end of the list.
pub(crate) struct Column<'a, 'h> {
    frame: &'a Frame<'a>,
    x: u32,
    ray_dir: Vec2,
    /// Ray vector scaled to the draw distance; intersection parameters are
    /// fractions of it.
    ray_vec: Vec2,
    theta_inv: f32,
    hits: SmallVec<[Hit; MAX_COLUMN_INTERSECTIONS]>,
    visited: SmallVec<[SectorId; MAX_SECTOR_HISTORY]>,
    hook: Option<&'h mut StepHook>,
}

impl<'a, 'h> Column<'a, 'h> {
    pub(crate) fn render(frame: &'a Frame<'a>, x: u32, hook: Option<&'h mut StepHook>) {
        let Some(start) = frame.in_sector else {
            return;
        };

        let cam_x = (x * 2) as f32 / frame.width as f32 - 1.0;
        let ray_dir = frame.direction + frame.plane * cam_x;

        let mut column = Self {
            frame,
            x,
            ray_dir,
            ray_vec: ray_dir * DRAW_DISTANCE,
            theta_inv: 1.0 / frame.direction.dot(ray_dir.normalize()),
            hits: SmallVec::new(),
            visited: SmallVec::new(),
            hook,
        };

        column.visited.push(start);
        column.collect(start);
        column.draw_from(0, 0.0, frame.height as f32);
    }

    #[inline]
    pub(crate) fn frame(&self) -> &'a Frame<'a> {
        self.frame
    }

    #[inline]
    pub(crate) fn ray_dir(&self) -> Vec2 {
        self.ray_dir
    }

    #[inline]
    pub(crate) fn theta_inv(&self) -> f32 {
        self.theta_inv
    }

    /// Write one pixel and, in single-step mode, let the observer look at
    /// the buffer.
    #[inline]
    pub(crate) fn put_pixel(&mut self, y: u32, value: Pixel) {
        self.frame.fb.write(self.x, y, value);
        if let Some(hook) = self.hook.as_mut() {
            // SAFETY: the hook only exists in serial rendering, where no
            // other writer is active.
            let buffer = unsafe { self.frame.fb.as_slice() };
            hook(buffer, self.x, y);
        }
    }

    /*--------------------- intersection collection ------------------*/

    /// Walk the portal graph from `sector`, recording every ray/linedef
    /// intersection sorted by ascending planar distance.
    fn collect(&mut self, sector: SectorId) {
        Counters::bump(&self.frame.counters.sectors_visited);

        let level = self.frame.level;
        let sect = &level.sectors[sector as usize];

        // The pre-pass narrows the candidate set when it ran this tick.
        let lines: &[LinedefId] = if cfg!(feature = "sector-visibility")
            && sect.visited_tick == self.frame.tick
        {
            &sect.visible_linedefs
        } else {
            &sect.linedefs
        };

        for &line_id in lines {
            let line = &level.linedefs[line_id as usize];
            let v0 = level.vertices[line.v0 as usize].point;

            // The returned parameter runs along the ray; the position along
            // the line is recovered from the hit point.
            let Some((point, ray_t)) =
                math::lines_intersect_cached(self.frame.position, v0, self.ray_vec, line.direction)
            else {
                continue;
            };
            if ray_t <= math::EPSILON || self.hits.len() >= MAX_COLUMN_INTERSECTIONS {
                continue;
            }

            let line_t = project_ray_fraction(line.direction, point - v0);
            let planar = ray_t * DRAW_DISTANCE;
            let point_dist = planar * self.theta_inv;

            let side = if line.front.sector == sector {
                LineSide::Front
            } else {
                LineSide::Back
            };
            let through = line.sector_behind(sector);

            let hit = Hit {
                line: line_id,
                sector,
                through,
                side,
                point,
                planar,
                planar_inv: 1.0 / planar,
                point_dist,
                point_dist_inv: 1.0 / point_dist,
                line_t,
                dim: lighting::attenuation(point_dist),
            };

            let slot = self.hits.partition_point(|h| h.planar < hit.planar);
            self.hits.insert(slot, hit);

            if let Some(back) = through {
                if !self.visited.contains(&back) && self.visited.len() < MAX_SECTOR_HISTORY {
                    self.visited.push(back);
                    self.collect(back);
                }
            }
        }
    }

    /*--------------------------- drawing ----------------------------*/

    /// Draw the sorted hit list from `index` on, confined to the vertical
    /// window `[top_limit, bottom_limit)`.
    fn draw_from(&mut self, index: usize, top_limit: f32, bottom_limit: f32) {
        let Some(&hit) = self.hits.get(index) else {
            return;
        };
        if top_limit >= bottom_limit {
            return;
        }

        let level = self.frame.level;
        let sector = &level.sectors[hit.sector as usize];
        let scale = self.frame.unit_size * hit.planar_inv;
        let ceiling_screen =
            self.frame.horizon - (sector.ceiling.height - self.frame.view_z) * scale;
        let floor_screen = self.frame.horizon - (sector.floor.height - self.frame.view_z) * scale;

        let Some(back) = hit.through.map(|s| &level.sectors[s as usize]) else {
            // Solid wall: wall segment, then ceiling above and floor below.
            self.draw_wall(
                &hit,
                WallTexture::Middle,
                ceiling_screen.max(top_limit),
                floor_screen.min(bottom_limit),
                scale,
            );
            self.draw_ceiling(&hit, top_limit, ceiling_screen.min(bottom_limit));
            self.draw_floor(&hit, floor_screen.max(top_limit), bottom_limit);
            return;
        };

        // Portal: top and bottom steps, planes, then the far side through
        // the narrowed window.
        let top_step = (sector.ceiling.height - back.ceiling.height).max(0.0) * scale;
        let bottom_step = (back.floor.height - sector.floor.height).max(0.0) * scale;

        let top_start = ceiling_screen;
        let top_end = ceiling_screen + top_step;
        let bottom_end = floor_screen;
        let bottom_start = floor_screen - bottom_step;

        if top_step > 0.0 {
            self.draw_wall(
                &hit,
                WallTexture::Top,
                top_start.max(top_limit),
                top_end.min(bottom_limit),
                scale,
            );
        }
        if bottom_step > 0.0 {
            self.draw_wall(
                &hit,
                WallTexture::Bottom,
                bottom_start.max(top_limit),
                bottom_end.min(bottom_limit),
                scale,
            );
        }

        self.draw_ceiling(&hit, top_limit, top_start.min(bottom_limit));
        self.draw_floor(&hit, bottom_end.max(top_limit), bottom_limit);

        let new_top = top_end.clamp(top_limit, bottom_limit);
        let new_bottom = bottom_start.clamp(top_limit, bottom_limit);

        // A collapsed window or a zero-volume back sector finishes the
        // column; a degenerate back still gets its steps drawn above, which
        // is what closes it off visually.
        if new_top < new_bottom && !back.degenerate() {
            self.draw_from(index + 1, new_top, new_bottom);
        }

        // Transparent middle overlay, drawn over the far side on unwind.
        let line = &level.linedefs[hit.line as usize];
        if line
            .side(hit.side)
            .and_then(|s| s.texture(WallTexture::Middle))
            .is_some()
        {
            self.draw_wall(&hit, WallTexture::Middle, new_top, new_bottom, scale);
        }
    }
}

/// Fraction of `ray` covered by `offset`, projected on the dominant axis.
#[inline]
fn project_ray_fraction(ray: Vec2, offset: Vec2) -> f32 {
    if ray.x.abs() > ray.y.abs() {
        offset.x / ray.x
    } else if ray.y != 0.0 {
        offset.y / ray.y
    } else {
        0.0
    }
}
