//! Vertical wall segment drawing.

use glam::Vec3;

use crate::renderer::column::{Column, Hit};
use crate::renderer::lighting;
use crate::texture::CoordMapping;
use crate::world::WallTexture;

impl Column<'_, '_> {
    /// Draw one textured wall run in `[from, to)` screen rows.
    ///
    /// The horizontal texture coordinate is constant down the column
    /// (`line_t * length`); the vertical coordinate advances by
    /// `planar_distance / unit_size` world units per pixel, anchored so that
    /// world `z = 0` maps to texture `v = 0`.
    pub(crate) fn draw_wall(
        &mut self,
        hit: &Hit,
        which: WallTexture,
        from: f32,
        to: f32,
        scale: f32,
    ) {
        let frame = self.frame();
        let level = frame.level;
        let line = &level.linedefs[hit.line as usize];
        let Some(side) = line.side(hit.side) else {
            return;
        };
        let Some(texture) = side.texture(which) else {
            return;
        };

        let y0 = from.max(0.0) as u32;
        let y1 = to.min(frame.height as f32).max(0.0) as u32;
        if y0 >= y1 {
            return;
        }

        let step = hit.planar / frame.unit_size;
        let u = hit.line_t * line.length;
        let mut v = (y0 as f32 - frame.horizon - frame.view_z * scale) * step;

        // Light bucket for this column: the segment under the hit point.
        let segment = {
            let index = ((hit.line_t * side.segments.len() as f32) as usize)
                .min(side.segments.len().saturating_sub(1));
            side.segments.get(index)
        };
        let brightness = level.sectors[hit.sector as usize].brightness;

        let mut world_z = frame.view_z + (frame.horizon - y0 as f32) * step;

        for y in y0..y1 {
            if let Some(rgb) = frame.sampler.sample(texture, u, v, CoordMapping::Scaled, 0) {
                let sample = Vec3::new(hit.point.x, hit.point.y, world_z);
                let value = match segment {
                    Some(segment) => lighting::vertical_surface_light(
                        level,
                        &segment.lights,
                        brightness,
                        sample,
                    ),
                    None => brightness,
                };
                let value = (value - hit.dim).max(0.0);
                self.put_pixel(y, lighting::shade(rgb, value));
            }
            v += step;
            world_z -= step;
        }
    }
}
