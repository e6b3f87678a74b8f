//! Sky column drawing.
//!
//! The horizontal coordinate comes from the ray direction's angle (yaw is
//! already folded into the ray); pitch shifts the vertical sampling window
//! without changing the mapping.

use std::f32::consts::TAU;

use crate::renderer::column::Column;
use crate::renderer::lighting;
use crate::texture::CoordMapping;

impl Column<'_, '_> {
    /// Fill `[from, to)` with sky, if the level has a sky texture.
    pub(crate) fn draw_sky(&mut self, from: f32, to: f32) {
        let frame = self.frame();
        let Some(texture) = frame.level.sky_texture else {
            return;
        };

        let y0 = from.max(0.0) as u32;
        let y1 = to.min(frame.height as f32).max(0.0) as u32;
        if y0 >= y1 {
            return;
        }

        let ray = self.ray_dir();
        let sky_x = (ray.x.atan2(ray.y) / TAU).rem_euclid(1.0);

        for y in y0..y1 {
            let sky_y = (0.5 + (y as f32 - frame.pitch) / frame.height as f32).clamp(0.0, 1.0);
            if let Some(rgb) =
                frame
                    .sampler
                    .sample(texture, sky_x, sky_y, CoordMapping::Normalized, 0)
            {
                // Full brightness, no distance attenuation.
                self.put_pixel(y, lighting::shade(rgb, 1.0));
            }
        }
    }
}
