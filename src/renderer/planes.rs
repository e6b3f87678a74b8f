//! Perspective-correct floor and ceiling drawing.

use glam::{Vec2, Vec3};

use crate::renderer::column::{Column, Hit};
use crate::renderer::lighting;
use crate::texture::CoordMapping;

/// World distance per mip level when sampling flats.
const MIP_DISTANCE: f32 = 512.0;
const MAX_MIP: u8 = 7;

#[inline]
fn mip_level(distance: f32) -> u8 {
    ((distance / MIP_DISTANCE) as u32).min(MAX_MIP as u32) as u8
}

impl Column<'_, '_> {
    /// Fill `[from, to)` with the hit sector's floor.
    pub(crate) fn draw_floor(&mut self, hit: &Hit, from: f32, to: f32) {
        let frame = self.frame();
        let level = frame.level;
        let sector = &level.sectors[hit.sector as usize];

        // At or below the floor plane its top face is invisible.
        if frame.view_z <= sector.floor.height {
            return;
        }
        let Some(texture) = sector.floor.texture else {
            return;
        };

        let y0 = from.max(0.0) as u32;
        let y1 = to.min(frame.height as f32).max(0.0) as u32;
        if y0 >= y1 {
            return;
        }

        let height = sector.floor.height;
        let distance_scale = (frame.view_z - height) * frame.unit_size * self.theta_inv();
        let horizon = frame.horizon as i32;

        for y in y0..y1 {
            let row = ((y as i32 - horizon).max(0) as usize).min(frame.depth_values.len() - 1);
            let distance = distance_scale * frame.depth_values[row];
            self.plane_pixel(hit, y, distance, height, texture, sector.brightness, true);
        }
    }

    /// Fill `[from, to)` with the hit sector's ceiling, or sky when the
    /// sector has no ceiling texture.
    pub(crate) fn draw_ceiling(&mut self, hit: &Hit, from: f32, to: f32) {
        let frame = self.frame();
        let level = frame.level;
        let sector = &level.sectors[hit.sector as usize];

        let Some(texture) = sector.ceiling.texture else {
            self.draw_sky(from, to);
            return;
        };
        if frame.view_z >= sector.ceiling.height {
            return;
        }

        let y0 = from.max(0.0) as u32;
        let y1 = to.min(frame.height as f32).max(0.0) as u32;
        if y0 >= y1 {
            return;
        }

        let height = sector.ceiling.height;
        let distance_scale = (height - frame.view_z) * frame.unit_size * self.theta_inv();
        let horizon = frame.horizon as i32;

        for y in y0..y1 {
            // Depth rows count upward from the horizon for ceilings.
            let row = ((horizon - 1 - y as i32).max(0) as usize)
                .min(frame.depth_values.len() - 1);
            let distance = distance_scale * frame.depth_values[row];
            self.plane_pixel(hit, y, distance, height, texture, sector.brightness, false);
        }
    }

    /// Sample and light one flat pixel at depth `distance` on row `y`.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    fn plane_pixel(
        &mut self,
        hit: &Hit,
        y: u32,
        distance: f32,
        height: f32,
        texture: crate::texture::TextureRef,
        brightness: f32,
        is_floor: bool,
    ) {
        let frame = self.frame();
        let level = frame.level;

        // World position: blend from the eye towards the wall hit by the
        // fraction of the hit distance this row reaches.
        let blend = (distance * hit.point_dist_inv).min(1.0);
        let wx = frame.position.x + (hit.point.x - frame.position.x) * blend;
        let wy = frame.position.y + (hit.point.y - frame.position.y) * blend;

        let Some(rgb) =
            frame
                .sampler
                .sample(texture, wx, wy, CoordMapping::Scaled, mip_level(distance))
        else {
            return;
        };

        let lights = level.cache.cell_at(Vec2::new(wx, wy)).map(|c| &c.lights);
        let sample = Vec3::new(wx, wy, height);
        let value = lighting::horizontal_surface_light(
            level, lights, brightness, sample, height, is_floor,
        );
        let value = (value - lighting::attenuation(distance)).max(0.0);
        self.put_pixel(y, lighting::shade(rgb, value));
    }
}
