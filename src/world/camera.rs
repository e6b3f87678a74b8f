//! View-point in world space.
//!
//! The camera keeps a direction vector and a perpendicular "plane" vector
//! scaled by the field of view; a screen column's ray is
//! `direction + plane * cam_x` with `cam_x` in `[-1, 1]`.  Pitch is a
//! vertical pixel shift of the horizon, not a rotation.

use glam::Vec2;

use crate::world::geometry::{Level, SectorId};

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec2,
    pub direction: Vec2,
    /// Perpendicular to `direction`, scaled by `fov`.
    pub plane: Vec2,
    pub fov: f32,
    /// Eye height in world units.
    pub z: f32,
    /// Horizon shift in pixels; positive looks up.
    pub pitch: f32,
    /// Sector the camera currently stands in, if any.
    pub in_sector: Option<SectorId>,
}

impl Camera {
    pub fn new(level: &Level, position: Vec2, z: f32) -> Self {
        let mut camera = Self {
            position,
            direction: Vec2::new(1.0, 0.0),
            plane: Vec2::ZERO,
            fov: 0.9,
            z,
            pitch: 0.0,
            in_sector: None,
        };
        camera.plane = camera.derive_plane();
        camera.in_sector = level.sector_at(position);
        camera
    }

    #[inline]
    fn derive_plane(&self) -> Vec2 {
        Vec2::new(self.direction.y, -self.direction.x) * self.fov
    }

    /// Move along the view direction and re-resolve the containing sector
    /// when the old one is left.  Outside every sector the last known sector
    /// is kept.
    pub fn advance(&mut self, level: &Level, distance: f32) {
        self.position += self.direction * distance;
        self.refresh_sector(level);
    }

    /// Rotate view direction and plane together, positive anti-clockwise.
    pub fn rotate(&mut self, rotation: f32) {
        let (sin, cos) = rotation.sin_cos();
        let dir = self.direction;
        self.direction = Vec2::new(dir.x * cos - dir.y * sin, dir.x * sin + dir.y * cos);
        let plane = self.plane;
        self.plane = Vec2::new(plane.x * cos - plane.y * sin, plane.x * sin + plane.y * cos);
    }

    /// Change the field of view; the plane vector is re-derived.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.plane = self.derive_plane();
    }

    /// Re-resolve `in_sector` after an external position change.
    pub fn refresh_sector(&mut self, level: &Level) {
        match self.in_sector {
            Some(sector) if level.sector_contains(sector, self.position) => {}
            _ => {
                if let Some(sector) = level.sector_at(self.position) {
                    self.in_sector = Some(sector);
                }
            }
        }
    }
}
