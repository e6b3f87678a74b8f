//! In-memory level representation.
//!
//! Linedefs reference two sectors, sectors reference lists of linedefs and
//! linedefs reference vertices; the cycles are broken with arena storage and
//! integer indices into the per-level arrays, so a [`Level`] is plainly
//! movable and has no interior pointers.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::texture::TextureRef;
use crate::world::map_cache::MapCache;

pub type VertexId = u32;
pub type LinedefId = u32;
pub type SectorId = u32;
pub type LightId = u32;

/// Hard cap on lights per level.
pub const MAX_LIGHTS: usize = 64;

/// Bounded light list length per surface (wall segment, cache cell).
/// Overflow drops additional lights silently.
pub const MAX_SURFACE_LIGHTS: usize = 4;

/// Wall segment subdivision length in world units.  Long linedefs are split
/// into `ceil(length / SEGMENT_LENGTH)` segments so that a light only has to
/// be considered by the part of the wall it can actually reach.
pub const SEGMENT_LENGTH: f32 = 128.0;

pub type SurfaceLights = SmallVec<[LightId; MAX_SURFACE_LIGHTS]>;

/// Append `light` to a bounded surface list.  Returns `false` when the light
/// was dropped because the list is full.
#[inline]
pub(crate) fn push_surface_light(lights: &mut SurfaceLights, light: LightId) -> bool {
    if lights.len() >= MAX_SURFACE_LIGHTS {
        return false;
    }
    lights.push(light);
    true
}

/*--------------------------- vertices -------------------------------*/

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub point: Vec2,
}

/*------------------------ bounding boxes ----------------------------*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn of_segment(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x < self.max.x && p.y < self.max.y
    }
}

/*--------------------------- linedefs -------------------------------*/

/// Index into a side's texture triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WallTexture {
    Top = 0,
    Middle = 1,
    Bottom = 2,
}

/// The two half-spaces of a linedef.  The front side always exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineSide {
    Front,
    Back,
}

/// One light-bucketed subdivision of a linedef side.
#[derive(Clone, Debug)]
pub struct LineSegment {
    pub p0: Vec2,
    pub p1: Vec2,
    pub lights: SurfaceLights,
}

impl LineSegment {
    #[inline]
    pub fn midpoint(&self) -> Vec2 {
        (self.p0 + self.p1) * 0.5
    }
}

/// One side of a linedef: the sector it faces and its wall textures.
#[derive(Clone, Debug)]
pub struct Side {
    pub sector: SectorId,
    /// Top / middle / bottom, indexed by [`WallTexture`].
    pub textures: [Option<TextureRef>; 3],
    /// Materialized when the side is bound to its sector.
    pub segments: Vec<LineSegment>,
}

impl Side {
    pub fn new(sector: SectorId, textures: [Option<TextureRef>; 3]) -> Self {
        Self {
            sector,
            textures,
            segments: Vec::new(),
        }
    }

    #[inline]
    pub fn texture(&self, which: WallTexture) -> Option<TextureRef> {
        self.textures[which as usize]
    }

    /// Split the side into `count` equal segments along `p0 -> p1`.
    pub fn materialize_segments(&mut self, p0: Vec2, p1: Vec2, count: u32) {
        let count = count.max(1);
        self.segments.clear();
        self.segments.reserve(count as usize);
        let step = (p1 - p0) / count as f32;
        for i in 0..count {
            self.segments.push(LineSegment {
                p0: p0 + step * i as f32,
                p1: p0 + step * (i + 1) as f32,
                lights: SurfaceLights::new(),
            });
        }
    }
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub v0: VertexId,
    pub v1: VertexId,
    pub front: Side,
    pub back: Option<Side>,
    /// `v1 - v0`, cached for the intersection inner loops.
    pub direction: Vec2,
    pub length: f32,
    pub bounds: Aabb,
    pub segment_count: u32,
    /// Derived opening of the line: highest floor and lowest ceiling of the
    /// two sides.  One-sided lines keep a zero-anchored pseudo-opening so the
    /// map cache's early-reject never skips them.
    pub max_floor: f32,
    pub min_ceiling: f32,
}

impl Linedef {
    #[inline]
    pub fn two_sided(&self) -> bool {
        self.back.is_some()
    }

    #[inline]
    pub fn side(&self, which: LineSide) -> Option<&Side> {
        match which {
            LineSide::Front => Some(&self.front),
            LineSide::Back => self.back.as_ref(),
        }
    }

    #[inline]
    pub fn sector(&self, which: LineSide) -> Option<SectorId> {
        self.side(which).map(|s| s.sector)
    }

    /// Which side of the line `sector` occupies.  `sector` must reference
    /// this linedef; unknown sectors resolve to the front.
    #[inline]
    pub fn side_of(&self, sector: SectorId) -> LineSide {
        match &self.back {
            Some(back) if back.sector == sector => LineSide::Back,
            _ => LineSide::Front,
        }
    }

    /// Sector on the other side of the line, seen from `from`.
    #[inline]
    pub fn sector_behind(&self, from: SectorId) -> Option<SectorId> {
        if self.front.sector == from {
            self.back.as_ref().map(|s| s.sector)
        } else {
            Some(self.front.sector)
        }
    }

    #[inline]
    pub fn touches(&self, v: VertexId) -> bool {
        self.v0 == v || self.v1 == v
    }

    /// Does this linedef run between `a` and `b` (either direction)?
    #[inline]
    pub fn connects(&self, a: VertexId, b: VertexId) -> bool {
        (self.v0 == a && self.v1 == b) || (self.v0 == b && self.v1 == a)
    }

    /// Re-derive `max_floor` / `min_ceiling` from the sides' sectors.
    pub fn update_floor_ceiling_limits(&mut self, sectors: &[Sector]) {
        let front = &sectors[self.front.sector as usize];
        let (back_floor, back_ceiling) = match &self.back {
            Some(side) => {
                let back = &sectors[side.sector as usize];
                (back.floor.height, back.ceiling.height)
            }
            None => (0.0, 0.0),
        };
        self.max_floor = front.floor.height.max(back_floor);
        self.min_ceiling = front.ceiling.height.min(back_ceiling);
    }
}

/*---------------------------- sectors -------------------------------*/

/// Floor or ceiling record of a sector.  Flat lighting is evaluated per
/// pixel from the cache cell under the sample, so the record carries no
/// light list of its own.
#[derive(Clone, Debug)]
pub struct SectorPlane {
    pub height: f32,
    pub texture: Option<TextureRef>,
}

impl SectorPlane {
    pub fn new(height: f32, texture: Option<TextureRef>) -> Self {
        Self { height, texture }
    }
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor: SectorPlane,
    pub ceiling: SectorPlane,
    /// Ambient light level, `0.0 ..= 1.0` and above.
    pub brightness: f32,
    pub linedefs: Vec<LinedefId>,
    /// Subset of `linedefs` refreshed by the renderer's visibility pre-pass.
    pub visible_linedefs: Vec<LinedefId>,
    /// Tick of the last pre-pass visit; a sector is traversed at most once
    /// per tick.
    pub visited_tick: u32,
}

impl Sector {
    pub fn new(floor: SectorPlane, ceiling: SectorPlane, brightness: f32) -> Self {
        Self {
            floor,
            ceiling,
            brightness,
            linedefs: Vec::new(),
            visible_linedefs: Vec::new(),
            visited_tick: 0,
        }
    }

    /// Floor meets ceiling: the sector has no interior volume and is treated
    /// as solid by the renderer.
    #[inline]
    pub fn degenerate(&self) -> bool {
        self.floor.height == self.ceiling.height
    }
}

/*---------------------------- lights --------------------------------*/

#[derive(Clone, Debug)]
pub struct Light {
    pub position: Vec3,
    pub radius: f32,
    pub radius_sq: f32,
    pub radius_sq_inv: f32,
    pub strength: f32,
}

impl Light {
    pub fn new(position: Vec3, radius: f32, strength: f32) -> Self {
        let radius_sq = radius * radius;
        Self {
            position,
            radius,
            radius_sq,
            radius_sq_inv: 1.0 / radius_sq,
            strength,
        }
    }
}

/*----------------------------- level --------------------------------*/

/// Owning container for a built map.
#[derive(Debug, Default)]
pub struct Level {
    pub vertices: Vec<Vertex>,
    pub linedefs: Vec<Linedef>,
    pub sectors: Vec<Sector>,
    pub lights: Vec<Light>,
    /// World-space bounds, grown by every vertex insertion.
    pub min: Vec2,
    pub max: Vec2,
    pub cache: MapCache,
    /// Sampled wherever a sector has no ceiling texture.
    pub sky_texture: Option<TextureRef>,
    /// Lights dropped from full surface lists during the last
    /// [`Level::update_lights`].  Diagnostic only.
    pub light_overflows: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn segments_split_evenly() {
        let mut side = Side::new(0, [None; 3]);
        side.materialize_segments(vec2(0.0, 0.0), vec2(300.0, 0.0), 3);
        assert_eq!(side.segments.len(), 3);
        assert!((side.segments[1].p0 - vec2(100.0, 0.0)).length() < 1e-4);
        assert!((side.segments[2].p1 - vec2(300.0, 0.0)).length() < 1e-4);
        assert!((side.segments[0].midpoint() - vec2(50.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn surface_light_list_is_bounded() {
        let mut lights = SurfaceLights::new();
        for id in 0..MAX_SURFACE_LIGHTS as LightId {
            assert!(push_surface_light(&mut lights, id));
        }
        assert!(!push_surface_light(&mut lights, 99));
        assert_eq!(lights.len(), MAX_SURFACE_LIGHTS);
    }

    #[test]
    fn side_resolution_from_sector() {
        let mut line = Linedef {
            v0: 0,
            v1: 1,
            front: Side::new(7, [None; 3]),
            back: None,
            direction: vec2(1.0, 0.0),
            length: 1.0,
            bounds: Aabb::of_segment(vec2(0.0, 0.0), vec2(1.0, 0.0)),
            segment_count: 1,
            max_floor: 0.0,
            min_ceiling: 0.0,
        };
        assert_eq!(line.side_of(7), LineSide::Front);
        assert_eq!(line.sector_behind(7), None);

        line.back = Some(Side::new(3, [None; 3]));
        assert_eq!(line.side_of(3), LineSide::Back);
        assert_eq!(line.sector_behind(7), Some(3));
        assert_eq!(line.sector_behind(3), Some(7));
    }
}
