//! Per-column portal renderer.
//!
//! Each frame casts one ray per screen column, walks the portal graph
//! collecting ray/linedef intersections sorted by distance from the camera
//! plane, and draws wall, floor, ceiling and sky segments into a tightly
//! packed `0xAARRGGBB` buffer.  Columns are independent; with the `parallel`
//! feature they are rendered across threads, each writing its own strided
//! slice of the buffer.

mod column;
mod lighting;
mod planes;
mod sky;
#[cfg_attr(not(feature = "sector-visibility"), allow(dead_code))]
mod visibility;
mod walls;

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{UVec2, Vec2};

use crate::texture::TextureSampler;
use crate::world::{Camera, Level, SectorId};

use column::Column;

/// `0xAARRGGBB`, alpha always `0xFF` for written pixels.
pub type Pixel = u32;

/// Far extent of a column's ray in world units.
pub const DRAW_DISTANCE: f32 = 12000.0;

/// Point distance at which attenuation reaches full darkness.
pub const DIMMING_DISTANCE: f32 = 3000.0;

/// Bucket count of the quantized attenuation mode.
#[cfg(feature = "quantized-lighting")]
pub const LIGHT_STEPS: u32 = 16;

/// A light closer than this to a floor or ceiling plane fades out instead of
/// slicing through it.
pub const VERTICAL_FADE_DISTANCE: f32 = 64.0;

/// Hard cap on ray/line intersections recorded per column.
pub const MAX_COLUMN_INTERSECTIONS: usize = 48;

/// Hard cap on sectors traversed per column.
pub const MAX_SECTOR_HISTORY: usize = 64;

/// Per-pixel single-step hook: `(buffer, column, row)` after every write.
/// Serial rendering only; the parallel mode ignores it.
pub type StepHook = Box<dyn FnMut(&[Pixel], u32, u32)>;

/*------------------------- frame counters ---------------------------*/

/// Diagnostic tallies accumulated over one frame.
#[derive(Default)]
pub(crate) struct Counters {
    pub sectors_visited: AtomicU32,
    pub line_checks: AtomicU32,
    pub visible_lines: AtomicU32,
    pub vertex_checks: AtomicU32,
    pub visible_vertices: AtomicU32,
}

impl Counters {
    fn reset(&self) {
        self.sectors_visited.store(0, Ordering::Relaxed);
        self.line_checks.store(0, Ordering::Relaxed);
        self.visible_lines.store(0, Ordering::Relaxed);
        self.vertex_checks.store(0, Ordering::Relaxed);
        self.visible_vertices.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of [`Counters`] for the caller's debug overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sectors_visited: u32,
    pub line_checks: u32,
    pub visible_lines: u32,
    pub vertex_checks: u32,
    pub visible_vertices: u32,
}

/*-------------------------- frame buffer ----------------------------*/

/// Shared handle to the frame buffer for the column writers.
///
/// Columns stride the row-major buffer, so parallel tasks cannot hand out
/// disjoint `&mut` slices; writes go through a raw pointer instead.
#[derive(Clone, Copy)]
pub(crate) struct FrameBuffer {
    ptr: *mut Pixel,
    len: usize,
    width: u32,
}

// SAFETY: every rendering task writes only pixels of its own column x, and
// the buffer outlives the frame; no two tasks touch the same word.
unsafe impl Send for FrameBuffer {}
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    #[inline(always)]
    pub(crate) fn write(&self, x: u32, y: u32, value: Pixel) {
        let index = (y * self.width + x) as usize;
        debug_assert!(index < self.len);
        // SAFETY: index is in bounds and exclusively owned by column x.
        unsafe { *self.ptr.add(index) = value };
    }

    /// Whole-buffer view for the single-step hook.
    ///
    /// # Safety
    /// Only valid while no other writer is active, i.e. in serial rendering.
    pub(crate) unsafe fn as_slice(&self) -> &[Pixel] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

/*------------------------- frame constants --------------------------*/

/// Read-only per-frame state shared by every column.
pub(crate) struct Frame<'a> {
    pub level: &'a Level,
    pub sampler: &'a dyn TextureSampler,
    pub width: u32,
    pub height: u32,
    /// Horizon row: buffer half-height shifted by the camera pitch.
    pub horizon: f32,
    /// Projection scale, `half_width / fov`.
    pub unit_size: f32,
    pub view_z: f32,
    pub position: Vec2,
    pub direction: Vec2,
    pub plane: Vec2,
    pub pitch: f32,
    pub in_sector: Option<SectorId>,
    pub tick: u32,
    /// `depth_values[k] = 1 / (k + 1)`, indexed by rows from the horizon.
    pub depth_values: &'a [f32],
    pub counters: &'a Counters,
    pub fb: FrameBuffer,
}

/*---------------------------- renderer ------------------------------*/

pub struct Renderer {
    buffer: Vec<Pixel>,
    size: UVec2,
    depth_values: Vec<f32>,
    tick: u32,
    counters: Counters,
    step_hook: Option<StepHook>,
    /// Per-vertex `(tick, visible)` scratch for the visibility pre-pass.
    #[cfg_attr(not(feature = "sector-visibility"), allow(dead_code))]
    vertex_vis: Vec<(u32, bool)>,
}

impl Renderer {
    pub fn new(size: UVec2) -> Self {
        let mut renderer = Self {
            buffer: Vec::new(),
            size: UVec2::ZERO,
            depth_values: Vec::new(),
            tick: 0,
            counters: Counters::default(),
            step_hook: None,
            vertex_vis: Vec::new(),
        };
        renderer.resize(size);
        renderer
    }

    pub fn resize(&mut self, size: UVec2) {
        self.size = size;
        self.buffer.clear();
        self.buffer.resize((size.x * size.y) as usize, 0);
        self.depth_values = (0..size.y).map(|k| 1.0 / (k + 1) as f32).collect();
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// The last drawn frame, `width * height` words, row-major.
    #[inline]
    pub fn buffer(&self) -> &[Pixel] {
        &self.buffer
    }

    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            sectors_visited: self.counters.sectors_visited.load(Ordering::Relaxed),
            line_checks: self.counters.line_checks.load(Ordering::Relaxed),
            visible_lines: self.counters.visible_lines.load(Ordering::Relaxed),
            vertex_checks: self.counters.vertex_checks.load(Ordering::Relaxed),
            visible_vertices: self.counters.visible_vertices.load(Ordering::Relaxed),
        }
    }

    /// Install or clear the per-pixel single-step hook.
    pub fn set_step_hook(&mut self, hook: Option<StepHook>) {
        self.step_hook = hook;
    }

    /// Render one frame.
    ///
    /// The level is only mutated by the visibility pre-pass; during column
    /// rendering it is read-only.
    pub fn draw(&mut self, level: &mut Level, camera: &Camera, sampler: &dyn TextureSampler) {
        self.tick = self.tick.wrapping_add(1);
        self.counters.reset();
        self.buffer.fill(0);

        let (width, height) = (self.size.x, self.size.y);
        if width == 0 || height == 0 {
            return;
        }

        #[cfg(feature = "sector-visibility")]
        if let Some(start) = camera.in_sector {
            self.vertex_vis.resize(level.vertices.len(), (0, false));
            visibility::refresh(
                level,
                start,
                camera,
                self.tick,
                &self.counters,
                &mut self.vertex_vis,
            );
        }

        let mut hook = self.step_hook.take();

        {
            let frame = Frame {
                level,
                sampler,
                width,
                height,
                horizon: (height / 2) as f32 + camera.pitch,
                unit_size: (width / 2) as f32 / camera.fov,
                view_z: camera.z,
                position: camera.position,
                direction: camera.direction,
                plane: camera.plane,
                pitch: camera.pitch,
                in_sector: camera.in_sector,
                tick: self.tick,
                depth_values: &self.depth_values,
                counters: &self.counters,
                fb: FrameBuffer {
                    ptr: self.buffer.as_mut_ptr(),
                    len: self.buffer.len(),
                    width,
                },
            };

            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                let _ = &mut hook; // single-step is a serial-only facility
                (0..width).into_par_iter().for_each(|x| {
                    Column::render(&frame, x, None);
                });
            }

            #[cfg(not(feature = "parallel"))]
            for x in 0..width {
                Column::render(&frame, x, hook.as_mut());
            }
        }

        self.step_hook = hook;
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MapBuilder;
    use crate::texture::CheckerSampler;
    use glam::{uvec2, vec2};

    fn demo_level() -> Level {
        let mut builder = MapBuilder::new();
        builder.add_polygon(
            0.0,
            128.0,
            1.0,
            Some(1),
            Some(2),
            Some(3),
            vec![
                vec2(0.0, 0.0),
                vec2(0.0, 400.0),
                vec2(400.0, 400.0),
                vec2(400.0, 0.0),
            ],
        );
        builder.add_polygon(
            16.0,
            112.0,
            0.8,
            Some(4),
            Some(5),
            Some(6),
            vec![
                vec2(400.0, 0.0),
                vec2(400.0, 400.0),
                vec2(700.0, 400.0),
                vec2(700.0, 0.0),
            ],
        );
        builder.build()
    }

    fn draw_once(level: &mut Level) -> Vec<Pixel> {
        let camera = Camera::new(level, vec2(200.0, 200.0), 64.0);
        let mut renderer = Renderer::new(uvec2(160, 120));
        renderer.draw(level, &camera, &CheckerSampler);
        renderer.buffer().to_vec()
    }

    #[test]
    fn written_pixels_are_opaque_argb() {
        let mut level = demo_level();
        let buffer = draw_once(&mut level);
        let written = buffer.iter().filter(|&&p| p != 0).count();
        assert!(written > 0, "camera inside a lit room must draw something");
        for &p in buffer.iter().filter(|&&p| p != 0) {
            assert_eq!(p & 0xFF00_0000, 0xFF00_0000);
        }
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn identical_frames_are_bit_identical() {
        let mut level = demo_level();
        let camera = Camera::new(&level, vec2(200.0, 200.0), 64.0);
        let mut renderer = Renderer::new(uvec2(160, 120));

        renderer.draw(&mut level, &camera, &CheckerSampler);
        let first = renderer.buffer().to_vec();
        renderer.draw(&mut level, &camera, &CheckerSampler);
        assert_eq!(first, renderer.buffer());
    }

    #[test]
    fn void_view_produces_black_columns() {
        let mut level = demo_level();
        // Outside of every sector: no column finds a starting sector.
        let mut camera = Camera::new(&level, vec2(-500.0, -500.0), 64.0);
        camera.in_sector = None;
        let mut renderer = Renderer::new(uvec2(64, 48));
        renderer.draw(&mut level, &camera, &CheckerSampler);
        assert!(renderer.buffer().iter().all(|&p| p == 0));
    }

    #[test]
    fn camera_at_floor_height_survives() {
        let mut level = demo_level();
        let camera = Camera::new(&level, vec2(200.0, 200.0), 0.0);
        let mut renderer = Renderer::new(uvec2(64, 48));
        renderer.draw(&mut level, &camera, &CheckerSampler);
        // Floor is exactly at eye height: the floor pass is empty but walls
        // and ceiling still land.
        assert!(renderer.buffer().iter().any(|&p| p != 0));
    }

    #[test]
    fn resize_rebuilds_buffer_and_depth_table() {
        let mut renderer = Renderer::new(uvec2(64, 48));
        renderer.resize(uvec2(32, 16));
        assert_eq!(renderer.buffer().len(), 32 * 16);
        assert_eq!(renderer.size(), uvec2(32, 16));

        let mut level = demo_level();
        let camera = Camera::new(&level, vec2(200.0, 200.0), 64.0);
        renderer.draw(&mut level, &camera, &CheckerSampler);
        assert!(renderer.buffer().iter().any(|&p| p != 0));
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn step_hook_sees_every_written_pixel() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut level = demo_level();
        let camera = Camera::new(&level, vec2(200.0, 200.0), 64.0);
        let mut renderer = Renderer::new(uvec2(32, 24));

        let count = Rc::new(RefCell::new(0u32));
        let seen = Rc::clone(&count);
        renderer.set_step_hook(Some(Box::new(move |_, _, _| {
            *seen.borrow_mut() += 1;
        })));

        renderer.draw(&mut level, &camera, &CheckerSampler);
        let written = renderer.buffer().iter().filter(|&&p| p != 0).count() as u32;
        assert_eq!(*count.borrow(), written);
    }
}
