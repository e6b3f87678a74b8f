//! Interactive viewer for the sector renderer.
//!
//! ```bash
//! cargo run --release -- --level 1
//! ```
//!
//! The viewer owns everything the library treats as external: the window and
//! input (minifb), a procedural texture sampler and the demo levels.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use glam::{uvec2, vec2, vec3};
use minifb::{Key, Window, WindowOptions};

use sectorcast::builder::MapBuilder;
use sectorcast::renderer::Renderer;
use sectorcast::texture::{map_normalized, map_scaled, CoordMapping, Rgb, TextureRef, TextureSampler};
use sectorcast::world::{Camera, Level};

const TEX_BRICK: TextureRef = 1;
const TEX_FLOOR: TextureRef = 2;
const TEX_CEILING: TextureRef = 3;
const TEX_STONE: TextureRef = 4;
const TEX_SKY: TextureRef = 10;

#[derive(Parser)]
#[command(about = "Sector/portal software renderer demo")]
struct Args {
    /// Demo level: 0 = random grid, 1 = hand-built rooms
    #[arg(short, long, default_value_t = 0)]
    level: usize,

    /// Window width in pixels
    #[arg(long, default_value_t = 1024)]
    width: usize,

    /// Window height in pixels
    #[arg(long, default_value_t = 768)]
    height: usize,

    /// Render-buffer downscale factor
    #[arg(short, long, default_value_t = 2)]
    scale: usize,

    /// Seed for the random grid level
    #[arg(long, default_value_t = 1337)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let scale = args.scale.max(1);

    let mut level = match args.level {
        1 => demo_rooms(),
        _ => grid_level(args.seed),
    };
    level.sky_texture = Some(TEX_SKY);

    let mut camera = Camera::new(&level, vec2(200.0, 200.0), 64.0);
    let mut renderer = Renderer::new(uvec2(
        (args.width / scale) as u32,
        (args.height / scale) as u32,
    ));
    let sampler = DemoSampler;

    let mut window = Window::new(
        "sectorcast",
        args.width,
        args.height,
        WindowOptions::default(),
    )?;

    let mut last = Instant::now();
    let mut title_timer = 0.0f32;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let dt = last.elapsed().as_secs_f32();
        last = Instant::now();

        if window.is_key_down(Key::W) {
            camera.advance(&level, 400.0 * dt);
        }
        if window.is_key_down(Key::S) {
            camera.advance(&level, -400.0 * dt);
        }
        if window.is_key_down(Key::A) {
            camera.rotate(2.0 * dt);
        }
        if window.is_key_down(Key::D) {
            camera.rotate(-2.0 * dt);
        }
        if window.is_key_down(Key::Q) {
            camera.z += 88.0 * dt;
        }
        if window.is_key_down(Key::Z) {
            camera.z -= 88.0 * dt;
        }
        if window.is_key_down(Key::R) {
            camera.pitch += 120.0 * dt;
        }
        if window.is_key_down(Key::F) {
            camera.pitch -= 120.0 * dt;
        }
        if window.is_key_down(Key::P) {
            camera.set_fov((camera.fov * (1.0 - 3.0 * dt)).max(0.1));
        }
        if window.is_key_down(Key::O) {
            camera.set_fov((camera.fov * (1.0 + 3.0 * dt)).min(4.0));
        }

        renderer.draw(&mut level, &camera, &sampler);

        title_timer += dt;
        if title_timer >= 0.25 {
            let stats = renderer.stats();
            let size = renderer.size();
            window.set_title(&format!(
                "sectorcast  {}x{} @ {:.0} fps  sectors/col: {}",
                size.x,
                size.y,
                1.0 / dt.max(1e-6),
                stats.sectors_visited,
            ));
            title_timer = 0.0;
        }

        let size = renderer.size();
        window.update_with_buffer(renderer.buffer(), size.x as usize, size.y as usize)?;
    }

    Ok(())
}

/*------------------------- demo levels ------------------------------*/

/// Hand-built set of connected rooms exercising portals, steps, a floating
/// inner sector and an open-sky yard.
fn demo_rooms() -> Level {
    let mut builder = MapBuilder::new();

    builder.add_polygon(
        0.0,
        144.0,
        0.7,
        Some(TEX_BRICK),
        Some(TEX_FLOOR),
        Some(TEX_CEILING),
        vec![
            vec2(0.0, 0.0),
            vec2(400.0, 0.0),
            vec2(400.0, 400.0),
            vec2(200.0, 300.0),
            vec2(0.0, 400.0),
        ],
    );
    builder.add_polygon(
        -32.0,
        160.0,
        0.55,
        Some(TEX_STONE),
        Some(TEX_FLOOR),
        Some(TEX_CEILING),
        vec![
            vec2(50.0, 50.0),
            vec2(50.0, 200.0),
            vec2(200.0, 200.0),
            vec2(200.0, 50.0),
        ],
    );
    // A closed pillar: floor meets ceiling.
    builder.add_polygon(
        128.0,
        128.0,
        0.5,
        Some(TEX_STONE),
        None,
        None,
        vec![
            vec2(100.0, 100.0),
            vec2(125.0, 100.0),
            vec2(125.0, 125.0),
            vec2(100.0, 125.0),
        ],
    );
    builder.add_polygon(
        32.0,
        96.0,
        0.6,
        Some(TEX_BRICK),
        Some(TEX_FLOOR),
        Some(TEX_CEILING),
        vec![
            vec2(0.0, 0.0),
            vec2(400.0, 0.0),
            vec2(300.0, -200.0),
            vec2(0.0, -100.0),
        ],
    );
    // Sky yard: no ceiling texture.
    builder.add_polygon(
        -128.0,
        256.0,
        0.8,
        Some(TEX_BRICK),
        Some(TEX_FLOOR),
        None,
        vec![
            vec2(400.0, 400.0),
            vec2(200.0, 300.0),
            vec2(100.0, 1000.0),
            vec2(500.0, 1000.0),
        ],
    );
    builder.add_polygon(
        0.0,
        224.0,
        0.5,
        Some(TEX_STONE),
        Some(TEX_FLOOR),
        Some(TEX_CEILING),
        vec![
            vec2(275.0, 500.0),
            vec2(325.0, 500.0),
            vec2(325.0, 700.0),
            vec2(275.0, 700.0),
        ],
    );

    let mut level = builder.build();
    level.add_light(vec3(300.0, 120.0, 100.0), 260.0, 1.2);
    level.add_light(vec3(120.0, 120.0, 96.0), 180.0, 0.9);
    level.add_light(vec3(300.0, 700.0, 120.0), 400.0, 1.0);
    level
}

/// Random grid of adjoining rooms with varying floor and ceiling heights and
/// the occasional solid pillar.
fn grid_level(seed: u64) -> Level {
    const W: i32 = 16;
    const H: i32 = 16;
    const SIZE: f32 = 256.0;

    let mut rng = Lcg::new(seed);
    let mut builder = MapBuilder::new();

    for y in 0..H {
        for x in 0..W {
            let (floor, ceiling) = if rng.next_below(20) == 5 {
                (0.0, 0.0)
            } else {
                (
                    8.0 * rng.next_below(16) as f32,
                    1024.0 - 32.0 * rng.next_below(24) as f32,
                )
            };

            let x0 = x as f32 * SIZE;
            let y0 = y as f32 * SIZE;
            builder.add_polygon(
                floor,
                ceiling,
                0.4 + 0.03 * rng.next_below(10) as f32,
                Some(TEX_BRICK),
                Some(TEX_FLOOR),
                if rng.next_below(4) == 0 { None } else { Some(TEX_CEILING) },
                vec![
                    vec2(x0, y0),
                    vec2(x0 + SIZE, y0),
                    vec2(x0 + SIZE, y0 + SIZE),
                    vec2(x0, y0 + SIZE),
                ],
            );
        }
    }

    let mut level = builder.build();
    for _ in 0..24 {
        let x = rng.next_below((W as u64 * SIZE as u64) as u32) as f32;
        let y = rng.next_below((H as u64 * SIZE as u64) as u32) as f32;
        level.add_light(vec3(x, y, 96.0), 300.0, 1.1);
    }
    level
}

/// Tiny deterministic generator so the grid level is reproducible per seed.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        self.next() % bound.max(1)
    }
}

/*---------------------- procedural textures -------------------------*/

/// Stand-in for a real asset pipeline: a few procedural patterns keyed by
/// texture id.
struct DemoSampler;

impl TextureSampler for DemoSampler {
    fn sample(
        &self,
        texture: TextureRef,
        x: f32,
        y: f32,
        mapping: CoordMapping,
        mip: u8,
    ) -> Option<Rgb> {
        let (tx, ty) = match mapping {
            CoordMapping::Scaled => (map_scaled(x, 64), map_scaled(y, 64)),
            CoordMapping::Normalized => (map_normalized(x, 64), map_normalized(y, 64)),
        };
        // Coarser pattern at distance stands in for real mip chains.
        let (tx, ty) = (tx >> mip.min(3), ty >> mip.min(3));

        let rgb = match texture {
            TEX_BRICK => {
                let row = ty / 8;
                let offset = if row % 2 == 0 { 0 } else { 8 };
                let mortar = ty % 8 == 0 || (tx + offset) % 16 == 0;
                if mortar {
                    [120, 110, 100]
                } else {
                    [150 + ((tx * 7 + ty * 13) % 24) as u8, 70, 54]
                }
            }
            TEX_FLOOR => {
                if (tx / 16 + ty / 16) % 2 == 0 {
                    [88, 96, 88]
                } else {
                    [62, 70, 66]
                }
            }
            TEX_CEILING => {
                if tx % 16 < 2 || ty % 16 < 2 {
                    [44, 44, 52]
                } else {
                    [74, 74, 86]
                }
            }
            TEX_STONE => {
                let n = (tx * 31 + ty * 17) % 32;
                let base = 96 + n as u8;
                [base, base, base.saturating_sub(10)]
            }
            TEX_SKY => {
                let band = 140u8.saturating_sub((ty * 2) as u8);
                [band / 2, band / 2 + 40, 160]
            }
            _ => [tx as u8, 0, ty as u8],
        };
        Some(rgb)
    }
}
