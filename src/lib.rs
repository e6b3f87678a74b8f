//! CPU-only software renderer for 2.5D sector worlds.
//!
//! A world is a planar subdivision into sectors (flat-floored, flat-ceilinged
//! polygons) connected through shared edges that act as portals.  The
//! [`builder::MapBuilder`] turns an ordered polygon soup into a [`world::Level`],
//! and [`renderer::Renderer`] casts one ray per screen column through the
//! portal graph to produce a perspective image.

pub mod builder;
pub mod math;
pub mod renderer;
pub mod texture;
pub mod world;
