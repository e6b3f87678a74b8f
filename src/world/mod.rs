mod camera;
mod geometry;
mod level;
pub mod map_cache;

pub use camera::Camera;

pub use geometry::{
    Aabb, Level, Light, LightId, LineSegment, LineSide, Linedef, LinedefId, Sector, SectorId,
    SectorPlane, Side, SurfaceLights, Vertex, VertexId, WallTexture, MAX_LIGHTS,
    MAX_SURFACE_LIGHTS, SEGMENT_LENGTH,
};

pub use level::VERTEX_SNAP;

pub use map_cache::{Cell, MapCache, CELL_SIZE};
