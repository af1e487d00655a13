//! Plot geometry and frame composition.

pub mod mapper;
pub mod scene;

pub use mapper::CanvasGeometry;
pub use scene::draw_graph;
