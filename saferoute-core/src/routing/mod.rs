//! Route search over built graphs: vertex snapping, weighted shortest-path
//! search and result assembly.

pub mod astar;
pub mod locator;
pub mod route;

pub use astar::astar_path;
pub use locator::{LinearLocator, NodeLocator, RtreeLocator};
pub use route::{RouteResult, assemble_route};
