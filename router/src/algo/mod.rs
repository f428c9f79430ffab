pub mod astar;
pub mod backend;
pub mod cost;

pub use astar::{AStar, GuideOracle, NoGuide, Score, SearchParams, SearchRequest};
pub use backend::{BackendCapabilities, PathfindingBackend, detect_capabilities, select_backend};
pub use cost::{CostModel, HardCost, NegotiatedCost};
