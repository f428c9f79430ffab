pub mod design_rules;
pub mod manufacturer;
pub mod net_class;

use thiserror::Error;

pub use design_rules::{DesignRules, NetClassRules, NetRules};
pub use manufacturer::{ManufacturerProfile, RelaxationTier, relaxation_tiers};
pub use net_class::{NetClass, NetClassMap, create_net_class_map};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: String, value: f64 },
    #[error("via diameter {diameter}mm must exceed its drill {drill}mm")]
    ViaRing { diameter: f64, drill: f64 },
    #[error(
        "grid resolution {grid}mm is coarser than the clearance {clearance}mm; obstacles cannot separate adjacent cells"
    )]
    GridTooCoarse { grid: f64, clearance: f64 },
    #[error("grid resolution {grid}mm exceeds clearance/2 ({half}mm); use a grid of {half}mm or finer")]
    GridAboveHalfClearance { grid: f64, half: f64 },
    #[error("unknown manufacturer `{0}`")]
    UnknownManufacturer(String),
}
