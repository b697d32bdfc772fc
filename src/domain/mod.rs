//! Controller-facing data: world configuration and parameter records

pub mod config;
pub mod descriptions;

pub use config::{BroadphaseConfig, WorldConfig, MAX_REPORT_CHUNK};
pub use descriptions::{
    ChildShapeDescription, ConstraintDescription, ObjectDescription, ShapeDescription,
    SoftMaterialDescription, VehicleDescription, VehicleTuning, WheelDescription,
};
