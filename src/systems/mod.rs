//! Registries owning every kernel handle the worker creates

pub mod constraints;
pub mod objects;
pub mod shape_cache;
pub mod vehicles;

pub use constraints::{Constraint, ConstraintKind, ConstraintRegistry};
pub use objects::{Body, BodyKind, ObjectRegistry, SoftShape};
pub use shape_cache::ShapeCache;
pub use vehicles::{Vehicle, VehicleRegistry};
