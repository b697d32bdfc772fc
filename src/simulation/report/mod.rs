//! Per-frame reports: flat `f32` arrays, slot 0 = kind tag
//!
//! World and collision reports carry a `[kind, count]` header and grow in
//! chunks. Vehicle and constraint reports carry only `[kind]`; they are sized
//! exactly to the number of entries and trailing unused entries hold `-1` in
//! their id slot. The soft report is sized exactly every frame.

mod encode;
pub mod decode;

pub(crate) use encode::Reports;

pub const WORLD_REPORT: u8 = 0;
pub const COLLISION_REPORT: u8 = 1;
pub const VEHICLE_REPORT: u8 = 2;
pub const CONSTRAINT_REPORT: u8 = 3;
pub const SOFT_REPORT: u8 = 4;

pub const WORLD_ITEM_SIZE: usize = 14;
pub const COLLISION_ITEM_SIZE: usize = 5;
pub const VEHICLE_ITEM_SIZE: usize = 9;
pub const CONSTRAINT_ITEM_SIZE: usize = 6;

/// `[kind, count]`
pub const COUNTED_HEADER: usize = 2;
/// `[kind]`
pub const TAGGED_HEADER: usize = 1;

/// Marks an unused vehicle/constraint entry
pub const UNUSED_ENTRY: f32 = -1.0;
