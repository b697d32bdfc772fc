//! Core building blocks: math types, the slot arena and report buffers

#[macro_use]
pub mod utils;
pub mod math;
pub mod report_buffer;
pub mod slots;

pub use math::{Quat, Transform, Vec3};
pub use report_buffer::ReportBuffer;
pub use slots::Slots;
