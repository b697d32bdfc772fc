//! Particula physics worker - command dispatch and binary reports for a physics kernel
//!
//! Architecture:
//! - core/        - math, slot arena, report buffers, logging
//! - domain/      - world config and controller parameter records
//! - kernel/      - the physics kernel contract (+ a headless reference kernel)
//! - systems/     - shape cache and object/constraint/vehicle registries
//! - simulation/  - worker core: commands, step loop, report encoders, wasm facade
//! - transport/   - outbound channel to the controller

// Utils with safety macros (must be first for macro export!)
#[macro_use]
pub mod core;
pub mod domain;
pub mod error;
pub mod kernel;
pub mod simulation;
pub mod systems;
pub mod transport;

use log::{info, LevelFilter};
use wasm_bindgen::prelude::*;

// Smaller binary when the feature is on
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

// Better error messages in debug mode
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize the worker: panic hook and console logging
#[wasm_bindgen]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    let level = if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info };
    crate::core::utils::logging::init_logging(level);
    info!("physics worker {} initialized", env!("CARGO_PKG_VERSION"));
}

/// Get worker version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Re-export main types
pub use error::{WorkerError, WorkerResult};
pub use kernel::{PhysicsKernel, ReferenceKernel};
pub use simulation::{Command, PerfStats, WorkerCore};
#[cfg(target_arch = "wasm32")]
pub use simulation::PhysicsWorker;
pub use transport::{Outbound, QueueTransport, Transport};

// Export report kind tags for JS
#[wasm_bindgen]
pub fn report_world() -> u8 { simulation::report::WORLD_REPORT }
#[wasm_bindgen]
pub fn report_collision() -> u8 { simulation::report::COLLISION_REPORT }
#[wasm_bindgen]
pub fn report_vehicle() -> u8 { simulation::report::VEHICLE_REPORT }
#[wasm_bindgen]
pub fn report_constraint() -> u8 { simulation::report::CONSTRAINT_REPORT }
#[wasm_bindgen]
pub fn report_soft() -> u8 { simulation::report::SOFT_REPORT }
