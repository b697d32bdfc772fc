//! Worker core - owns the kernel, the registries and the report encoders
//!
//! Messages are handled strictly one at a time. Every failure stays local to
//! its command: it is logged, optionally echoed to the controller as a
//! `commandFailed` event, and the worker carries on.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::ReportBuffer;
use crate::domain::WorldConfig;
use crate::error::WorkerError;
use crate::kernel::PhysicsKernel;
use crate::systems::{ConstraintRegistry, ObjectRegistry, ShapeCache, VehicleRegistry};
use crate::transport::{Transport, EVENT_COMMAND_FAILED};

#[path = "perf/perf_timer.rs"]
mod perf_timer;
#[path = "perf/perf_stats.rs"]
mod perf_stats;
#[path = "commands/commands.rs"]
mod commands;
#[path = "commands/dispatch.rs"]
mod dispatch;
#[path = "step/step.rs"]
mod step;
#[path = "init/init.rs"]
mod init;
#[path = "init/settings.rs"]
mod settings;
pub mod report;
#[cfg(target_arch = "wasm32")]
mod facade;

pub use commands::Command;
#[cfg(target_arch = "wasm32")]
pub use facade::PhysicsWorker;
pub use perf_stats::PerfStats;

use perf_timer::PerfTimer;
use report::Reports;

/// `{ cmd, params }` as it arrives from the controller
#[derive(Deserialize)]
struct Envelope {
    cmd: String,
    #[serde(default)]
    params: Value,
}

pub struct WorkerCore<K: PhysicsKernel, T: Transport> {
    kernel: K,
    transport: T,
    config: WorldConfig,
    world_ready: bool,
    fixed_time_step: f32,

    shapes: ShapeCache,
    objects: ObjectRegistry,
    constraints: ConstraintRegistry,
    vehicles: VehicleRegistry,
    reports: Reports,

    frame: u64,

    // Perf metrics
    perf_enabled: bool,
    perf_stats: PerfStats,
}

impl<K: PhysicsKernel, T: Transport> WorkerCore<K, T> {
    pub fn new(kernel: K, transport: T) -> Self {
        init::create_worker_core(kernel, transport)
    }

    // === INBOUND ===

    /// Handle one serialized `{ cmd, params }` envelope
    pub fn handle_json(&mut self, envelope: &str) {
        match serde_json::from_str::<Envelope>(envelope) {
            Ok(Envelope { cmd, params }) => self.handle_message(&cmd, params),
            Err(e) => warn!("dropping malformed message: {}", e),
        }
    }

    /// Decode and run one command. Unknown names are ignored.
    pub fn handle_message(&mut self, cmd: &str, params: Value) {
        let command = match Command::decode(cmd, params) {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!("ignoring unknown command `{}`", cmd);
                return;
            }
            Err(e) => {
                self.report_failure(cmd, &e);
                return;
            }
        };
        if let Err(e) = self.execute(command) {
            self.report_failure(cmd, &e);
        }
    }

    /// Run an already decoded command
    pub fn execute(&mut self, command: Command) -> Result<(), WorkerError> {
        dispatch::execute(self, command)
    }

    /// Adopt a report buffer the controller handed back.
    ///
    /// Slot 0 selects the encoder; anything else is dropped.
    pub fn reclaim_report(&mut self, data: Vec<f32>) -> bool {
        let reclaimed = self.reports.reclaim(ReportBuffer::from_vec(data));
        if !reclaimed {
            debug!("dropping returned buffer with unknown kind tag");
        }
        reclaimed
    }

    fn report_failure(&mut self, cmd: &str, err: &WorkerError) {
        warn!("{} failed: {}", cmd, err);
        if self.config.report_errors {
            self.transport.send_event(
                EVENT_COMMAND_FAILED,
                Some(json!({ "cmd": cmd, "reason": err.to_string() })),
            );
        }
    }

    // === STATE ===

    pub fn is_world_ready(&self) -> bool { self.world_ready }

    pub fn config(&self) -> &WorldConfig { &self.config }

    pub fn fixed_time_step(&self) -> f32 { self.fixed_time_step }

    /// Completed `simulate` calls since the world was made
    pub fn frame(&self) -> u64 { self.frame }

    pub fn kernel(&self) -> &K { &self.kernel }

    pub fn transport(&self) -> &T { &self.transport }

    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    pub fn shapes(&self) -> &ShapeCache { &self.shapes }

    pub fn objects(&self) -> &ObjectRegistry { &self.objects }

    pub fn constraints(&self) -> &ConstraintRegistry { &self.constraints }

    pub fn vehicles(&self) -> &VehicleRegistry { &self.vehicles }

    /// Length the next report of `kind` will have (exact kinds) or start from (chunked kinds)
    pub fn report_len(&self, kind: u8) -> Option<usize> {
        self.reports.len_of(kind)
    }

    /// Enable or disable per-step perf metrics (adds timing overhead when enabled)
    pub fn enable_perf_metrics(&mut self, enabled: bool) {
        settings::enable_perf_metrics(self, enabled);
    }

    /// Get last step perf snapshot (zeros when perf disabled)
    pub fn get_perf_stats(&self) -> PerfStats {
        settings::get_perf_stats(self)
    }
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
