use log::warn;

use crate::core::Vec3;
use crate::kernel::PhysicsKernel;
use crate::transport::Transport;

use super::perf_stats::PerfStats;
use super::WorkerCore;

pub(super) fn enable_perf_metrics<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, enabled: bool) {
    core.perf_enabled = enabled;
    if !enabled {
        core.perf_stats.reset();
    }
}

pub(super) fn get_perf_stats<K: PhysicsKernel, T: Transport>(core: &WorkerCore<K, T>) -> PerfStats {
    core.perf_stats.clone()
}

pub(super) fn set_gravity<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, gravity: Vec3) {
    core.kernel.set_gravity(gravity);
}

/// Non-positive steps are ignored; the kernel cannot sub-step with them
pub(super) fn set_fixed_time_step<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, step: f32) {
    if step > 0.0 && step.is_finite() {
        core.fixed_time_step = step;
    } else {
        warn!("ignoring fixed time step {}", step);
    }
}
