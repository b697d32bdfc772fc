use log::info;

use crate::domain::WorldConfig;
use crate::kernel::PhysicsKernel;
use crate::systems::{ConstraintRegistry, ObjectRegistry, ShapeCache, VehicleRegistry};
use crate::transport::{Transport, EVENT_WORLD_READY};

use super::perf_stats::PerfStats;
use super::report::Reports;
use super::WorkerCore;

pub(super) fn create_worker_core<K: PhysicsKernel, T: Transport>(kernel: K, transport: T) -> WorkerCore<K, T> {
    let config = WorldConfig::default();
    WorkerCore {
        kernel,
        transport,
        world_ready: false,
        fixed_time_step: config.fixed_time_step,
        shapes: ShapeCache::new(),
        objects: ObjectRegistry::new(),
        constraints: ConstraintRegistry::new(),
        vehicles: VehicleRegistry::new(),
        reports: Reports::new(config.report_chunk),
        config,
        frame: 0,
        perf_enabled: false,
        perf_stats: PerfStats::default(),
    }
}

/// Create (or recreate) the kernel world. Registries and report buffers start over.
pub(super) fn make_world<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, config: WorldConfig) {
    let config = config.sanitized();

    core.kernel.create_world(&config);
    if let Some(gravity) = config.gravity {
        core.kernel.set_gravity(gravity);
    }

    core.shapes = ShapeCache::new();
    core.objects = ObjectRegistry::new();
    core.constraints = ConstraintRegistry::new();
    core.vehicles = VehicleRegistry::new();
    core.reports = Reports::new(config.report_chunk);
    core.fixed_time_step = config.fixed_time_step;
    core.frame = 0;

    info!(
        "world created (chunk {}, fixed step {:.4}s, softbody {}, broadphase {:?})",
        config.report_chunk, config.fixed_time_step, config.softbody, config.broadphase
    );
    core.config = config;
    core.world_ready = true;
    core.transport.send_event(EVENT_WORLD_READY, None);
}
