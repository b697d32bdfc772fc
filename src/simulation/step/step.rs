use crate::core::ReportBuffer;
use crate::kernel::PhysicsKernel;
use crate::transport::Transport;

use super::{PerfTimer, WorkerCore};

/// One `simulate` message: step the kernel, then send the frame's reports.
///
/// Report order is world, collision, vehicle, constraint, soft. Vehicle and
/// constraint reports go out only when they have entries; the soft report
/// only when the world was made with `softbody`.
pub(super) fn simulate<K: PhysicsKernel, T: Transport>(
    core: &mut WorkerCore<K, T>,
    time_step: Option<f32>,
    max_sub_steps: Option<u32>,
) {
    let fixed = core.fixed_time_step;
    let time_step = time_step
        .filter(|t| t.is_finite())
        .map_or(fixed, |t| t.max(fixed));
    let max_sub_steps = max_sub_steps
        .filter(|&n| n > 0)
        .unwrap_or_else(|| (time_step / fixed).ceil() as u32);

    let perf_on = core.perf_enabled;
    let mut timer = if perf_on { Some(PerfTimer::start()) } else { None };

    let sub_steps = core.kernel.step_simulation(time_step, max_sub_steps, fixed);
    core.frame += 1;

    let step_ms = timer.as_mut().map_or(0.0, |t| t.lap_ms());

    let mut sent = 0;
    let world = core.reports.encode_world(&core.kernel, &core.objects);
    send(core, world);
    sent += 1;

    let collisions = core.reports.encode_collision(&core.kernel, &core.objects);
    send(core, collisions);
    sent += 1;

    if !core.vehicles.is_empty() {
        if let Some(buf) = core.reports.encode_vehicle(&core.kernel, &core.vehicles) {
            send(core, buf);
            sent += 1;
        }
    }

    if !core.constraints.is_empty() {
        if let Some(buf) = core.reports.encode_constraint(&core.kernel, &core.constraints) {
            send(core, buf);
            sent += 1;
        }
    }

    if core.config.softbody {
        let soft = core.reports.encode_soft(&core.kernel, &core.objects);
        send(core, soft);
        sent += 1;
    }

    if let Some(timer) = timer.as_mut() {
        let stats = &mut core.perf_stats;
        stats.step_ms = step_ms;
        stats.report_ms = timer.lap_ms();
        stats.sub_steps = sub_steps;
        stats.rigid_bodies = core.objects.rigid_count() as u32;
        stats.soft_bodies = core.objects.soft_count() as u32;
        stats.manifolds = core.kernel.num_manifolds() as u32;
        stats.reports_sent = sent;
    }
}

/// Hand a report to the transport; keep the storage if it was only copied
fn send<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, buf: ReportBuffer) {
    if let Some(back) = core.transport.send_report(buf) {
        core.reports.reclaim(back);
    }
}
