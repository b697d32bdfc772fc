use log::debug;
use serde_json::json;

use crate::error::{WorkerError, WorkerResult};
use crate::kernel::PhysicsKernel;
use crate::transport::{Transport, EVENT_OBJECT_READY};

use super::commands::Command;
use super::{init, settings, step, WorkerCore};

pub(super) fn execute<K: PhysicsKernel, T: Transport>(
    core: &mut WorkerCore<K, T>,
    command: Command,
) -> WorkerResult<()> {
    if !core.world_ready && !command.creates_world() {
        return Err(WorkerError::WorldNotReady);
    }

    match command {
        Command::Init(config) | Command::MakeWorld(config) => init::make_world(core, config),
        Command::SetGravity(gravity) => settings::set_gravity(core, gravity),
        Command::SetFixedTimeStep(step) => settings::set_fixed_time_step(core, step),

        // === BODIES ===
        Command::AddObject(desc) => {
            core.objects.add(&mut core.kernel, &mut core.shapes, &desc)?;
            core.transport.send_event(EVENT_OBJECT_READY, Some(json!(desc.id)));
        }
        Command::RemoveObject { id } => remove_object(core, id)?,
        Command::UpdateTransform { id, pos, quat } => {
            core.objects.update_transform(&mut core.kernel, id, pos, quat)?
        }
        Command::UpdateMass { id, mass } => core.objects.update_mass(&mut core.kernel, id, mass)?,
        Command::Body { id, op } => {
            core.objects.apply(&mut core.kernel, id, op);
        }
        Command::AppendAnchor { soft, node, rigid, disable_collision, influence } => {
            if !core
                .objects
                .append_anchor(&mut core.kernel, soft, node, rigid, disable_collision, influence)
            {
                debug!("anchor {} -> {} skipped: missing body", soft, rigid);
            }
        }
        Command::AppendLinearJoint { soft, body, specs } => {
            if !core.objects.append_linear_joint(&mut core.kernel, soft, body, &specs) {
                debug!("linear joint {} -> {} skipped: missing body", soft, body);
            }
        }

        // === CONSTRAINTS ===
        Command::AddConstraint(desc) => {
            core.constraints.add(&mut core.kernel, &core.objects, &desc)?;
            core.reports.resize_constraint(core.constraints.len());
        }
        Command::RemoveConstraint { id } => {
            core.constraints.remove(&mut core.kernel, id);
        }
        Command::Constraint { id, op } => {
            core.constraints.apply(&mut core.kernel, &core.objects, id, &op);
        }

        // === VEHICLES ===
        Command::AddVehicle(desc) => core.vehicles.add(&mut core.kernel, &core.objects, &desc)?,
        Command::RemoveVehicle { id } => {
            core.vehicles.remove(&mut core.kernel, id);
        }
        Command::AddWheel(desc) => {
            let total = core.vehicles.add_wheel(&mut core.kernel, &desc)?;
            core.reports.resize_vehicle(total);
        }
        Command::Vehicle { id, op } => {
            core.vehicles.apply(&mut core.kernel, id, op);
        }

        Command::Simulate { time_step, max_sub_steps } => step::simulate(core, time_step, max_sub_steps),
    }
    Ok(())
}

/// Bodies still held by a constraint or a vehicle cannot go away
fn remove_object<K: PhysicsKernel, T: Transport>(core: &mut WorkerCore<K, T>, id: u32) -> WorkerResult<()> {
    if core.constraints.references(id) {
        return Err(WorkerError::BodyInUse { body: id, by: "a constraint" });
    }
    if core.vehicles.references(id) {
        return Err(WorkerError::BodyInUse { body: id, by: "a vehicle" });
    }
    core.objects.remove(&mut core.kernel, &mut core.shapes, id)
}
