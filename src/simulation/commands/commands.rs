//! Inbound protocol: `{ cmd, params }` decoded into a closed `Command` enum
//!
//! Wire names and parameter shapes are fixed by the controller. Unknown names
//! decode to `None` and are ignored by the worker.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{Quat, Vec3};
use crate::domain::{
    ConstraintDescription, ObjectDescription, VehicleDescription, WheelDescription, WorldConfig,
};
use crate::error::{WorkerError, WorkerResult};
use crate::kernel::{BodyOp, ConstraintOp, LinearJointSpecs, VehicleOp};

#[derive(Clone, Debug)]
pub enum Command {
    /// Same as `MakeWorld`; script loading happens outside the worker
    Init(WorldConfig),
    MakeWorld(WorldConfig),
    SetGravity(Vec3),
    SetFixedTimeStep(f32),

    AddObject(Box<ObjectDescription>),
    RemoveObject { id: u32 },
    UpdateTransform { id: u32, pos: Option<Vec3>, quat: Option<Quat> },
    UpdateMass { id: u32, mass: f32 },
    Body { id: u32, op: BodyOp },
    AppendAnchor { soft: u32, node: usize, rigid: u32, disable_collision: bool, influence: f32 },
    AppendLinearJoint { soft: u32, body: u32, specs: LinearJointSpecs },

    AddConstraint(ConstraintDescription),
    RemoveConstraint { id: u32 },
    Constraint { id: u32, op: ConstraintOp },

    AddVehicle(VehicleDescription),
    RemoveVehicle { id: u32 },
    AddWheel(WheelDescription),
    Vehicle { id: u32, op: VehicleOp },

    Simulate { time_step: Option<f32>, max_sub_steps: Option<u32> },
}

// === PARAMETER SHAPES ===

#[derive(Deserialize)]
struct IdParams {
    id: u32,
}

#[derive(Deserialize)]
struct VectorParams {
    id: u32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    z: f32,
}

impl VectorParams {
    fn vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

#[derive(Deserialize)]
struct ImpulseParams {
    id: u32,
    impulse_x: f32,
    impulse_y: f32,
    impulse_z: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize)]
struct TorqueParams {
    id: u32,
    torque_x: f32,
    torque_y: f32,
    torque_z: f32,
}

#[derive(Deserialize)]
struct ForceParams {
    id: u32,
    force_x: f32,
    force_y: f32,
    force_z: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize)]
struct DampingParams {
    id: u32,
    linear: f32,
    angular: f32,
}

#[derive(Deserialize)]
struct ThresholdParams {
    id: u32,
    threshold: f32,
}

#[derive(Deserialize)]
struct RadiusParams {
    id: u32,
    radius: f32,
}

#[derive(Deserialize)]
struct TransformParams {
    id: u32,
    #[serde(default)]
    pos: Option<Vec3>,
    #[serde(default)]
    quat: Option<Quat>,
}

#[derive(Deserialize)]
struct MassParams {
    id: u32,
    mass: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnchorParams {
    obj: u32,
    node: usize,
    obj2: u32,
    #[serde(default)]
    collision_between_linked_bodies: bool,
    #[serde(default = "full_influence")]
    influence: f32,
}

#[derive(Deserialize)]
struct LinearJointParams {
    #[serde(rename = "self")]
    soft: u32,
    body: u32,
    specs: LinearJointSpecsParams,
}

#[derive(Deserialize)]
struct LinearJointSpecsParams {
    position: [f32; 3],
    #[serde(default)]
    erp: Option<f32>,
    #[serde(default)]
    cfm: Option<f32>,
    #[serde(default)]
    split: Option<f32>,
}

#[derive(Deserialize)]
struct SimulateParams {
    #[serde(default, rename = "timeStep")]
    time_step: Option<f32>,
    #[serde(default, rename = "maxSubSteps")]
    max_sub_steps: Option<u32>,
}

#[derive(Deserialize)]
struct SteeringParams {
    id: u32,
    steering: f32,
    wheel: usize,
}

#[derive(Deserialize)]
struct BrakeParams {
    id: u32,
    brake: f32,
    wheel: usize,
}

#[derive(Deserialize)]
struct EngineForceParams {
    id: u32,
    force: f32,
    wheel: usize,
}

/// Per-type constraint setters address the constraint by `constraint`
#[derive(Deserialize)]
struct ConstraintParams {
    constraint: u32,
    #[serde(default)]
    low: f32,
    #[serde(default)]
    high: f32,
    #[serde(default)]
    bias_factor: f32,
    #[serde(default)]
    relaxation_factor: f32,
    #[serde(default)]
    velocity: f32,
    #[serde(default)]
    acceleration: f32,
    #[serde(default)]
    lin_lower: f32,
    #[serde(default)]
    lin_upper: f32,
    #[serde(default)]
    ang_lower: f32,
    #[serde(default)]
    ang_upper: f32,
    #[serde(default)]
    linear: f32,
    #[serde(default)]
    angular: f32,
    #[serde(default)]
    max_impulse: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    z: f32,
    #[serde(default = "unit_w")]
    w: f32,
    #[serde(default)]
    which: usize,
    #[serde(default)]
    low_angle: f32,
    #[serde(default)]
    high_angle: f32,
    #[serde(default)]
    max_force: f32,
}

impl ConstraintParams {
    fn vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

fn full_influence() -> f32 {
    1.0
}

fn unit_w() -> f32 {
    1.0
}

fn parse<T: DeserializeOwned>(cmd: &str, params: Value) -> WorkerResult<T> {
    // Commands sent without params behave like `{}`
    let params = if params.is_null() { Value::Object(Map::new()) } else { params };
    serde_json::from_value(params).map_err(|source| WorkerError::Decode {
        cmd: cmd.to_string(),
        source,
    })
}

impl Command {
    /// Decode one inbound message. `Ok(None)` means the name is not part of the protocol.
    pub fn decode(cmd: &str, params: Value) -> WorkerResult<Option<Command>> {
        let body = |id: u32, op: BodyOp| Command::Body { id, op };

        let command = match cmd {
            "init" => Command::Init(parse(cmd, params)?),
            "makeWorld" => Command::MakeWorld(parse(cmd, params)?),
            "setGravity" => Command::SetGravity(parse(cmd, params)?),
            "setFixedTimeStep" => Command::SetFixedTimeStep(parse(cmd, params)?),

            "addObject" => Command::AddObject(Box::new(parse(cmd, params)?)),
            "removeObject" => Command::RemoveObject { id: parse::<IdParams>(cmd, params)?.id },
            "updateTransform" => {
                let p: TransformParams = parse(cmd, params)?;
                Command::UpdateTransform { id: p.id, pos: p.pos, quat: p.quat }
            }
            "updateMass" => {
                let p: MassParams = parse(cmd, params)?;
                Command::UpdateMass { id: p.id, mass: p.mass }
            }
            "applyCentralImpulse" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::ApplyCentralImpulse(p.vector()))
            }
            "applyImpulse" => {
                let p: ImpulseParams = parse(cmd, params)?;
                body(
                    p.id,
                    BodyOp::ApplyImpulse {
                        impulse: Vec3::new(p.impulse_x, p.impulse_y, p.impulse_z),
                        rel_pos: Vec3::new(p.x, p.y, p.z),
                    },
                )
            }
            "applyTorque" => {
                let p: TorqueParams = parse(cmd, params)?;
                body(p.id, BodyOp::ApplyTorque(Vec3::new(p.torque_x, p.torque_y, p.torque_z)))
            }
            "applyCentralForce" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::ApplyCentralForce(p.vector()))
            }
            "applyForce" => {
                let p: ForceParams = parse(cmd, params)?;
                body(
                    p.id,
                    BodyOp::ApplyForce {
                        force: Vec3::new(p.force_x, p.force_y, p.force_z),
                        rel_pos: Vec3::new(p.x, p.y, p.z),
                    },
                )
            }
            "setAngularVelocity" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetAngularVelocity(p.vector()))
            }
            "setLinearVelocity" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetLinearVelocity(p.vector()))
            }
            "setAngularFactor" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetAngularFactor(p.vector()))
            }
            "setLinearFactor" => {
                let p: VectorParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetLinearFactor(p.vector()))
            }
            "setDamping" => {
                let p: DampingParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetDamping { linear: p.linear, angular: p.angular })
            }
            "setCcdMotionThreshold" => {
                let p: ThresholdParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetCcdMotionThreshold(p.threshold))
            }
            "setCcdSweptSphereRadius" => {
                let p: RadiusParams = parse(cmd, params)?;
                body(p.id, BodyOp::SetCcdSweptSphereRadius(p.radius))
            }
            "appendAnchor" => {
                let p: AnchorParams = parse(cmd, params)?;
                Command::AppendAnchor {
                    soft: p.obj,
                    node: p.node,
                    rigid: p.obj2,
                    disable_collision: !p.collision_between_linked_bodies,
                    influence: p.influence,
                }
            }
            "appendLinearJoint" => {
                let p: LinearJointParams = parse(cmd, params)?;
                Command::AppendLinearJoint {
                    soft: p.soft,
                    body: p.body,
                    specs: LinearJointSpecs {
                        position: Vec3::from_slice(&p.specs.position),
                        erp: p.specs.erp,
                        cfm: p.specs.cfm,
                        split: p.specs.split,
                    },
                }
            }

            "addConstraint" => Command::AddConstraint(parse(cmd, params)?),
            "removeConstraint" => Command::RemoveConstraint { id: parse::<IdParams>(cmd, params)?.id },
            "constraint_setBreakingImpulseThreshold" => {
                let p: ThresholdParams = parse(cmd, params)?;
                Command::Constraint { id: p.id, op: ConstraintOp::SetBreakingImpulseThreshold(p.threshold) }
            }
            name if is_constraint_setter(name) => {
                let p: ConstraintParams = parse(cmd, params)?;
                match constraint_op(name, &p) {
                    Some(op) => Command::Constraint { id: p.constraint, op },
                    None => return Ok(None),
                }
            }

            "addVehicle" => Command::AddVehicle(parse(cmd, params)?),
            "removeVehicle" => Command::RemoveVehicle { id: parse::<IdParams>(cmd, params)?.id },
            "addWheel" => Command::AddWheel(parse(cmd, params)?),
            "setSteering" => {
                let p: SteeringParams = parse(cmd, params)?;
                Command::Vehicle { id: p.id, op: VehicleOp::Steering { value: p.steering, wheel: p.wheel } }
            }
            "setBrake" => {
                let p: BrakeParams = parse(cmd, params)?;
                Command::Vehicle { id: p.id, op: VehicleOp::Brake { value: p.brake, wheel: p.wheel } }
            }
            "applyEngineForce" => {
                let p: EngineForceParams = parse(cmd, params)?;
                Command::Vehicle { id: p.id, op: VehicleOp::EngineForce { value: p.force, wheel: p.wheel } }
            }

            "simulate" => {
                let p: SimulateParams = parse(cmd, params)?;
                Command::Simulate { time_step: p.time_step, max_sub_steps: p.max_sub_steps }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Wire name, used when reporting failures
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init(_) => "init",
            Command::MakeWorld(_) => "makeWorld",
            Command::SetGravity(_) => "setGravity",
            Command::SetFixedTimeStep(_) => "setFixedTimeStep",
            Command::AddObject(_) => "addObject",
            Command::RemoveObject { .. } => "removeObject",
            Command::UpdateTransform { .. } => "updateTransform",
            Command::UpdateMass { .. } => "updateMass",
            Command::Body { .. } => "bodyOp",
            Command::AppendAnchor { .. } => "appendAnchor",
            Command::AppendLinearJoint { .. } => "appendLinearJoint",
            Command::AddConstraint(_) => "addConstraint",
            Command::RemoveConstraint { .. } => "removeConstraint",
            Command::Constraint { .. } => "constraintOp",
            Command::AddVehicle(_) => "addVehicle",
            Command::RemoveVehicle { .. } => "removeVehicle",
            Command::AddWheel(_) => "addWheel",
            Command::Vehicle { .. } => "vehicleOp",
            Command::Simulate { .. } => "simulate",
        }
    }

    /// Commands accepted before a world exists
    pub fn creates_world(&self) -> bool {
        matches!(self, Command::Init(_) | Command::MakeWorld(_))
    }
}

fn is_constraint_setter(name: &str) -> bool {
    ["hinge_", "slider_", "conetwist_", "dof_"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn constraint_op(name: &str, p: &ConstraintParams) -> Option<ConstraintOp> {
    let op = match name {
        "hinge_setLimits" => ConstraintOp::HingeSetLimits {
            low: p.low,
            high: p.high,
            bias_factor: p.bias_factor,
            relaxation_factor: p.relaxation_factor,
        },
        "hinge_enableAngularMotor" => ConstraintOp::HingeEnableAngularMotor {
            velocity: p.velocity,
            acceleration: p.acceleration,
        },
        "hinge_disableMotor" => ConstraintOp::HingeDisableMotor,
        "slider_setLimits" => ConstraintOp::SliderSetLimits {
            lin_lower: p.lin_lower,
            lin_upper: p.lin_upper,
            ang_lower: p.ang_lower,
            ang_upper: p.ang_upper,
        },
        "slider_setRestitution" => ConstraintOp::SliderSetRestitution { linear: p.linear, angular: p.angular },
        // Slider motors take their force cap from `acceleration`
        "slider_enableLinearMotor" => ConstraintOp::SliderEnableLinearMotor {
            velocity: p.velocity,
            max_force: p.acceleration,
        },
        "slider_disableLinearMotor" => ConstraintOp::SliderDisableLinearMotor,
        "slider_enableAngularMotor" => ConstraintOp::SliderEnableAngularMotor {
            velocity: p.velocity,
            max_force: p.acceleration,
        },
        "slider_disableAngularMotor" => ConstraintOp::SliderDisableAngularMotor,
        "conetwist_setLimit" => ConstraintOp::ConeTwistSetLimit { z: p.z, y: p.y, x: p.x },
        "conetwist_enableMotor" => ConstraintOp::ConeTwistEnableMotor(true),
        "conetwist_disableMotor" => ConstraintOp::ConeTwistEnableMotor(false),
        "conetwist_setMaxMotorImpulse" => ConstraintOp::ConeTwistSetMaxMotorImpulse(p.max_impulse),
        "conetwist_setMotorTarget" => ConstraintOp::ConeTwistSetMotorTarget(Quat::new(p.x, p.y, p.z, p.w)),
        "dof_setLinearLowerLimit" => ConstraintOp::DofSetLinearLowerLimit(p.vector()),
        "dof_setLinearUpperLimit" => ConstraintOp::DofSetLinearUpperLimit(p.vector()),
        "dof_setAngularLowerLimit" => ConstraintOp::DofSetAngularLowerLimit(p.vector()),
        "dof_setAngularUpperLimit" => ConstraintOp::DofSetAngularUpperLimit(p.vector()),
        "dof_enableAngularMotor" => ConstraintOp::DofEnableAngularMotor { which: p.which, enabled: true },
        "dof_disableAngularMotor" => ConstraintOp::DofEnableAngularMotor { which: p.which, enabled: false },
        "dof_configureAngularMotor" => ConstraintOp::DofConfigureAngularMotor {
            which: p.which,
            low_angle: p.low_angle,
            high_angle: p.high_angle,
            velocity: p.velocity,
            max_force: p.max_force,
        },
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_names_decode_to_none() {
        assert!(Command::decode("linkNodes", json!({})).unwrap().is_none());
        assert!(Command::decode("hinge_doSomething", json!({"constraint": 1})).unwrap().is_none());
    }

    #[test]
    fn missing_params_act_like_empty_object() {
        match Command::decode("makeWorld", Value::Null).unwrap() {
            Some(Command::MakeWorld(cfg)) => assert_eq!(cfg.report_chunk, 50),
            other => panic!("unexpected {:?}", other),
        }
        match Command::decode("simulate", Value::Null).unwrap() {
            Some(Command::Simulate { time_step: None, max_sub_steps: None }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fixed_time_step_is_a_bare_number() {
        match Command::decode("setFixedTimeStep", json!(0.01)).unwrap() {
            Some(Command::SetFixedTimeStep(v)) => assert_eq!(v, 0.01),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn impulse_fields_map_to_body_op() {
        let cmd = Command::decode(
            "applyImpulse",
            json!({"id": 3, "impulse_x": 1, "impulse_y": 2, "impulse_z": 3, "x": 0, "y": 1, "z": 0}),
        )
        .unwrap()
        .unwrap();
        match cmd {
            Command::Body { id: 3, op: BodyOp::ApplyImpulse { impulse, rel_pos } } => {
                assert_eq!(impulse, Vec3::new(1.0, 2.0, 3.0));
                assert_eq!(rel_pos, Vec3::new(0.0, 1.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn constraint_setters_use_constraint_key() {
        let cmd = Command::decode("slider_enableLinearMotor", json!({"constraint": 4, "velocity": 2, "acceleration": 9}))
            .unwrap()
            .unwrap();
        match cmd {
            Command::Constraint { id: 4, op } => {
                assert_eq!(op, ConstraintOp::SliderEnableLinearMotor { velocity: 2.0, max_force: 9.0 })
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn anchor_collision_flag_is_inverted() {
        let cmd = Command::decode(
            "appendAnchor",
            json!({"obj": 1, "node": 0, "obj2": 2, "collisionBetweenLinkedBodies": true, "influence": 0.5}),
        )
        .unwrap()
        .unwrap();
        assert!(matches!(
            cmd,
            Command::AppendAnchor { soft: 1, node: 0, rigid: 2, disable_collision: false, .. }
        ));
    }

    #[test]
    fn malformed_params_are_decode_errors() {
        let err = Command::decode("removeObject", json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, WorkerError::Decode { ref cmd, .. } if cmd == "removeObject"));
    }
}
