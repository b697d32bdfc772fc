//! Physics kernel contract
//!
//! The worker never does dynamics itself. Everything below is what it asks of
//! the kernel: shape/body/constraint/vehicle construction, world membership,
//! stepping and the collision manifold queries behind the collision report.
//!
//! Handles are opaque kernel-native values. They are NOT the controller's ids;
//! the object registry keeps the mapping in both directions.

mod reference;

pub use reference::{ReferenceKernel, WheelState};

use crate::core::{Quat, Transform, Vec3};
use crate::domain::{VehicleTuning, WorldConfig};

/// Activation state that keeps a body from ever sleeping
pub const DISABLE_DEACTIVATION: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MotionStateHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VehicleHandle(pub u32);

/// Collision group/mask pair used when inserting into the world
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: i32,
    pub mask: i32,
}

impl CollisionFilter {
    /// Default filter for soft bodies: group 1, collides with everything
    pub const SOFT_DEFAULT: CollisionFilter = CollisionFilter { group: 1, mask: -1 };
}

/// Geometry handed to the kernel's shape constructors
#[derive(Clone, Debug)]
pub enum ShapeGeometry<'a> {
    Plane { normal: Vec3 },
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Cylinder { half_extents: Vec3 },
    /// `height` is the cylindrical section only (end caps excluded)
    Capsule { radius: f32, height: f32 },
    Cone { radius: f32, height: f32 },
    /// Flat triangle soup, 9 floats per triangle
    Concave { triangles: &'a [f32] },
    /// Flat point cloud, 3 floats per point
    Convex { points: &'a [f32] },
    Heightfield { xpts: u32, ypts: u32, heights: &'a [f32], abs_max_height: f32 },
    Compound { children: &'a [(Transform, ShapeHandle)] },
}

#[derive(Clone, Copy, Debug)]
pub struct RigidBodyInfo {
    pub mass: f32,
    pub local_inertia: Vec3,
    pub shape: ShapeHandle,
    pub motion_state: MotionStateHandle,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

#[derive(Clone, Debug)]
pub enum SoftBodyGeometry<'a> {
    TriMesh { vertices: &'a [f32], indices: &'a [u32] },
    Patch { corners: [Vec3; 4], res_x: u32, res_y: u32, fixeds: u32, gen_diags: bool },
    /// `resolution` intermediate nodes between the two end points
    Rope { from: Vec3, to: Vec3, resolution: u32, fixeds: u32 },
}

/// Soft-body solver and material settings. `None` leaves the kernel default.
#[derive(Clone, Debug, Default)]
pub struct SoftBodyConfig {
    pub viterations: Option<u32>,
    pub piterations: Option<u32>,
    pub diterations: Option<u32>,
    pub citerations: Option<u32>,
    pub collisions: u32,
    pub friction: f32,
    pub damping: f32,
    pub pressure: Option<f32>,
    pub drag: Option<f32>,
    pub lift: Option<f32>,
    pub anchor_hardness: Option<f32>,
    pub rigid_hardness: Option<f32>,
    pub linear_stiffness: Option<f32>,
    pub angular_stiffness: Option<f32>,
    pub volume_stiffness: Option<f32>,
    pub margin: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SoftNode {
    pub position: Vec3,
    pub normal: Vec3,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearJointSpecs {
    pub position: Vec3,
    pub erp: Option<f32>,
    pub cfm: Option<f32>,
    pub split: Option<f32>,
}

/// Constraint frames, always expressed in each body's local space
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintFrame {
    Point { pivot_a: Vec3, pivot_b: Option<Vec3> },
    Hinge { pivot_a: Vec3, pivot_b: Option<Vec3>, axis: Vec3 },
    Slider { frame_a: Transform, frame_b: Option<Transform> },
    ConeTwist { frame_a: Transform, frame_b: Transform },
    Dof { frame_a: Transform, frame_b: Option<Transform> },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintOp {
    HingeSetLimits { low: f32, high: f32, bias_factor: f32, relaxation_factor: f32 },
    HingeEnableAngularMotor { velocity: f32, acceleration: f32 },
    HingeDisableMotor,
    SliderSetLimits { lin_lower: f32, lin_upper: f32, ang_lower: f32, ang_upper: f32 },
    SliderSetRestitution { linear: f32, angular: f32 },
    SliderEnableLinearMotor { velocity: f32, max_force: f32 },
    SliderDisableLinearMotor,
    SliderEnableAngularMotor { velocity: f32, max_force: f32 },
    SliderDisableAngularMotor,
    ConeTwistSetLimit { z: f32, y: f32, x: f32 },
    ConeTwistEnableMotor(bool),
    ConeTwistSetMaxMotorImpulse(f32),
    ConeTwistSetMotorTarget(Quat),
    DofSetLinearLowerLimit(Vec3),
    DofSetLinearUpperLimit(Vec3),
    DofSetAngularLowerLimit(Vec3),
    DofSetAngularUpperLimit(Vec3),
    DofEnableAngularMotor { which: usize, enabled: bool },
    DofConfigureAngularMotor { which: usize, low_angle: f32, high_angle: f32, velocity: f32, max_force: f32 },
    SetBreakingImpulseThreshold(f32),
}

/// Per-body mutations that do not change world membership
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyOp {
    ApplyCentralImpulse(Vec3),
    ApplyImpulse { impulse: Vec3, rel_pos: Vec3 },
    ApplyTorque(Vec3),
    ApplyCentralForce(Vec3),
    ApplyForce { force: Vec3, rel_pos: Vec3 },
    SetAngularVelocity(Vec3),
    SetLinearVelocity(Vec3),
    SetAngularFactor(Vec3),
    SetLinearFactor(Vec3),
    SetDamping { linear: f32, angular: f32 },
    SetCcdMotionThreshold(f32),
    SetCcdSweptSphereRadius(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelInfo {
    pub connection_point: Vec3,
    pub direction: Vec3,
    pub axle: Vec3,
    pub suspension_rest_length: f32,
    pub radius: f32,
    pub is_front_wheel: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VehicleOp {
    Steering { value: f32, wheel: usize },
    Brake { value: f32, wheel: usize },
    EngineForce { value: f32, wheel: usize },
}

/// One persistent contact manifold between two collision objects
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Manifold {
    pub body0: BodyHandle,
    pub body1: BodyHandle,
    pub num_contacts: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    pub normal_world_on_b: Vec3,
}

/// Everything the worker needs from a dynamics/collision engine.
///
/// Calls are made from a single thread, one command at a time. Handles passed
/// in were produced by the same kernel and are still alive.
pub trait PhysicsKernel {
    // === WORLD ===
    fn create_world(&mut self, config: &WorldConfig);
    fn set_gravity(&mut self, gravity: Vec3);
    /// Advance by `time_step`, in at most `max_sub_steps` steps of `fixed_time_step`.
    /// Returns the number of sub-steps actually taken.
    fn step_simulation(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32) -> u32;

    // === SHAPES ===
    fn create_shape(&mut self, geometry: &ShapeGeometry<'_>) -> ShapeHandle;
    fn destroy_shape(&mut self, shape: ShapeHandle);
    fn set_local_scaling(&mut self, shape: ShapeHandle, scale: Vec3);
    fn set_margin(&mut self, shape: ShapeHandle, margin: f32);
    fn calculate_local_inertia(&self, shape: ShapeHandle, mass: f32) -> Vec3;

    // === RIGID BODIES ===
    fn create_motion_state(&mut self, transform: Transform) -> MotionStateHandle;
    fn destroy_motion_state(&mut self, motion_state: MotionStateHandle);
    fn create_rigid_body(&mut self, info: &RigidBodyInfo) -> BodyHandle;
    fn add_rigid_body(&mut self, body: BodyHandle, filter: Option<CollisionFilter>);
    fn remove_rigid_body(&mut self, body: BodyHandle);
    /// Only valid while the body is out of the world
    fn set_mass_props(&mut self, body: BodyHandle, mass: f32, local_inertia: Vec3);
    fn motion_state_transform(&self, body: BodyHandle) -> Transform;
    fn set_world_transform(&mut self, body: BodyHandle, transform: Transform);
    fn center_of_mass_transform(&self, body: BodyHandle) -> Transform;
    fn linear_velocity(&self, body: BodyHandle) -> Vec3;
    fn angular_velocity(&self, body: BodyHandle) -> Vec3;
    fn apply_body_op(&mut self, body: BodyHandle, op: BodyOp);

    // === ANY COLLISION OBJECT ===
    fn set_activation_state(&mut self, body: BodyHandle, state: i32);
    fn set_collision_flags(&mut self, body: BodyHandle, flags: i32);
    fn activate(&mut self, body: BodyHandle);
    fn destroy_body(&mut self, body: BodyHandle);

    // === SOFT BODIES ===
    fn create_soft_body(&mut self, geometry: &SoftBodyGeometry<'_>) -> Option<BodyHandle>;
    fn configure_soft_body(&mut self, body: BodyHandle, config: &SoftBodyConfig);
    fn rotate_soft_body(&mut self, body: BodyHandle, rotation: Quat);
    fn translate_soft_body(&mut self, body: BodyHandle, offset: Vec3);
    fn scale_soft_body(&mut self, body: BodyHandle, scale: Vec3);
    fn set_soft_total_mass(&mut self, body: BodyHandle, mass: f32);
    fn add_soft_body(&mut self, body: BodyHandle, filter: CollisionFilter);
    fn remove_soft_body(&mut self, body: BodyHandle);
    /// Apply `transform` to every node
    fn transform_soft_body(&mut self, body: BodyHandle, transform: Transform);
    fn soft_node_count(&self, body: BodyHandle) -> usize;
    fn soft_face_count(&self, body: BodyHandle) -> usize;
    fn soft_node(&self, body: BodyHandle, index: usize) -> SoftNode;
    fn soft_face(&self, body: BodyHandle, index: usize) -> [usize; 3];
    fn append_anchor(&mut self, soft: BodyHandle, node: usize, rigid: BodyHandle, disable_collision: bool, influence: f32);
    fn append_linear_joint(&mut self, soft: BodyHandle, other: BodyHandle, specs: &LinearJointSpecs);

    // === CONSTRAINTS ===
    fn create_constraint(&mut self, body_a: BodyHandle, body_b: Option<BodyHandle>, frame: &ConstraintFrame) -> ConstraintHandle;
    fn enable_feedback(&mut self, constraint: ConstraintHandle, enabled: bool);
    fn add_constraint(&mut self, constraint: ConstraintHandle);
    fn remove_constraint(&mut self, constraint: ConstraintHandle);
    fn destroy_constraint(&mut self, constraint: ConstraintHandle);
    fn apply_constraint_op(&mut self, constraint: ConstraintHandle, op: &ConstraintOp);
    fn breaking_impulse_threshold(&self, constraint: ConstraintHandle) -> f32;

    // === VEHICLES ===
    fn create_vehicle(&mut self, chassis: BodyHandle, tuning: &VehicleTuning) -> VehicleHandle;
    fn set_coordinate_system(&mut self, vehicle: VehicleHandle, right: usize, up: usize, forward: usize);
    fn add_vehicle(&mut self, vehicle: VehicleHandle);
    fn remove_vehicle(&mut self, vehicle: VehicleHandle);
    fn destroy_vehicle(&mut self, vehicle: VehicleHandle);
    fn add_wheel(&mut self, vehicle: VehicleHandle, wheel: &WheelInfo, tuning: &VehicleTuning);
    fn wheel_count(&self, vehicle: VehicleHandle) -> usize;
    fn wheel_transform(&self, vehicle: VehicleHandle, wheel: usize) -> Transform;
    fn apply_vehicle_op(&mut self, vehicle: VehicleHandle, op: VehicleOp);

    // === COLLISION DISPATCHER ===
    fn num_manifolds(&self) -> usize;
    fn manifold(&self, index: usize) -> Manifold;
    fn contact_point(&self, manifold: usize, contact: usize) -> ContactPoint;
}
