//! ReferenceKernel - minimal headless kernel
//!
//! This is intentionally simple (no solver, no narrowphase beyond bounding spheres).
//! Goals:
//! - Let the worker run without a native engine (native hosts, tests, demos).
//! - Keep results deterministic.
//! - Honor the kernel contract exactly (handles, world membership, manifolds).
//!
//! Current behavior:
//! - Rigid bodies integrate gravity, forces and impulses; no collision response.
//! - Soft-body nodes integrate gravity; pinned/anchored nodes stay put.
//! - Manifolds come from bounding-sphere / plane proximity between rigid bodies,
//!   with a small slack so a manifold can exist with zero contacts.
//! - Constraints and vehicles store their settings; nothing is solved.

use log::warn;

use crate::core::{Quat, Transform, Vec3};
use crate::domain::{VehicleTuning, WorldConfig};

use super::{
    BodyHandle, BodyOp, CollisionFilter, ConstraintFrame, ConstraintHandle, ConstraintOp,
    ContactPoint, LinearJointSpecs, Manifold, MotionStateHandle, PhysicsKernel, RigidBodyInfo,
    ShapeGeometry, ShapeHandle, SoftBodyConfig, SoftBodyGeometry, SoftNode, VehicleHandle,
    VehicleOp, WheelInfo,
};

/// Native body handles look like addresses: base + index * stride
const NATIVE_BASE: u32 = 0x1000;
const NATIVE_STRIDE: u32 = 16;
/// Broadphase slack: pairs this close get a manifold, even without contact
const MANIFOLD_SLACK: f32 = 0.1;
const CF_STATIC_OBJECT: i32 = 1;
const CF_KINEMATIC_OBJECT: i32 = 2;

#[derive(Clone, Copy, Debug)]
enum ShapeBound {
    Plane { normal: Vec3 },
    Sphere { radius: f32 },
}

struct KShape {
    bound: ShapeBound,
    scale: Vec3,
    margin: f32,
}

impl KShape {
    fn radius(&self) -> f32 {
        match self.bound {
            ShapeBound::Plane { .. } => 0.0,
            ShapeBound::Sphere { radius } => radius * self.scale.max_component() + self.margin,
        }
    }
}

struct KNode {
    x: Vec3,
    v: Vec3,
    inv_mass: f32,
    normal: Vec3,
    /// Rigid body and local offset this node is pinned to
    anchor: Option<(BodyHandle, Vec3)>,
}

struct KSoft {
    nodes: Vec<KNode>,
    faces: Vec<[usize; 3]>,
    config: SoftBodyConfig,
    joints: Vec<(BodyHandle, LinearJointSpecs)>,
}

struct KBody {
    transform: Transform,
    lin_vel: Vec3,
    ang_vel: Vec3,
    shape: Option<ShapeHandle>,
    motion_state: Option<MotionStateHandle>,
    mass: f32,
    inv_mass: f32,
    inv_inertia: Vec3,
    friction: f32,
    restitution: f32,
    lin_damping: f32,
    ang_damping: f32,
    lin_factor: Vec3,
    ang_factor: Vec3,
    force: Vec3,
    torque: Vec3,
    ccd_motion_threshold: f32,
    ccd_swept_sphere_radius: f32,
    activation_state: i32,
    collision_flags: i32,
    filter: CollisionFilter,
    in_world: bool,
    soft: Option<KSoft>,
}

impl KBody {
    fn is_dynamic(&self) -> bool {
        self.soft.is_none()
            && self.inv_mass > 0.0
            && self.collision_flags & (CF_STATIC_OBJECT | CF_KINEMATIC_OBJECT) == 0
    }
}

struct KConstraint {
    body_a: BodyHandle,
    body_b: Option<BodyHandle>,
    frame: ConstraintFrame,
    feedback: bool,
    in_world: bool,
    breaking_impulse_threshold: f32,
    applied: Vec<ConstraintOp>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelState {
    pub steering: f32,
    pub brake: f32,
    pub engine_force: f32,
}

struct KWheel {
    info: WheelInfo,
    tuning: VehicleTuning,
    state: WheelState,
}

struct KVehicle {
    chassis: BodyHandle,
    tuning: VehicleTuning,
    axes: [usize; 3],
    wheels: Vec<KWheel>,
    in_world: bool,
}

#[derive(Clone, Copy)]
struct KManifold {
    body0: BodyHandle,
    body1: BodyHandle,
    num_contacts: usize,
    normal_on_b: Vec3,
}

/// Headless kernel used by native hosts and the test-suite
pub struct ReferenceKernel {
    config: Option<WorldConfig>,
    gravity: Vec3,
    time_accumulator: f32,
    shapes: Vec<Option<KShape>>,
    motion_states: Vec<Option<Transform>>,
    bodies: Vec<Option<KBody>>,
    constraints: Vec<Option<KConstraint>>,
    vehicles: Vec<Option<KVehicle>>,
    manifolds: Vec<KManifold>,
    unsafe_mass_changes: u32,
}

impl ReferenceKernel {
    pub fn new() -> Self {
        Self {
            config: None,
            gravity: Vec3::zero(),
            time_accumulator: 0.0,
            shapes: Vec::new(),
            motion_states: Vec::new(),
            bodies: Vec::new(),
            constraints: Vec::new(),
            vehicles: Vec::new(),
            manifolds: Vec::new(),
            unsafe_mass_changes: 0,
        }
    }

    // === INSPECTION (hosts and tests) ===

    pub fn world_created(&self) -> bool {
        self.config.is_some()
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn live_shape_count(&self) -> usize {
        self.shapes.iter().filter(|s| s.is_some()).count()
    }

    pub fn live_body_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    pub fn live_motion_state_count(&self) -> usize {
        self.motion_states.iter().filter(|m| m.is_some()).count()
    }

    pub fn is_in_world(&self, body: BodyHandle) -> bool {
        self.body(body).map(|b| b.in_world).unwrap_or(false)
    }

    pub fn body_mass(&self, body: BodyHandle) -> Option<f32> {
        self.body(body).map(|b| b.mass)
    }

    pub fn body_friction(&self, body: BodyHandle) -> Option<f32> {
        self.body(body).map(|b| b.friction)
    }

    pub fn body_filter(&self, body: BodyHandle) -> Option<CollisionFilter> {
        self.body(body).map(|b| b.filter)
    }

    pub fn activation_state(&self, body: BodyHandle) -> Option<i32> {
        self.body(body).map(|b| b.activation_state)
    }

    pub fn soft_config(&self, body: BodyHandle) -> Option<&SoftBodyConfig> {
        self.body(body)?.soft.as_ref().map(|s| &s.config)
    }

    /// Rigid body the soft node is pinned to, if any
    pub fn soft_anchor(&self, body: BodyHandle, node: usize) -> Option<BodyHandle> {
        self.body(body)?.soft.as_ref()?.nodes.get(node)?.anchor.map(|(rigid, _)| rigid)
    }

    pub fn soft_joints(&self, body: BodyHandle) -> &[(BodyHandle, LinearJointSpecs)] {
        self.body(body)
            .and_then(|b| b.soft.as_ref())
            .map(|s| s.joints.as_slice())
            .unwrap_or(&[])
    }

    /// `set_mass_props` calls made while the body was still in the world
    pub fn unsafe_mass_changes(&self) -> u32 {
        self.unsafe_mass_changes
    }

    pub fn constraint_in_world(&self, constraint: ConstraintHandle) -> bool {
        self.constraint(constraint).map(|c| c.in_world).unwrap_or(false)
    }

    pub fn constraint_feedback(&self, constraint: ConstraintHandle) -> bool {
        self.constraint(constraint).map(|c| c.feedback).unwrap_or(false)
    }

    pub fn constraint_frame(&self, constraint: ConstraintHandle) -> Option<ConstraintFrame> {
        self.constraint(constraint).map(|c| c.frame)
    }

    pub fn constraint_bodies(&self, constraint: ConstraintHandle) -> Option<(BodyHandle, Option<BodyHandle>)> {
        self.constraint(constraint).map(|c| (c.body_a, c.body_b))
    }

    /// Every op applied to the constraint, oldest first
    pub fn constraint_ops(&self, constraint: ConstraintHandle) -> &[ConstraintOp] {
        self.constraint(constraint)
            .map(|c| c.applied.as_slice())
            .unwrap_or(&[])
    }

    pub fn wheel_state(&self, vehicle: VehicleHandle, wheel: usize) -> Option<WheelState> {
        self.vehicle(vehicle)?.wheels.get(wheel).map(|w| w.state)
    }

    pub fn wheel_tuning(&self, vehicle: VehicleHandle, wheel: usize) -> Option<VehicleTuning> {
        self.vehicle(vehicle)?.wheels.get(wheel).map(|w| w.tuning)
    }

    pub fn vehicle_in_world(&self, vehicle: VehicleHandle) -> bool {
        self.vehicle(vehicle).map(|v| v.in_world).unwrap_or(false)
    }

    // === INTERNAL LOOKUPS ===

    fn body_index(handle: BodyHandle) -> usize {
        (handle.0.wrapping_sub(NATIVE_BASE) / NATIVE_STRIDE) as usize
    }

    fn body_handle(index: usize) -> BodyHandle {
        BodyHandle(NATIVE_BASE + index as u32 * NATIVE_STRIDE)
    }

    fn body(&self, handle: BodyHandle) -> Option<&KBody> {
        self.bodies.get(Self::body_index(handle))?.as_ref()
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut KBody> {
        self.bodies.get_mut(Self::body_index(handle))?.as_mut()
    }

    fn soft_mut(&mut self, handle: BodyHandle) -> Option<&mut KSoft> {
        self.body_mut(handle)?.soft.as_mut()
    }

    fn constraint(&self, handle: ConstraintHandle) -> Option<&KConstraint> {
        self.constraints.get(handle.0 as usize)?.as_ref()
    }

    fn vehicle(&self, handle: VehicleHandle) -> Option<&KVehicle> {
        self.vehicles.get(handle.0 as usize)?.as_ref()
    }

    fn vehicle_mut(&mut self, handle: VehicleHandle) -> Option<&mut KVehicle> {
        self.vehicles.get_mut(handle.0 as usize)?.as_mut()
    }

    fn shape(&self, handle: ShapeHandle) -> Option<&KShape> {
        self.shapes.get(handle.0 as usize)?.as_ref()
    }

    fn push_body(&mut self, body: KBody) -> BodyHandle {
        let index = self.bodies.len();
        self.bodies.push(Some(body));
        Self::body_handle(index)
    }

    fn blank_body(transform: Transform) -> KBody {
        KBody {
            transform,
            lin_vel: Vec3::zero(),
            ang_vel: Vec3::zero(),
            shape: None,
            motion_state: None,
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: Vec3::zero(),
            friction: 0.5,
            restitution: 0.0,
            lin_damping: 0.0,
            ang_damping: 0.0,
            lin_factor: Vec3::one(),
            ang_factor: Vec3::one(),
            force: Vec3::zero(),
            torque: Vec3::zero(),
            ccd_motion_threshold: 0.0,
            ccd_swept_sphere_radius: 0.0,
            activation_state: 1,
            collision_flags: 0,
            filter: CollisionFilter { group: 1, mask: -1 },
            in_world: false,
            soft: None,
        }
    }

    fn geometry_bound(&self, geometry: &ShapeGeometry<'_>) -> ShapeBound {
        let max_point = |flat: &[f32]| {
            flat.chunks_exact(3)
                .map(|p| Vec3::from_slice(p).length())
                .fold(0.0f32, f32::max)
        };
        match geometry {
            ShapeGeometry::Plane { normal } => ShapeBound::Plane { normal: normal.normalize() },
            ShapeGeometry::Box { half_extents } | ShapeGeometry::Cylinder { half_extents } => {
                ShapeBound::Sphere { radius: half_extents.length() }
            }
            ShapeGeometry::Sphere { radius } => ShapeBound::Sphere { radius: *radius },
            ShapeGeometry::Capsule { radius, height } => ShapeBound::Sphere { radius: height * 0.5 + radius },
            ShapeGeometry::Cone { radius, height } => ShapeBound::Sphere {
                radius: (radius * radius + height * height * 0.25).sqrt(),
            },
            ShapeGeometry::Concave { triangles } => ShapeBound::Sphere { radius: max_point(triangles) },
            ShapeGeometry::Convex { points } => ShapeBound::Sphere { radius: max_point(points) },
            ShapeGeometry::Heightfield { xpts, ypts, abs_max_height, .. } => {
                let hx = *xpts as f32 * 0.5;
                let hy = *ypts as f32 * 0.5;
                ShapeBound::Sphere { radius: (hx * hx + hy * hy + abs_max_height * abs_max_height).sqrt() }
            }
            ShapeGeometry::Compound { children } => {
                let radius = children
                    .iter()
                    .filter_map(|(t, s)| self.shape(*s).map(|child| t.origin.length() + child.radius()))
                    .fold(0.0f32, f32::max);
                ShapeBound::Sphere { radius }
            }
        }
    }

    // === STEPPING ===

    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in self.bodies.iter_mut().flatten() {
            if !body.in_world {
                continue;
            }
            if let Some(soft) = body.soft.as_mut() {
                let damping = soft.config.damping.clamp(0.0, 1.0);
                for node in soft.nodes.iter_mut() {
                    if node.inv_mass <= 0.0 || node.anchor.is_some() {
                        continue;
                    }
                    node.v = (node.v + gravity * dt) * (1.0 - damping);
                    node.x += node.v * dt;
                }
                continue;
            }
            if !body.is_dynamic() {
                continue;
            }

            let accel = gravity + body.force * body.inv_mass;
            body.lin_vel += accel.scale(body.lin_factor) * dt;
            body.ang_vel += body.torque.scale(body.inv_inertia).scale(body.ang_factor) * dt;
            body.lin_vel = body.lin_vel * (1.0 - body.lin_damping).clamp(0.0, 1.0).powf(dt);
            body.ang_vel = body.ang_vel * (1.0 - body.ang_damping).clamp(0.0, 1.0).powf(dt);

            body.transform.origin += body.lin_vel * dt;
            if body.ang_vel.length_squared() > 0.0 {
                let w = body.ang_vel;
                let q = body.transform.rotation;
                let spin = Quat::new(w.x, w.y, w.z, 0.0) * q;
                body.transform.rotation = Quat::new(
                    q.x + spin.x * 0.5 * dt,
                    q.y + spin.y * 0.5 * dt,
                    q.z + spin.z * 0.5 * dt,
                    q.w + spin.w * 0.5 * dt,
                )
                .normalize();
            }

            body.force = Vec3::zero();
            body.torque = Vec3::zero();
        }

        self.sync_motion_states();
        self.follow_anchors();
    }

    fn sync_motion_states(&mut self) {
        for body in self.bodies.iter().flatten() {
            if let Some(ms) = body.motion_state {
                if let Some(Some(slot)) = self.motion_states.get_mut(ms.0 as usize) {
                    *slot = body.transform;
                }
            }
        }
    }

    fn follow_anchors(&mut self) {
        let transforms: Vec<Option<Transform>> = self
            .bodies
            .iter()
            .map(|b| b.as_ref().map(|b| b.transform))
            .collect();
        for body in self.bodies.iter_mut().flatten() {
            let Some(soft) = body.soft.as_mut() else { continue };
            for node in soft.nodes.iter_mut() {
                if let Some((rigid, local)) = node.anchor {
                    if let Some(Some(t)) = transforms.get(Self::body_index(rigid)) {
                        node.x = t.apply(local);
                    }
                }
            }
        }
    }

    fn refresh_normals(soft: &mut KSoft) {
        if soft.faces.is_empty() {
            return;
        }
        for node in soft.nodes.iter_mut() {
            node.normal = Vec3::zero();
        }
        for face in soft.faces.iter() {
            let [a, b, c] = *face;
            let n = (soft.nodes[b].x - soft.nodes[a].x).cross(soft.nodes[c].x - soft.nodes[a].x);
            for i in [a, b, c] {
                soft.nodes[i].normal += n;
            }
        }
        for node in soft.nodes.iter_mut() {
            node.normal = node.normal.normalize();
        }
    }

    fn detect_manifolds(&mut self) {
        self.manifolds.clear();
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (Some(a), Some(b)) = (self.bodies[i].as_ref(), self.bodies[j].as_ref()) else {
                    continue;
                };
                if !a.in_world || !b.in_world || a.soft.is_some() || b.soft.is_some() {
                    continue;
                }
                if !a.is_dynamic() && !b.is_dynamic() {
                    continue;
                }
                let filtered = (a.filter.group & b.filter.mask) != 0 && (b.filter.group & a.filter.mask) != 0;
                if !filtered {
                    continue;
                }
                let (Some(sa), Some(sb)) = (a.shape.and_then(|s| self.shape(s)), b.shape.and_then(|s| self.shape(s))) else {
                    continue;
                };
                if let Some((gap, normal_on_b)) = Self::separation(a, sa, b, sb) {
                    if gap < MANIFOLD_SLACK {
                        self.manifolds.push(KManifold {
                            body0: Self::body_handle(i),
                            body1: Self::body_handle(j),
                            num_contacts: usize::from(gap < 0.0),
                            normal_on_b,
                        });
                    }
                }
            }
        }
    }

    /// Signed gap between two bodies and the contact normal pointing from B to A
    fn separation(a: &KBody, sa: &KShape, b: &KBody, sb: &KShape) -> Option<(f32, Vec3)> {
        match (sa.bound, sb.bound) {
            (ShapeBound::Plane { .. }, ShapeBound::Plane { .. }) => None,
            (ShapeBound::Plane { normal }, ShapeBound::Sphere { .. }) => {
                let n = a.transform.rotation.rotate(normal);
                let gap = n.dot(b.transform.origin - a.transform.origin) - sb.radius();
                Some((gap, -n))
            }
            (ShapeBound::Sphere { .. }, ShapeBound::Plane { normal }) => {
                let n = b.transform.rotation.rotate(normal);
                let gap = n.dot(a.transform.origin - b.transform.origin) - sa.radius();
                Some((gap, n))
            }
            (ShapeBound::Sphere { .. }, ShapeBound::Sphere { .. }) => {
                let delta = a.transform.origin - b.transform.origin;
                let gap = delta.length() - sa.radius() - sb.radius();
                Some((gap, delta.normalize()))
            }
        }
    }
}

impl Default for ReferenceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsKernel for ReferenceKernel {
    fn create_world(&mut self, config: &WorldConfig) {
        // A new world starts empty
        *self = Self::new();
        self.config = Some(config.clone());
        self.gravity = config.gravity.unwrap_or_else(Vec3::zero);
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn step_simulation(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32) -> u32 {
        let (steps, dt) = if max_sub_steps > 0 && fixed_time_step > 0.0 {
            self.time_accumulator += time_step;
            let steps = (self.time_accumulator / fixed_time_step).floor() as u32;
            self.time_accumulator -= steps as f32 * fixed_time_step;
            (steps.min(max_sub_steps), fixed_time_step)
        } else {
            (1, time_step)
        };

        for _ in 0..steps {
            self.integrate(dt);
        }
        if steps > 0 {
            for body in self.bodies.iter_mut().flatten() {
                if let Some(soft) = body.soft.as_mut() {
                    Self::refresh_normals(soft);
                }
            }
            self.detect_manifolds();
        }
        steps
    }

    fn create_shape(&mut self, geometry: &ShapeGeometry<'_>) -> ShapeHandle {
        let bound = self.geometry_bound(geometry);
        self.shapes.push(Some(KShape { bound, scale: Vec3::one(), margin: 0.0 }));
        ShapeHandle(self.shapes.len() as u32 - 1)
    }

    fn destroy_shape(&mut self, shape: ShapeHandle) {
        if let Some(slot) = self.shapes.get_mut(shape.0 as usize) {
            *slot = None;
        }
    }

    fn set_local_scaling(&mut self, shape: ShapeHandle, scale: Vec3) {
        if let Some(Some(s)) = self.shapes.get_mut(shape.0 as usize) {
            s.scale = scale;
        }
    }

    fn set_margin(&mut self, shape: ShapeHandle, margin: f32) {
        if let Some(Some(s)) = self.shapes.get_mut(shape.0 as usize) {
            s.margin = margin;
        }
    }

    fn calculate_local_inertia(&self, shape: ShapeHandle, mass: f32) -> Vec3 {
        // Solid-sphere approximation over the bounding radius
        let r = self.shape(shape).map(|s| s.radius()).unwrap_or(0.0);
        let i = 0.4 * mass * r * r;
        Vec3::new(i, i, i)
    }

    fn create_motion_state(&mut self, transform: Transform) -> MotionStateHandle {
        self.motion_states.push(Some(transform));
        MotionStateHandle(self.motion_states.len() as u32 - 1)
    }

    fn destroy_motion_state(&mut self, motion_state: MotionStateHandle) {
        if let Some(slot) = self.motion_states.get_mut(motion_state.0 as usize) {
            *slot = None;
        }
    }

    fn create_rigid_body(&mut self, info: &RigidBodyInfo) -> BodyHandle {
        let transform = self
            .motion_states
            .get(info.motion_state.0 as usize)
            .copied()
            .flatten()
            .unwrap_or_default();
        let mut body = Self::blank_body(transform);
        body.shape = Some(info.shape);
        body.motion_state = Some(info.motion_state);
        body.friction = info.friction;
        body.restitution = info.restitution;
        body.lin_damping = info.linear_damping;
        body.ang_damping = info.angular_damping;
        let handle = self.push_body(body);
        self.set_mass_props(handle, info.mass, info.local_inertia);
        handle
    }

    fn add_rigid_body(&mut self, body: BodyHandle, filter: Option<CollisionFilter>) {
        if let Some(b) = self.body_mut(body) {
            if let Some(filter) = filter {
                b.filter = filter;
            }
            b.in_world = true;
        }
    }

    fn remove_rigid_body(&mut self, body: BodyHandle) {
        if let Some(b) = self.body_mut(body) {
            b.in_world = false;
        }
        self.manifolds.retain(|m| m.body0 != body && m.body1 != body);
    }

    fn set_mass_props(&mut self, body: BodyHandle, mass: f32, local_inertia: Vec3) {
        let Some(b) = self.body_mut(body) else { return };
        if b.in_world {
            warn!("reference kernel: mass changed on body {:?} while in world", body);
            self.unsafe_mass_changes += 1;
            return;
        }
        let inv = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };
        b.mass = mass;
        b.inv_mass = inv(mass);
        b.inv_inertia = Vec3::new(inv(local_inertia.x), inv(local_inertia.y), inv(local_inertia.z));
    }

    fn motion_state_transform(&self, body: BodyHandle) -> Transform {
        let Some(b) = self.body(body) else { return Transform::identity() };
        b.motion_state
            .and_then(|ms| self.motion_states.get(ms.0 as usize).copied().flatten())
            .unwrap_or(b.transform)
    }

    fn set_world_transform(&mut self, body: BodyHandle, transform: Transform) {
        let Some(b) = self.body_mut(body) else { return };
        b.transform = transform;
        if let Some(ms) = b.motion_state {
            if let Some(Some(slot)) = self.motion_states.get_mut(ms.0 as usize) {
                *slot = transform;
            }
        }
    }

    fn center_of_mass_transform(&self, body: BodyHandle) -> Transform {
        self.body(body).map(|b| b.transform).unwrap_or_default()
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec3 {
        self.body(body).map(|b| b.lin_vel).unwrap_or_default()
    }

    fn angular_velocity(&self, body: BodyHandle) -> Vec3 {
        self.body(body).map(|b| b.ang_vel).unwrap_or_default()
    }

    fn apply_body_op(&mut self, body: BodyHandle, op: BodyOp) {
        let Some(b) = self.body_mut(body) else { return };
        match op {
            BodyOp::ApplyCentralImpulse(impulse) => {
                b.lin_vel += impulse.scale(b.lin_factor) * b.inv_mass;
            }
            BodyOp::ApplyImpulse { impulse, rel_pos } => {
                b.lin_vel += impulse.scale(b.lin_factor) * b.inv_mass;
                b.ang_vel += rel_pos.cross(impulse).scale(b.inv_inertia).scale(b.ang_factor);
            }
            BodyOp::ApplyTorque(torque) => b.torque += torque,
            BodyOp::ApplyCentralForce(force) => b.force += force,
            BodyOp::ApplyForce { force, rel_pos } => {
                b.force += force;
                b.torque += rel_pos.cross(force);
            }
            BodyOp::SetAngularVelocity(v) => b.ang_vel = v,
            BodyOp::SetLinearVelocity(v) => b.lin_vel = v,
            BodyOp::SetAngularFactor(f) => b.ang_factor = f,
            BodyOp::SetLinearFactor(f) => b.lin_factor = f,
            BodyOp::SetDamping { linear, angular } => {
                b.lin_damping = linear;
                b.ang_damping = angular;
            }
            BodyOp::SetCcdMotionThreshold(t) => b.ccd_motion_threshold = t,
            BodyOp::SetCcdSweptSphereRadius(r) => b.ccd_swept_sphere_radius = r,
        }
    }

    fn set_activation_state(&mut self, body: BodyHandle, state: i32) {
        if let Some(b) = self.body_mut(body) {
            b.activation_state = state;
        }
    }

    fn set_collision_flags(&mut self, body: BodyHandle, flags: i32) {
        if let Some(b) = self.body_mut(body) {
            b.collision_flags = flags;
        }
    }

    fn activate(&mut self, body: BodyHandle) {
        if let Some(b) = self.body_mut(body) {
            // Bodies that must never sleep keep their state
            if b.activation_state != super::DISABLE_DEACTIVATION {
                b.activation_state = 1;
            }
        }
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(Self::body_index(body)) {
            *slot = None;
        }
        self.manifolds.retain(|m| m.body0 != body && m.body1 != body);
    }

    fn create_soft_body(&mut self, geometry: &SoftBodyGeometry<'_>) -> Option<BodyHandle> {
        let node = |x: Vec3| KNode { x, v: Vec3::zero(), inv_mass: 1.0, normal: Vec3::zero(), anchor: None };
        let (nodes, faces) = match geometry {
            SoftBodyGeometry::TriMesh { vertices, indices } => {
                if vertices.len() < 3 || indices.len() < 3 {
                    return None;
                }
                let nodes: Vec<KNode> = vertices.chunks_exact(3).map(|v| node(Vec3::from_slice(v))).collect();
                let mut faces = Vec::with_capacity(indices.len() / 3);
                for tri in indices.chunks_exact(3) {
                    let face = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                    if face.iter().any(|&i| i >= nodes.len()) {
                        return None;
                    }
                    faces.push(face);
                }
                (nodes, faces)
            }
            SoftBodyGeometry::Patch { corners, res_x, res_y, fixeds, gen_diags } => {
                let (rx, ry) = ((*res_x).max(2) as usize, (*res_y).max(2) as usize);
                let lerp = |a: Vec3, b: Vec3, t: f32| a + (b - a) * t;
                let mut nodes = Vec::with_capacity(rx * ry);
                for iy in 0..ry {
                    let ty = iy as f32 / (ry - 1) as f32;
                    let py0 = lerp(corners[0], corners[2], ty);
                    let py1 = lerp(corners[1], corners[3], ty);
                    for ix in 0..rx {
                        let tx = ix as f32 / (rx - 1) as f32;
                        nodes.push(node(lerp(py0, py1, tx)));
                    }
                }
                let idx = |x: usize, y: usize| y * rx + x;
                for (bit, i) in [(1u32, idx(0, 0)), (2, idx(rx - 1, 0)), (4, idx(0, ry - 1)), (8, idx(rx - 1, ry - 1))] {
                    if fixeds & bit != 0 {
                        nodes[i].inv_mass = 0.0;
                    }
                }
                let mut faces = Vec::new();
                if *gen_diags {
                    for iy in 0..ry - 1 {
                        for ix in 0..rx - 1 {
                            let (n00, n10, n01, n11) = (idx(ix, iy), idx(ix + 1, iy), idx(ix, iy + 1), idx(ix + 1, iy + 1));
                            faces.push([n00, n10, n11]);
                            faces.push([n11, n01, n00]);
                        }
                    }
                }
                (nodes, faces)
            }
            SoftBodyGeometry::Rope { from, to, resolution, fixeds } => {
                let count = *resolution as usize + 2;
                let mut nodes: Vec<KNode> = (0..count)
                    .map(|i| node(*from + (*to - *from) * (i as f32 / (count - 1) as f32)))
                    .collect();
                if fixeds & 1 != 0 {
                    nodes[0].inv_mass = 0.0;
                }
                if fixeds & 2 != 0 {
                    nodes[count - 1].inv_mass = 0.0;
                }
                (nodes, Vec::new())
            }
        };
        if nodes.is_empty() {
            return None;
        }
        let mut soft = KSoft { nodes, faces, config: SoftBodyConfig::default(), joints: Vec::new() };
        Self::refresh_normals(&mut soft);

        let mut body = Self::blank_body(Transform::identity());
        body.soft = Some(soft);
        Some(self.push_body(body))
    }

    fn configure_soft_body(&mut self, body: BodyHandle, config: &SoftBodyConfig) {
        if let Some(soft) = self.soft_mut(body) {
            soft.config = config.clone();
        }
    }

    fn rotate_soft_body(&mut self, body: BodyHandle, rotation: Quat) {
        if let Some(soft) = self.soft_mut(body) {
            for n in soft.nodes.iter_mut() {
                n.x = rotation.rotate(n.x);
            }
            Self::refresh_normals(soft);
        }
    }

    fn translate_soft_body(&mut self, body: BodyHandle, offset: Vec3) {
        if let Some(soft) = self.soft_mut(body) {
            for n in soft.nodes.iter_mut() {
                n.x += offset;
            }
        }
    }

    fn scale_soft_body(&mut self, body: BodyHandle, scale: Vec3) {
        if let Some(soft) = self.soft_mut(body) {
            for n in soft.nodes.iter_mut() {
                n.x = n.x.scale(scale);
            }
            Self::refresh_normals(soft);
        }
    }

    fn set_soft_total_mass(&mut self, body: BodyHandle, mass: f32) {
        let Some(b) = self.body_mut(body) else { return };
        b.mass = mass;
        let Some(soft) = b.soft.as_mut() else { return };
        let count = soft.nodes.len() as f32;
        for n in soft.nodes.iter_mut() {
            if n.inv_mass > 0.0 {
                n.inv_mass = if mass > 0.0 { count / mass } else { 0.0 };
            }
        }
    }

    fn add_soft_body(&mut self, body: BodyHandle, filter: CollisionFilter) {
        if let Some(b) = self.body_mut(body) {
            b.filter = filter;
            b.in_world = true;
        }
    }

    fn remove_soft_body(&mut self, body: BodyHandle) {
        if let Some(b) = self.body_mut(body) {
            b.in_world = false;
        }
    }

    fn transform_soft_body(&mut self, body: BodyHandle, transform: Transform) {
        if let Some(soft) = self.soft_mut(body) {
            for n in soft.nodes.iter_mut() {
                n.x = transform.apply(n.x);
            }
            Self::refresh_normals(soft);
        }
    }

    fn soft_node_count(&self, body: BodyHandle) -> usize {
        self.body(body).and_then(|b| b.soft.as_ref()).map(|s| s.nodes.len()).unwrap_or(0)
    }

    fn soft_face_count(&self, body: BodyHandle) -> usize {
        self.body(body).and_then(|b| b.soft.as_ref()).map(|s| s.faces.len()).unwrap_or(0)
    }

    fn soft_node(&self, body: BodyHandle, index: usize) -> SoftNode {
        self.body(body)
            .and_then(|b| b.soft.as_ref())
            .and_then(|s| s.nodes.get(index))
            .map(|n| SoftNode { position: n.x, normal: n.normal })
            .unwrap_or_default()
    }

    fn soft_face(&self, body: BodyHandle, index: usize) -> [usize; 3] {
        self.body(body)
            .and_then(|b| b.soft.as_ref())
            .and_then(|s| s.faces.get(index).copied())
            .unwrap_or([0, 0, 0])
    }

    fn append_anchor(&mut self, soft: BodyHandle, node: usize, rigid: BodyHandle, _disable_collision: bool, _influence: f32) {
        let Some(rigid_transform) = self.body(rigid).map(|b| b.transform) else { return };
        let Some(s) = self.soft_mut(soft) else { return };
        let Some(n) = s.nodes.get_mut(node) else { return };
        let inverse = Quat::new(-rigid_transform.rotation.x, -rigid_transform.rotation.y, -rigid_transform.rotation.z, rigid_transform.rotation.w);
        let local = inverse.rotate(n.x - rigid_transform.origin);
        n.anchor = Some((rigid, local));
    }

    fn append_linear_joint(&mut self, soft: BodyHandle, other: BodyHandle, specs: &LinearJointSpecs) {
        if let Some(s) = self.soft_mut(soft) {
            s.joints.push((other, *specs));
        }
    }

    fn create_constraint(&mut self, body_a: BodyHandle, body_b: Option<BodyHandle>, frame: &ConstraintFrame) -> ConstraintHandle {
        self.constraints.push(Some(KConstraint {
            body_a,
            body_b,
            frame: *frame,
            feedback: false,
            in_world: false,
            breaking_impulse_threshold: f32::MAX,
            applied: Vec::new(),
        }));
        ConstraintHandle(self.constraints.len() as u32 - 1)
    }

    fn enable_feedback(&mut self, constraint: ConstraintHandle, enabled: bool) {
        if let Some(Some(c)) = self.constraints.get_mut(constraint.0 as usize) {
            c.feedback = enabled;
        }
    }

    fn add_constraint(&mut self, constraint: ConstraintHandle) {
        if let Some(Some(c)) = self.constraints.get_mut(constraint.0 as usize) {
            c.in_world = true;
        }
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        if let Some(Some(c)) = self.constraints.get_mut(constraint.0 as usize) {
            c.in_world = false;
        }
    }

    fn destroy_constraint(&mut self, constraint: ConstraintHandle) {
        if let Some(slot) = self.constraints.get_mut(constraint.0 as usize) {
            *slot = None;
        }
    }

    fn apply_constraint_op(&mut self, constraint: ConstraintHandle, op: &ConstraintOp) {
        if let Some(Some(c)) = self.constraints.get_mut(constraint.0 as usize) {
            if let ConstraintOp::SetBreakingImpulseThreshold(t) = op {
                c.breaking_impulse_threshold = *t;
            }
            c.applied.push(*op);
        }
    }

    fn breaking_impulse_threshold(&self, constraint: ConstraintHandle) -> f32 {
        self.constraint(constraint)
            .map(|c| c.breaking_impulse_threshold)
            .unwrap_or(f32::MAX)
    }

    fn create_vehicle(&mut self, chassis: BodyHandle, tuning: &VehicleTuning) -> VehicleHandle {
        self.vehicles.push(Some(KVehicle {
            chassis,
            tuning: *tuning,
            axes: [0, 1, 2],
            wheels: Vec::new(),
            in_world: false,
        }));
        VehicleHandle(self.vehicles.len() as u32 - 1)
    }

    fn set_coordinate_system(&mut self, vehicle: VehicleHandle, right: usize, up: usize, forward: usize) {
        if let Some(v) = self.vehicle_mut(vehicle) {
            v.axes = [right.min(2), up.min(2), forward.min(2)];
        }
    }

    fn add_vehicle(&mut self, vehicle: VehicleHandle) {
        if let Some(v) = self.vehicle_mut(vehicle) {
            v.in_world = true;
        }
    }

    fn remove_vehicle(&mut self, vehicle: VehicleHandle) {
        if let Some(v) = self.vehicle_mut(vehicle) {
            v.in_world = false;
        }
    }

    fn destroy_vehicle(&mut self, vehicle: VehicleHandle) {
        if let Some(slot) = self.vehicles.get_mut(vehicle.0 as usize) {
            *slot = None;
        }
    }

    fn add_wheel(&mut self, vehicle: VehicleHandle, wheel: &WheelInfo, tuning: &VehicleTuning) {
        if let Some(v) = self.vehicle_mut(vehicle) {
            v.wheels.push(KWheel { info: *wheel, tuning: *tuning, state: WheelState::default() });
        }
    }

    fn wheel_count(&self, vehicle: VehicleHandle) -> usize {
        self.vehicle(vehicle).map(|v| v.wheels.len()).unwrap_or(0)
    }

    fn wheel_transform(&self, vehicle: VehicleHandle, wheel: usize) -> Transform {
        let Some(v) = self.vehicle(vehicle) else { return Transform::identity() };
        let Some(w) = v.wheels.get(wheel) else { return Transform::identity() };
        let chassis = self.center_of_mass_transform(v.chassis);

        let hard_point = chassis.apply(w.info.connection_point);
        let direction = chassis.rotation.rotate(w.info.direction);
        let origin = hard_point + direction * w.info.suspension_rest_length;

        let mut up = [0.0f32; 3];
        up[v.axes[1]] = 1.0;
        let steer = Quat::from_axis_angle(Vec3::new(up[0], up[1], up[2]), w.state.steering);
        Transform::new(origin, (chassis.rotation * steer).normalize())
    }

    fn apply_vehicle_op(&mut self, vehicle: VehicleHandle, op: VehicleOp) {
        let Some(v) = self.vehicle_mut(vehicle) else { return };
        match op {
            VehicleOp::Steering { value, wheel } => {
                if let Some(w) = v.wheels.get_mut(wheel) {
                    w.state.steering = value;
                }
            }
            VehicleOp::Brake { value, wheel } => {
                if let Some(w) = v.wheels.get_mut(wheel) {
                    w.state.brake = value;
                }
            }
            VehicleOp::EngineForce { value, wheel } => {
                if let Some(w) = v.wheels.get_mut(wheel) {
                    w.state.engine_force = value;
                }
            }
        }
    }

    fn num_manifolds(&self) -> usize {
        self.manifolds.len()
    }

    fn manifold(&self, index: usize) -> Manifold {
        let m = self.manifolds[index];
        Manifold { body0: m.body0, body1: m.body1, num_contacts: m.num_contacts }
    }

    fn contact_point(&self, manifold: usize, _contact: usize) -> ContactPoint {
        ContactPoint { normal_world_on_b: self.manifolds[manifold].normal_on_b }
    }
}
