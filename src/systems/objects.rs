//! Object registry - rigid and soft bodies keyed by controller id
//!
//! Owns every body handle the worker created. Both directions of the
//! `id <-> kernel handle` mapping are kept so collision manifolds (which only
//! know kernel handles) can be reported with controller ids.

use std::collections::HashMap;

use log::debug;

use crate::core::{Quat, Slots, Transform, Vec3};
use crate::domain::ObjectDescription;
use crate::error::{WorkerError, WorkerResult};
use crate::kernel::{
    BodyHandle, BodyOp, CollisionFilter, LinearJointSpecs, MotionStateHandle, PhysicsKernel,
    RigidBodyInfo, ShapeHandle, SoftBodyConfig, SoftBodyGeometry, DISABLE_DEACTIVATION,
};

use super::shape_cache::ShapeCache;

/// Soft bodies always collide with their own world only
const SOFT_COLLISIONS: u32 = 0x11;
const SOFT_DEFAULT_MARGIN: f32 = 0.1;

/// Soft-body flavour; decides the report layout of the body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoftShape {
    Rope,
    Cloth,
    TriMesh,
}

impl SoftShape {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "softRopeMesh" => Some(SoftShape::Rope),
            "softClothMesh" => Some(SoftShape::Cloth),
            "softTrimesh" => Some(SoftShape::TriMesh),
            _ => None,
        }
    }

    /// Floats written per reported item (node for rope/cloth, face for trimesh)
    pub fn floats_per_item(self) -> usize {
        match self {
            SoftShape::Rope => 3,
            SoftShape::Cloth => 6,
            SoftShape::TriMesh => 18,
        }
    }

    /// Items reported for a body with this many nodes/faces
    pub fn item_count(self, nodes: usize, faces: usize) -> usize {
        match self {
            SoftShape::Rope | SoftShape::Cloth => nodes,
            SoftShape::TriMesh => faces,
        }
    }

    /// Contribution to the soft report's size term
    pub fn report_size(self, nodes: usize, faces: usize) -> usize {
        match self {
            SoftShape::Rope => nodes,
            SoftShape::Cloth => nodes * 3,
            SoftShape::TriMesh => faces * 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyKind {
    Rigid {
        motion_state: MotionStateHandle,
        shape: ShapeHandle,
        /// Filter used on insertion; re-used when the body is re-added
        filter: Option<CollisionFilter>,
    },
    Soft {
        shape: SoftShape,
        report_size: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub id: u32,
    pub handle: BodyHandle,
    pub kind: BodyKind,
}

impl Body {
    pub fn is_soft(&self) -> bool {
        matches!(self.kind, BodyKind::Soft { .. })
    }
}

pub struct ObjectRegistry {
    bodies: Slots<Body>,
    by_handle: HashMap<BodyHandle, u32>,
    rigid_count: usize,
    soft_count: usize,
    soft_report_size: usize,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            bodies: Slots::new(),
            by_handle: HashMap::new(),
            rigid_count: 0,
            soft_count: 0,
            soft_report_size: 0,
        }
    }

    // === QUERIES ===

    pub fn get(&self, id: u32) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn handle(&self, id: u32) -> Option<BodyHandle> {
        self.bodies.get(id).map(|b| b.handle)
    }

    /// Controller id of a kernel body, if the worker created it
    pub fn id_of(&self, handle: BodyHandle) -> Option<u32> {
        self.by_handle.get(&handle).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.bodies.contains(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.bodies.ids()
    }

    pub fn rigid_count(&self) -> usize {
        self.rigid_count
    }

    pub fn soft_count(&self) -> usize {
        self.soft_count
    }

    /// Sum of every soft body's report-size contribution
    pub fn soft_report_size(&self) -> usize {
        self.soft_report_size
    }

    pub fn rigid_bodies(&self) -> impl Iterator<Item = &Body> + '_ {
        self.bodies.iter().map(|(_, b)| b).filter(|b| !b.is_soft())
    }

    pub fn soft_bodies(&self) -> impl Iterator<Item = (&Body, SoftShape)> + '_ {
        self.bodies.iter().filter_map(|(_, b)| match b.kind {
            BodyKind::Soft { shape, .. } => Some((b, shape)),
            BodyKind::Rigid { .. } => None,
        })
    }

    // === LIFECYCLE ===

    /// Build a body from `desc` and insert it into the world.
    ///
    /// Nothing is registered when this fails.
    pub fn add<K: PhysicsKernel>(
        &mut self,
        kernel: &mut K,
        shapes: &mut ShapeCache,
        desc: &ObjectDescription,
    ) -> WorkerResult<()> {
        if self.bodies.contains(desc.id) {
            return Err(WorkerError::DuplicateId(desc.id));
        }

        let body = if desc.shape.is_soft() {
            self.build_soft(kernel, desc)?
        } else {
            match self.build_rigid(kernel, shapes, desc) {
                Ok(body) => body,
                Err(e) => {
                    shapes.release_owned(kernel, desc.id);
                    return Err(e);
                }
            }
        };

        kernel.activate(body.handle);
        match body.kind {
            BodyKind::Rigid { .. } => self.rigid_count += 1,
            BodyKind::Soft { report_size, .. } => {
                self.soft_count += 1;
                self.soft_report_size += report_size;
            }
        }
        self.by_handle.insert(body.handle, body.id);
        // Checked above
        let _ = self.bodies.insert(body.id, body);
        debug!("object {} added ({:?})", body.id, body.kind);
        Ok(())
    }

    fn build_rigid<K: PhysicsKernel>(
        &self,
        kernel: &mut K,
        shapes: &mut ShapeCache,
        desc: &ObjectDescription,
    ) -> WorkerResult<Body> {
        let mut shape = shapes.get_or_create(kernel, &desc.shape, desc.id)?;
        if let Some(children) = desc.children.as_deref() {
            shape = shapes.wrap_compound(kernel, shape, children, desc.id)?;
        }

        kernel.set_local_scaling(shape, desc.scale);
        kernel.set_margin(shape, desc.margin.unwrap_or(0.0));
        let local_inertia = kernel.calculate_local_inertia(shape, desc.mass);

        let motion_state = kernel.create_motion_state(Transform::new(desc.position, desc.rotation));
        let handle = kernel.create_rigid_body(&RigidBodyInfo {
            mass: desc.mass,
            local_inertia,
            shape,
            motion_state,
            friction: desc.friction,
            restitution: desc.restitution,
            linear_damping: desc.damping,
            angular_damping: desc.damping,
        });
        kernel.set_activation_state(handle, activation_state(desc.state));
        if let Some(flags) = desc.collision_flags {
            kernel.set_collision_flags(handle, flags);
        }

        let filter = match (desc.group, desc.mask) {
            (Some(group), Some(mask)) if group != 0 && mask != 0 => Some(CollisionFilter { group, mask }),
            _ => None,
        };
        kernel.add_rigid_body(handle, filter);

        Ok(Body {
            id: desc.id,
            handle,
            kind: BodyKind::Rigid { motion_state, shape, filter },
        })
    }

    fn build_soft<K: PhysicsKernel>(&self, kernel: &mut K, desc: &ObjectDescription) -> WorkerResult<Body> {
        let shape_desc = &desc.shape;
        let soft_shape =
            SoftShape::from_kind(&shape_desc.kind).ok_or_else(|| WorkerError::UnknownShape(shape_desc.kind.clone()))?;

        let geometry = match soft_shape {
            SoftShape::TriMesh => {
                if shape_desc.vertices.is_empty() || shape_desc.indices.len() < 3 {
                    return Err(WorkerError::EmptyGeometry("soft trimesh"));
                }
                SoftBodyGeometry::TriMesh {
                    vertices: &shape_desc.vertices,
                    indices: &shape_desc.indices,
                }
            }
            SoftShape::Cloth => {
                let cr = &shape_desc.corners;
                if cr.len() < 12 || shape_desc.segments.len() < 2 {
                    return Err(WorkerError::EmptyGeometry("cloth patch"));
                }
                SoftBodyGeometry::Patch {
                    corners: [
                        Vec3::from_slice(&cr[0..3]),
                        Vec3::from_slice(&cr[3..6]),
                        Vec3::from_slice(&cr[6..9]),
                        Vec3::from_slice(&cr[9..12]),
                    ],
                    res_x: shape_desc.segments[0],
                    res_y: shape_desc.segments[1],
                    fixeds: 0,
                    gen_diags: true,
                }
            }
            SoftShape::Rope => {
                let d = &shape_desc.data;
                if d.len() < 7 {
                    return Err(WorkerError::EmptyGeometry("rope"));
                }
                // Controller sends the node count; the kernel wants inner nodes + 1
                SoftBodyGeometry::Rope {
                    from: Vec3::from_slice(&d[0..3]),
                    to: Vec3::from_slice(&d[3..6]),
                    resolution: (d[6].max(0.0) as u32).saturating_sub(1),
                    fixeds: 0,
                }
            }
        };

        let handle = kernel
            .create_soft_body(&geometry)
            .ok_or(WorkerError::EmptyGeometry("soft body"))?;

        kernel.configure_soft_body(handle, &soft_config(desc));
        kernel.set_activation_state(handle, activation_state(desc.state));

        kernel.rotate_soft_body(handle, desc.rotation);
        kernel.translate_soft_body(handle, desc.position);
        kernel.scale_soft_body(handle, desc.scale);
        kernel.set_soft_total_mass(handle, desc.mass);
        kernel.add_soft_body(handle, CollisionFilter::SOFT_DEFAULT);

        let report_size = soft_shape.report_size(kernel.soft_node_count(handle), kernel.soft_face_count(handle));
        Ok(Body {
            id: desc.id,
            handle,
            kind: BodyKind::Soft { shape: soft_shape, report_size },
        })
    }

    /// Take the body out of the world and release everything it owns
    pub fn remove<K: PhysicsKernel>(&mut self, kernel: &mut K, shapes: &mut ShapeCache, id: u32) -> WorkerResult<()> {
        let body = self.bodies.remove(id).ok_or(WorkerError::MissingBody(id))?;
        match body.kind {
            BodyKind::Soft { report_size, .. } => {
                self.soft_count -= 1;
                self.soft_report_size -= report_size;
                kernel.remove_soft_body(body.handle);
            }
            BodyKind::Rigid { motion_state, .. } => {
                self.rigid_count -= 1;
                kernel.remove_rigid_body(body.handle);
                kernel.destroy_motion_state(motion_state);
            }
        }
        kernel.destroy_body(body.handle);
        shapes.release_owned(kernel, id);
        self.by_handle.remove(&body.handle);
        debug!("object {} removed", id);
        Ok(())
    }

    // === MUTATION ===

    /// Overwrite position and/or rotation.
    ///
    /// Rigid bodies keep whatever part is not given; soft bodies get a fresh
    /// transform built from identity.
    pub fn update_transform<K: PhysicsKernel>(
        &self,
        kernel: &mut K,
        id: u32,
        pos: Option<Vec3>,
        quat: Option<Quat>,
    ) -> WorkerResult<()> {
        let body = self.bodies.get(id).ok_or(WorkerError::MissingBody(id))?;
        let mut transform = match body.kind {
            BodyKind::Rigid { .. } => kernel.motion_state_transform(body.handle),
            BodyKind::Soft { .. } => Transform::identity(),
        };
        if let Some(pos) = pos {
            transform.origin = pos;
        }
        if let Some(quat) = quat {
            transform.rotation = quat;
        }

        match body.kind {
            BodyKind::Rigid { .. } => {
                kernel.set_world_transform(body.handle, transform);
                kernel.activate(body.handle);
            }
            BodyKind::Soft { .. } => kernel.transform_soft_body(body.handle, transform),
        }
        Ok(())
    }

    /// Change mass. The body leaves the world while its mass properties change.
    pub fn update_mass<K: PhysicsKernel>(&self, kernel: &mut K, id: u32, mass: f32) -> WorkerResult<()> {
        let body = self.bodies.get(id).ok_or(WorkerError::MissingBody(id))?;
        match body.kind {
            BodyKind::Rigid { shape, filter, .. } => {
                kernel.remove_rigid_body(body.handle);
                let inertia = kernel.calculate_local_inertia(shape, mass);
                kernel.set_mass_props(body.handle, mass, inertia);
                kernel.add_rigid_body(body.handle, filter);
            }
            BodyKind::Soft { .. } => {
                kernel.remove_soft_body(body.handle);
                kernel.set_soft_total_mass(body.handle, mass);
                kernel.add_soft_body(body.handle, CollisionFilter::SOFT_DEFAULT);
            }
        }
        kernel.activate(body.handle);
        Ok(())
    }

    /// Apply a per-body op. Absent ids are ignored (returns `false`).
    pub fn apply<K: PhysicsKernel>(&self, kernel: &mut K, id: u32, op: BodyOp) -> bool {
        let Some(handle) = self.handle(id) else {
            debug!("body op {:?} for unknown object {}", op, id);
            return false;
        };
        kernel.apply_body_op(handle, op);
        if wakes_body(&op) {
            kernel.activate(handle);
        }
        true
    }

    /// Pin soft node `node` of `soft` to rigid body `rigid`
    pub fn append_anchor<K: PhysicsKernel>(
        &self,
        kernel: &mut K,
        soft: u32,
        node: usize,
        rigid: u32,
        disable_collision: bool,
        influence: f32,
    ) -> bool {
        match (self.soft_handle(soft), self.handle(rigid)) {
            (Some(s), Some(r)) => {
                kernel.append_anchor(s, node, r, disable_collision, influence);
                true
            }
            _ => false,
        }
    }

    pub fn append_linear_joint<K: PhysicsKernel>(
        &self,
        kernel: &mut K,
        soft: u32,
        other: u32,
        specs: &LinearJointSpecs,
    ) -> bool {
        match (self.soft_handle(soft), self.handle(other)) {
            (Some(s), Some(o)) => {
                kernel.append_linear_joint(s, o, specs);
                true
            }
            _ => false,
        }
    }

    fn soft_handle(&self, id: u32) -> Option<BodyHandle> {
        self.bodies.get(id).filter(|b| b.is_soft()).map(|b| b.handle)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `0` / absent means "never sleep"
fn activation_state(state: Option<i32>) -> i32 {
    match state {
        Some(s) if s != 0 => s,
        _ => DISABLE_DEACTIVATION,
    }
}

/// Ops that change momentum wake the body; factor/damping/CCD tweaks don't
fn wakes_body(op: &BodyOp) -> bool {
    matches!(
        op,
        BodyOp::ApplyCentralImpulse(_)
            | BodyOp::ApplyImpulse { .. }
            | BodyOp::ApplyTorque(_)
            | BodyOp::ApplyCentralForce(_)
            | BodyOp::ApplyForce { .. }
            | BodyOp::SetAngularVelocity(_)
            | BodyOp::SetLinearVelocity(_)
    )
}

fn soft_config(desc: &ObjectDescription) -> SoftBodyConfig {
    let m = &desc.soft;
    let iterations = |v: Option<u32>| v.filter(|&n| n > 0);
    let coefficient = |v: Option<f32>| v.filter(|&k| k != 0.0);
    SoftBodyConfig {
        viterations: iterations(m.viterations),
        piterations: iterations(m.piterations),
        diterations: iterations(m.diterations),
        citerations: iterations(m.citerations),
        collisions: SOFT_COLLISIONS,
        friction: desc.friction,
        damping: desc.damping,
        pressure: coefficient(m.pressure),
        drag: coefficient(m.drag),
        lift: coefficient(m.lift),
        anchor_hardness: coefficient(m.anchor_hardness),
        rigid_hardness: coefficient(m.rigid_hardness),
        linear_stiffness: coefficient(m.klst),
        angular_stiffness: coefficient(m.kast),
        volume_stiffness: coefficient(m.kvst),
        margin: desc.margin.unwrap_or(SOFT_DEFAULT_MARGIN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorldConfig;
    use crate::kernel::ReferenceKernel;

    struct Fixture {
        kernel: ReferenceKernel,
        shapes: ShapeCache,
        objects: ObjectRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let mut kernel = ReferenceKernel::new();
            kernel.create_world(&WorldConfig::default());
            Self { kernel, shapes: ShapeCache::new(), objects: ObjectRegistry::new() }
        }

        fn add(&mut self, json: &str) -> WorkerResult<()> {
            let desc: ObjectDescription = serde_json::from_str(json).unwrap();
            self.objects.add(&mut self.kernel, &mut self.shapes, &desc)
        }
    }

    #[test]
    fn rigid_add_maps_both_directions() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 9, "type": "sphere", "radius": 1, "mass": 2}"#).unwrap();

        let handle = f.objects.handle(9).unwrap();
        assert_ne!(handle.0, 9);
        assert_eq!(f.objects.id_of(handle), Some(9));
        assert_eq!(f.objects.rigid_count(), 1);
        assert!(f.kernel.is_in_world(handle));
        assert_eq!(f.kernel.activation_state(handle), Some(DISABLE_DEACTIVATION));
    }

    #[test]
    fn group_and_mask_are_used_only_together() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 1, "type": "box", "width": 1, "height": 1, "depth": 1, "group": 2}"#).unwrap();
        f.add(r#"{"id": 2, "type": "box", "width": 1, "height": 1, "depth": 1, "group": 2, "mask": 4}"#).unwrap();

        let only_group = f.objects.get(1).unwrap().kind;
        assert!(matches!(only_group, BodyKind::Rigid { filter: None, .. }));
        let h2 = f.objects.handle(2).unwrap();
        assert_eq!(f.kernel.body_filter(h2), Some(CollisionFilter { group: 2, mask: 4 }));
    }

    #[test]
    fn duplicate_and_unknown_ids_are_errors() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 1, "type": "sphere", "radius": 1}"#).unwrap();
        assert!(matches!(
            f.add(r#"{"id": 1, "type": "sphere", "radius": 1}"#),
            Err(WorkerError::DuplicateId(1))
        ));
        assert!(matches!(
            f.objects.remove(&mut f.kernel, &mut f.shapes, 42),
            Err(WorkerError::MissingBody(42))
        ));
    }

    #[test]
    fn failed_compound_child_leaves_nothing_behind() {
        let mut f = Fixture::new();
        let err = f
            .add(r#"{"id": 3, "type": "sphere", "radius": 1, "children": [{"type": "bogus"}]}"#)
            .unwrap_err();
        assert!(matches!(err, WorkerError::UnknownShape(_)));
        assert!(f.objects.is_empty());
        assert_eq!(f.shapes.owned_count(3), 0);
        assert_eq!(f.kernel.live_body_count(), 0);
    }

    #[test]
    fn remove_releases_motion_state_and_owned_shapes() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 5, "type": "convex", "data": [0,0,0, 1,0,0, 0,1,0], "mass": 1}"#).unwrap();
        assert_eq!(f.kernel.live_motion_state_count(), 1);

        f.objects.remove(&mut f.kernel, &mut f.shapes, 5).unwrap();
        assert_eq!(f.kernel.live_motion_state_count(), 0);
        assert_eq!(f.kernel.live_shape_count(), 0);
        assert_eq!(f.kernel.live_body_count(), 0);
        assert_eq!(f.objects.rigid_count(), 0);
    }

    #[test]
    fn update_mass_leaves_world_while_changing() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 2, "type": "sphere", "radius": 1, "mass": 1,
                  "position": {"x": 1, "y": 2, "z": 3}}"#)
            .unwrap();
        f.objects.update_mass(&mut f.kernel, 2, 10.0).unwrap();

        let h = f.objects.handle(2).unwrap();
        assert_eq!(f.kernel.unsafe_mass_changes(), 0);
        assert_eq!(f.kernel.body_mass(h), Some(10.0));
        assert!(f.kernel.is_in_world(h));
        assert_eq!(f.kernel.center_of_mass_transform(h).origin, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn partial_transform_update_keeps_rotation() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 1, "type": "sphere", "radius": 1,
                  "rotation": {"x": 0, "y": 1, "z": 0, "w": 0}}"#)
            .unwrap();
        f.objects
            .update_transform(&mut f.kernel, 1, Some(Vec3::new(4.0, 5.0, 6.0)), None)
            .unwrap();

        let t = f.kernel.center_of_mass_transform(f.objects.handle(1).unwrap());
        assert_eq!(t.origin, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(t.rotation, Quat::new(0.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn soft_report_size_tracks_add_and_remove() {
        let mut f = Fixture::new();
        // 4 requested -> resolution 3 -> 5 kernel nodes
        f.add(r#"{"id": 1, "type": "softRopeMesh", "data": [0,0,0, 0,4,0, 4], "mass": 1}"#).unwrap();
        f.add(r#"{"id": 2, "type": "softClothMesh", "corners": [0,0,0, 1,0,0, 0,0,1, 1,0,1],
                  "segments": [3, 3], "mass": 1}"#)
            .unwrap();

        assert_eq!(f.objects.soft_count(), 2);
        assert_eq!(f.objects.soft_report_size(), 5 + 9 * 3);

        let rope = f.objects.handle(1).unwrap();
        let cfg = f.kernel.soft_config(rope).unwrap();
        assert_eq!(cfg.collisions, SOFT_COLLISIONS);
        assert_eq!(cfg.margin, SOFT_DEFAULT_MARGIN);

        f.objects.remove(&mut f.kernel, &mut f.shapes, 2).unwrap();
        assert_eq!(f.objects.soft_report_size(), 5);
    }

    #[test]
    fn empty_soft_geometry_registers_nothing() {
        let mut f = Fixture::new();
        let err = f.add(r#"{"id": 1, "type": "softTrimesh", "aVertices": [], "aIndices": []}"#).unwrap_err();
        assert!(matches!(err, WorkerError::EmptyGeometry(_)));
        assert!(f.objects.is_empty());
    }

    #[test]
    fn body_ops_skip_unknown_ids() {
        let mut f = Fixture::new();
        f.add(r#"{"id": 1, "type": "sphere", "radius": 1, "mass": 1}"#).unwrap();
        assert!(f.objects.apply(&mut f.kernel, 1, BodyOp::SetLinearVelocity(Vec3::new(1.0, 0.0, 0.0))));
        assert!(!f.objects.apply(&mut f.kernel, 2, BodyOp::SetLinearVelocity(Vec3::zero())));
        let h = f.objects.handle(1).unwrap();
        assert_eq!(f.kernel.linear_velocity(h), Vec3::new(1.0, 0.0, 0.0));
    }
}
