//! Constraint registry
//!
//! Constraints reference bodies by controller id. Frames are always handed to
//! the kernel in each body's local space; Euler angles from the controller are
//! turned into rotations here.

use std::f32::consts::PI;

use log::debug;

use crate::core::{Quat, Slots, Transform, Vec3};
use crate::domain::ConstraintDescription;
use crate::error::{WorkerError, WorkerResult};
use crate::kernel::{ConstraintFrame, ConstraintHandle, ConstraintOp, PhysicsKernel};

use super::objects::ObjectRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    Point,
    Hinge,
    Slider,
    ConeTwist,
    Dof,
}

impl ConstraintKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "point" => Some(ConstraintKind::Point),
            "hinge" => Some(ConstraintKind::Hinge),
            "slider" => Some(ConstraintKind::Slider),
            "conetwist" => Some(ConstraintKind::ConeTwist),
            "dof" => Some(ConstraintKind::Dof),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraint {
    pub id: u32,
    pub kind: ConstraintKind,
    pub body_a: u32,
    pub body_b: Option<u32>,
    pub handle: ConstraintHandle,
    /// Pivot on body A, reported every frame
    pub anchor_origin: Vec3,
}

pub struct ConstraintRegistry {
    constraints: Slots<Constraint>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self { constraints: Slots::new() }
    }

    pub fn get(&self, id: u32) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter().map(|(_, c)| c)
    }

    /// Whether any live constraint is attached to body `body_id`
    pub fn references(&self, body_id: u32) -> bool {
        self.iter().any(|c| c.body_a == body_id || c.body_b == Some(body_id))
    }

    /// Build, enable feedback on and add a constraint to the world
    pub fn add<K: PhysicsKernel>(
        &mut self,
        kernel: &mut K,
        objects: &ObjectRegistry,
        desc: &ConstraintDescription,
    ) -> WorkerResult<()> {
        if self.constraints.contains(desc.id) {
            return Err(WorkerError::DuplicateId(desc.id));
        }
        let kind = ConstraintKind::from_kind(&desc.kind)
            .ok_or_else(|| WorkerError::UnknownConstraint(desc.kind.clone()))?;

        let a = objects.handle(desc.objecta).ok_or(WorkerError::MissingBody(desc.objecta))?;
        let b = match desc.objectb {
            Some(id) => Some(objects.handle(id).ok_or(WorkerError::MissingBody(id))?),
            None => None,
        };

        let frame = constraint_frame(kind, desc)?;
        let handle = kernel.create_constraint(a, b, &frame);
        if kind == ConstraintKind::ConeTwist {
            kernel.apply_constraint_op(handle, &ConstraintOp::ConeTwistSetLimit { z: PI, y: 0.0, x: PI });
        }
        kernel.add_constraint(handle);
        kernel.enable_feedback(handle, true);

        let constraint = Constraint {
            id: desc.id,
            kind,
            body_a: desc.objecta,
            body_b: desc.objectb,
            handle,
            anchor_origin: desc.positiona,
        };
        // Checked above
        let _ = self.constraints.insert(desc.id, constraint);
        debug!("constraint {} ({:?}) added", desc.id, kind);
        Ok(())
    }

    /// Remove and destroy. Absent ids are a no-op (returns `false`).
    pub fn remove<K: PhysicsKernel>(&mut self, kernel: &mut K, id: u32) -> bool {
        let Some(constraint) = self.constraints.remove(id) else {
            return false;
        };
        kernel.remove_constraint(constraint.handle);
        kernel.destroy_constraint(constraint.handle);
        true
    }

    /// Forward a per-type op; motor and limit-vector changes wake both bodies
    pub fn apply<K: PhysicsKernel>(
        &self,
        kernel: &mut K,
        objects: &ObjectRegistry,
        id: u32,
        op: &ConstraintOp,
    ) -> bool {
        let Some(constraint) = self.constraints.get(id) else {
            debug!("constraint op {:?} for unknown constraint {}", op, id);
            return false;
        };
        kernel.apply_constraint_op(constraint.handle, op);
        if wakes_bodies(op) {
            let ends = std::iter::once(constraint.body_a).chain(constraint.body_b);
            for handle in ends.filter_map(|body| objects.handle(body)) {
                kernel.activate(handle);
            }
        }
        true
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn wakes_bodies(op: &ConstraintOp) -> bool {
    !matches!(
        op,
        ConstraintOp::HingeSetLimits { .. }
            | ConstraintOp::SliderSetLimits { .. }
            | ConstraintOp::SliderSetRestitution { .. }
            | ConstraintOp::ConeTwistSetLimit { .. }
            | ConstraintOp::SetBreakingImpulseThreshold(_)
    )
}

/// Controller Euler angles (x, y, z) as a ZYX rotation with negated angles
fn zyx_rotation(angles: Option<Vec3>) -> Quat {
    let a = angles.unwrap_or_default();
    Quat::from_euler_zyx(-a.z, -a.y, -a.x)
}

fn constraint_frame(kind: ConstraintKind, desc: &ConstraintDescription) -> WorkerResult<ConstraintFrame> {
    let pivot_b = desc.objectb.map(|_| desc.positionb.unwrap_or_default());
    let frame = match kind {
        ConstraintKind::Point => ConstraintFrame::Point { pivot_a: desc.positiona, pivot_b },
        ConstraintKind::Hinge => ConstraintFrame::Hinge {
            pivot_a: desc.positiona,
            pivot_b,
            axis: desc.axis.unwrap_or(Vec3::new(0.0, 1.0, 0.0)),
        },
        ConstraintKind::Slider => {
            let a = desc.axis.unwrap_or_default();
            let rotation = Quat::from_euler_ypr(a.x, a.y, a.z);
            ConstraintFrame::Slider {
                frame_a: Transform::new(desc.positiona, rotation),
                frame_b: pivot_b.map(|p| Transform::new(p, rotation)),
            }
        }
        ConstraintKind::ConeTwist => {
            let pivot_b = pivot_b.ok_or(WorkerError::MissingSecondBody { kind: "conetwist" })?;
            ConstraintFrame::ConeTwist {
                frame_a: Transform::new(desc.positiona, zyx_rotation(desc.axisa)),
                frame_b: Transform::new(pivot_b, zyx_rotation(desc.axisb)),
            }
        }
        ConstraintKind::Dof => ConstraintFrame::Dof {
            frame_a: Transform::new(desc.positiona, zyx_rotation(desc.axisa)),
            frame_b: pivot_b.map(|p| Transform::new(p, zyx_rotation(desc.axisb))),
        },
    };
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ObjectDescription, WorldConfig};
    use crate::kernel::ReferenceKernel;
    use crate::systems::ShapeCache;

    fn setup() -> (ReferenceKernel, ObjectRegistry) {
        let mut kernel = ReferenceKernel::new();
        kernel.create_world(&WorldConfig::default());
        let mut shapes = ShapeCache::new();
        let mut objects = ObjectRegistry::new();
        for id in [1, 2] {
            let desc: ObjectDescription =
                serde_json::from_str(&format!(r#"{{"id": {id}, "type": "sphere", "radius": 1, "mass": 1}}"#)).unwrap();
            objects.add(&mut kernel, &mut shapes, &desc).unwrap();
        }
        (kernel, objects)
    }

    fn desc(json: &str) -> ConstraintDescription {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn hinge_between_two_bodies() {
        let (mut kernel, objects) = setup();
        let mut constraints = ConstraintRegistry::new();
        constraints
            .add(&mut kernel, &objects, &desc(r#"{"id": 0, "type": "hinge", "objecta": 1, "objectb": 2,
                "positiona": {"x": 1, "y": 0, "z": 0}, "positionb": {"x": -1, "y": 0, "z": 0},
                "axis": {"x": 0, "y": 0, "z": 1}}"#))
            .unwrap();

        let c = *constraints.get(0).unwrap();
        assert_eq!(c.anchor_origin, Vec3::new(1.0, 0.0, 0.0));
        assert!(kernel.constraint_in_world(c.handle));
        assert!(kernel.constraint_feedback(c.handle));
        assert!(constraints.references(2));
        assert!(!constraints.references(3));
        assert_eq!(
            kernel.constraint_frame(c.handle),
            Some(ConstraintFrame::Hinge {
                pivot_a: Vec3::new(1.0, 0.0, 0.0),
                pivot_b: Some(Vec3::new(-1.0, 0.0, 0.0)),
                axis: Vec3::new(0.0, 0.0, 1.0),
            })
        );
    }

    #[test]
    fn conetwist_needs_two_bodies_and_gets_default_limit() {
        let (mut kernel, objects) = setup();
        let mut constraints = ConstraintRegistry::new();
        let err = constraints
            .add(&mut kernel, &objects, &desc(r#"{"id": 0, "type": "conetwist", "objecta": 1}"#))
            .unwrap_err();
        assert!(matches!(err, WorkerError::MissingSecondBody { .. }));
        assert!(constraints.is_empty());

        constraints
            .add(&mut kernel, &objects, &desc(r#"{"id": 0, "type": "conetwist", "objecta": 1, "objectb": 2,
                "axisa": {"x": 0, "y": 0, "z": 0}, "axisb": {"x": 0, "y": 0, "z": 0}}"#))
            .unwrap();
        let handle = constraints.get(0).unwrap().handle;
        assert_eq!(kernel.constraint_ops(handle), &[ConstraintOp::ConeTwistSetLimit { z: PI, y: 0.0, x: PI }]);
    }

    #[test]
    fn ops_on_missing_constraints_are_ignored() {
        let (mut kernel, objects) = setup();
        let mut constraints = ConstraintRegistry::new();
        assert!(!constraints.apply(&mut kernel, &objects, 5, &ConstraintOp::HingeDisableMotor));
        assert!(!constraints.remove(&mut kernel, 5));

        constraints
            .add(&mut kernel, &objects, &desc(r#"{"id": 5, "type": "point", "objecta": 1}"#))
            .unwrap();
        let handle = constraints.get(5).unwrap().handle;
        assert!(constraints.apply(&mut kernel, &objects, 5, &ConstraintOp::SetBreakingImpulseThreshold(3.0)));
        assert_eq!(kernel.breaking_impulse_threshold(handle), 3.0);

        assert!(constraints.remove(&mut kernel, 5));
        assert!(!constraints.references(1));
    }

    #[test]
    fn unknown_body_or_kind_fails() {
        let (mut kernel, objects) = setup();
        let mut constraints = ConstraintRegistry::new();
        assert!(matches!(
            constraints.add(&mut kernel, &objects, &desc(r#"{"id": 0, "type": "point", "objecta": 9}"#)),
            Err(WorkerError::MissingBody(9))
        ));
        assert!(matches!(
            constraints.add(&mut kernel, &objects, &desc(r#"{"id": 0, "type": "rope", "objecta": 1}"#)),
            Err(WorkerError::UnknownConstraint(_))
        ));
    }
}
