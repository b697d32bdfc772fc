//! Parameter records sent by the controller
//!
//! Field names follow the controller's wire names (a mix of snake_case and
//! camelCase), so most structs rename per field rather than per struct.

use serde::Deserialize;

use crate::core::{Quat, Vec3};

// === SHAPES ===

/// Shape part of an `addObject` record (also used for compound children)
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ShapeDescription {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub normal: Option<Vec3>,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub depth: f32,
    #[serde(default)]
    pub radius: f32,
    /// Triangles (concave), points (convex) or rope endpoints + node count
    #[serde(default)]
    pub data: Vec<f32>,
    #[serde(default)]
    pub xpts: u32,
    #[serde(default)]
    pub ypts: u32,
    #[serde(default)]
    pub points: Vec<f32>,
    #[serde(default, rename = "absMaxHeight")]
    pub abs_max_height: f32,
    // Soft-body geometry
    #[serde(default, rename = "aVertices")]
    pub vertices: Vec<f32>,
    #[serde(default, rename = "aIndices")]
    pub indices: Vec<u32>,
    #[serde(default)]
    pub corners: Vec<f32>,
    #[serde(default)]
    pub segments: Vec<u32>,
}

impl ShapeDescription {
    pub fn is_soft(&self) -> bool {
        self.kind.starts_with("soft")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChildShapeDescription {
    #[serde(flatten)]
    pub shape: ShapeDescription,
    #[serde(default)]
    pub position_offset: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

// === BODIES ===

/// `addObject` parameters: shape fields plus body settings
#[derive(Clone, Debug, Deserialize)]
pub struct ObjectDescription {
    pub id: u32,
    #[serde(flatten)]
    pub shape: ShapeDescription,
    #[serde(default)]
    pub mass: f32,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub margin: Option<f32>,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default)]
    pub damping: f32,
    /// Activation state; 0 falls back to "never sleep"
    #[serde(default)]
    pub state: Option<i32>,
    #[serde(default)]
    pub collision_flags: Option<i32>,
    #[serde(default)]
    pub group: Option<i32>,
    #[serde(default)]
    pub mask: Option<i32>,
    #[serde(default)]
    pub children: Option<Vec<ChildShapeDescription>>,
    #[serde(flatten)]
    pub soft: SoftMaterialDescription,
}

/// Soft-body solver knobs; absent or zero values keep kernel defaults
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftMaterialDescription {
    #[serde(default)]
    pub viterations: Option<u32>,
    #[serde(default)]
    pub piterations: Option<u32>,
    #[serde(default)]
    pub diterations: Option<u32>,
    #[serde(default)]
    pub citerations: Option<u32>,
    #[serde(default)]
    pub pressure: Option<f32>,
    #[serde(default)]
    pub drag: Option<f32>,
    #[serde(default)]
    pub lift: Option<f32>,
    #[serde(default)]
    pub anchor_hardness: Option<f32>,
    #[serde(default)]
    pub rigid_hardness: Option<f32>,
    #[serde(default)]
    pub klst: Option<f32>,
    #[serde(default)]
    pub kast: Option<f32>,
    #[serde(default)]
    pub kvst: Option<f32>,
}

// === CONSTRAINTS ===

#[derive(Clone, Debug, Deserialize)]
pub struct ConstraintDescription {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub objecta: u32,
    #[serde(default)]
    pub objectb: Option<u32>,
    #[serde(default)]
    pub positiona: Vec3,
    #[serde(default)]
    pub positionb: Option<Vec3>,
    /// Hinge axis, or slider/dof Euler angles
    #[serde(default)]
    pub axis: Option<Vec3>,
    #[serde(default)]
    pub axisa: Option<Vec3>,
    #[serde(default)]
    pub axisb: Option<Vec3>,
}

// === VEHICLES ===

/// Suspension tuning shared by a vehicle's wheels
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct VehicleTuning {
    #[serde(default = "default_suspension_stiffness")]
    pub suspension_stiffness: f32,
    #[serde(default = "default_suspension_compression")]
    pub suspension_compression: f32,
    #[serde(default = "default_suspension_damping")]
    pub suspension_damping: f32,
    #[serde(default = "default_max_suspension_travel")]
    pub max_suspension_travel: f32,
    #[serde(default = "default_max_suspension_force")]
    pub max_suspension_force: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            suspension_stiffness: default_suspension_stiffness(),
            suspension_compression: default_suspension_compression(),
            suspension_damping: default_suspension_damping(),
            max_suspension_travel: default_max_suspension_travel(),
            max_suspension_force: default_max_suspension_force(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct VehicleDescription {
    pub id: u32,
    #[serde(rename = "rigidBody")]
    pub rigid_body: u32,
    #[serde(flatten)]
    pub tuning: VehicleTuning,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WheelDescription {
    /// Vehicle id
    pub id: u32,
    pub connection_point: Vec3,
    pub wheel_direction: Vec3,
    pub wheel_axle: Vec3,
    pub suspension_rest_length: f32,
    pub wheel_radius: f32,
    #[serde(default)]
    pub tuning: Option<VehicleTuning>,
    #[serde(default)]
    pub is_front_wheel: bool,
}

fn unit_scale() -> Vec3 {
    Vec3::one()
}

fn default_friction() -> f32 {
    0.5
}

// Raycast-vehicle tuning defaults of the kernel
fn default_suspension_stiffness() -> f32 {
    5.88
}

fn default_suspension_compression() -> f32 {
    0.83
}

fn default_suspension_damping() -> f32 {
    0.88
}

fn default_max_suspension_travel() -> f32 {
    500.0
}

fn default_max_suspension_force() -> f32 {
    6000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_object_parses_with_defaults() {
        let desc: ObjectDescription = serde_json::from_str(
            r#"{"id": 4, "type": "box", "width": 2, "height": 1, "depth": 3, "mass": 5,
                "position": {"x": 1, "y": 2, "z": 3}}"#,
        )
        .unwrap();
        assert_eq!(desc.id, 4);
        assert_eq!(desc.shape.kind, "box");
        assert_eq!(desc.shape.width, 2.0);
        assert_eq!(desc.scale, Vec3::one());
        assert_eq!(desc.rotation, Quat::identity());
        assert_eq!(desc.friction, 0.5);
        assert!(!desc.shape.is_soft());
        assert!(desc.children.is_none());
    }

    #[test]
    fn soft_rope_keeps_material_knobs() {
        let desc: ObjectDescription = serde_json::from_str(
            r#"{"id": 1, "type": "softRopeMesh", "data": [0,0,0, 0,5,0, 10],
                "viterations": 20, "anchorHardness": 0.7, "klst": 0.9}"#,
        )
        .unwrap();
        assert!(desc.shape.is_soft());
        assert_eq!(desc.shape.data.len(), 7);
        assert_eq!(desc.soft.viterations, Some(20));
        assert_eq!(desc.soft.anchor_hardness, Some(0.7));
        assert_eq!(desc.soft.klst, Some(0.9));
    }

    #[test]
    fn vehicle_tuning_is_flattened() {
        let desc: VehicleDescription = serde_json::from_str(
            r#"{"id": 0, "rigidBody": 3, "suspension_stiffness": 20,
                "suspension_compression": 2.3, "suspension_damping": 4.4,
                "max_suspension_travel": 500, "max_suspension_force": 6000}"#,
        )
        .unwrap();
        assert_eq!(desc.rigid_body, 3);
        assert_eq!(desc.tuning.suspension_stiffness, 20.0);
    }
}
