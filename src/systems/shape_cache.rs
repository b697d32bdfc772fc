//! Shape cache - structural dedup of collision shapes
//!
//! Primitives (plane, box, sphere, cylinder, capsule, cone) are keyed by their
//! dimensions and shared by every body that asks for the same key. They live
//! as long as the world.
//!
//! Everything else (meshes, hulls, heightfields, compounds) is built fresh and
//! recorded against the owning body id, so it can be destroyed with that body.

use std::collections::HashMap;

use crate::core::{Transform, Vec3};
use crate::domain::{ChildShapeDescription, ShapeDescription};
use crate::error::{WorkerError, WorkerResult};
use crate::kernel::{PhysicsKernel, ShapeGeometry, ShapeHandle};

pub struct ShapeCache {
    cached: HashMap<String, ShapeHandle>,
    owned: HashMap<u32, Vec<ShapeHandle>>,
}

impl ShapeCache {
    pub fn new() -> Self {
        Self {
            cached: HashMap::new(),
            owned: HashMap::new(),
        }
    }

    /// Cache key for shareable primitives, `None` for owned shape types
    pub fn key(desc: &ShapeDescription) -> Option<String> {
        match desc.kind.as_str() {
            "plane" => {
                let n = plane_normal(desc);
                Some(format!("plane_{}_{}_{}", n.x, n.y, n.z))
            }
            "box" => Some(format!("box_{}_{}_{}", desc.width, desc.height, desc.depth)),
            "sphere" => Some(format!("sphere_{}", desc.radius)),
            "cylinder" => Some(format!("cylinder_{}_{}_{}", desc.width, desc.height, desc.depth)),
            "capsule" => Some(format!("capsule_{}_{}", desc.radius, desc.height)),
            "cone" => Some(format!("cone_{}_{}", desc.radius, desc.height)),
            _ => None,
        }
    }

    /// Return the shape for `desc`, building it if needed.
    ///
    /// Owned shapes are recorded against `owner` and released by [`Self::release_owned`].
    pub fn get_or_create<K: PhysicsKernel>(
        &mut self,
        kernel: &mut K,
        desc: &ShapeDescription,
        owner: u32,
    ) -> WorkerResult<ShapeHandle> {
        if let Some(key) = Self::key(desc) {
            if let Some(&handle) = self.cached.get(&key) {
                return Ok(handle);
            }
            let handle = kernel.create_shape(&primitive_geometry(desc));
            self.cached.insert(key, handle);
            return Ok(handle);
        }

        let handle = match desc.kind.as_str() {
            "compound" => kernel.create_shape(&ShapeGeometry::Compound { children: &[] }),
            "concave" => {
                if desc.data.len() < 9 {
                    return Err(WorkerError::EmptyGeometry("concave mesh"));
                }
                let whole = desc.data.len() / 9 * 9;
                kernel.create_shape(&ShapeGeometry::Concave { triangles: &desc.data[..whole] })
            }
            "convex" => {
                if desc.data.len() < 3 {
                    return Err(WorkerError::EmptyGeometry("convex hull"));
                }
                let whole = desc.data.len() / 3 * 3;
                kernel.create_shape(&ShapeGeometry::Convex { points: &desc.data[..whole] })
            }
            "heightfield" => {
                let count = desc.xpts as usize * desc.ypts as usize;
                if count == 0 || desc.points.len() < count {
                    return Err(WorkerError::EmptyGeometry("heightfield"));
                }
                kernel.create_shape(&ShapeGeometry::Heightfield {
                    xpts: desc.xpts,
                    ypts: desc.ypts,
                    heights: &desc.points[..count],
                    abs_max_height: desc.abs_max_height,
                })
            }
            other => return Err(WorkerError::UnknownShape(other.to_string())),
        };
        self.own(owner, handle);
        Ok(handle)
    }

    /// Wrap `root` and every child (at its offset/rotation) into an owned compound
    pub fn wrap_compound<K: PhysicsKernel>(
        &mut self,
        kernel: &mut K,
        root: ShapeHandle,
        children: &[ChildShapeDescription],
        owner: u32,
    ) -> WorkerResult<ShapeHandle> {
        let mut parts = Vec::with_capacity(children.len() + 1);
        parts.push((Transform::identity(), root));
        for child in children {
            let handle = self.get_or_create(kernel, &child.shape, owner)?;
            parts.push((Transform::new(child.position_offset, child.rotation), handle));
        }
        let compound = kernel.create_shape(&ShapeGeometry::Compound { children: &parts });
        self.own(owner, compound);
        Ok(compound)
    }

    /// Destroy every shape owned by `owner`; cached primitives are untouched
    pub fn release_owned<K: PhysicsKernel>(&mut self, kernel: &mut K, owner: u32) {
        if let Some(handles) = self.owned.remove(&owner) {
            // Compounds were recorded after their children
            for handle in handles.into_iter().rev() {
                kernel.destroy_shape(handle);
            }
        }
    }

    /// Number of cached primitive shapes
    pub fn len(&self) -> usize {
        self.cached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_empty()
    }

    pub fn owned_count(&self, owner: u32) -> usize {
        self.owned.get(&owner).map(Vec::len).unwrap_or(0)
    }

    fn own(&mut self, owner: u32, handle: ShapeHandle) {
        self.owned.entry(owner).or_default().push(handle);
    }
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new()
    }
}

fn plane_normal(desc: &ShapeDescription) -> Vec3 {
    desc.normal.unwrap_or(Vec3::new(0.0, 1.0, 0.0))
}

fn primitive_geometry(desc: &ShapeDescription) -> ShapeGeometry<'static> {
    let half = Vec3::new(desc.width * 0.5, desc.height * 0.5, desc.depth * 0.5);
    match desc.kind.as_str() {
        "plane" => ShapeGeometry::Plane { normal: plane_normal(desc) },
        "box" => ShapeGeometry::Box { half_extents: half },
        "sphere" => ShapeGeometry::Sphere { radius: desc.radius },
        "cylinder" => ShapeGeometry::Cylinder { half_extents: half },
        // Kernel capsules measure the cylindrical part only
        "capsule" => ShapeGeometry::Capsule {
            radius: desc.radius,
            height: desc.height - 2.0 * desc.radius,
        },
        _ => ShapeGeometry::Cone { radius: desc.radius, height: desc.height },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ReferenceKernel;

    fn shape(json: &str) -> ShapeDescription {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn identical_boxes_share_one_handle() {
        let mut kernel = ReferenceKernel::new();
        let mut cache = ShapeCache::new();
        let desc = shape(r#"{"type": "box", "width": 1, "height": 2, "depth": 3}"#);

        let a = cache.get_or_create(&mut kernel, &desc, 1).unwrap();
        let b = cache.get_or_create(&mut kernel, &desc, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(kernel.live_shape_count(), 1);
        assert_eq!(ShapeCache::key(&desc).as_deref(), Some("box_1_2_3"));
    }

    #[test]
    fn keys_keep_fractional_dimensions() {
        let desc = shape(r#"{"type": "capsule", "radius": 0.5, "height": 2}"#);
        assert_eq!(ShapeCache::key(&desc).as_deref(), Some("capsule_0.5_2"));
        let desc = shape(r#"{"type": "plane", "normal": {"x": 0, "y": 1, "z": 0}}"#);
        assert_eq!(ShapeCache::key(&desc).as_deref(), Some("plane_0_1_0"));
    }

    #[test]
    fn owned_shapes_are_released_with_their_owner() {
        let mut kernel = ReferenceKernel::new();
        let mut cache = ShapeCache::new();
        let hull = shape(r#"{"type": "convex", "data": [0,0,0, 1,0,0, 0,1,0]}"#);

        cache.get_or_create(&mut kernel, &hull, 7).unwrap();
        assert_eq!(cache.owned_count(7), 1);
        assert_eq!(cache.len(), 0);

        cache.release_owned(&mut kernel, 7);
        assert_eq!(cache.owned_count(7), 0);
        assert_eq!(kernel.live_shape_count(), 0);
    }

    #[test]
    fn compound_wraps_root_and_children() {
        let mut kernel = ReferenceKernel::new();
        let mut cache = ShapeCache::new();
        let root = cache
            .get_or_create(&mut kernel, &shape(r#"{"type": "sphere", "radius": 1}"#), 3)
            .unwrap();
        let children: Vec<ChildShapeDescription> = serde_json::from_str(
            r#"[{"type": "box", "width": 1, "height": 1, "depth": 1,
                 "position_offset": {"x": 2, "y": 0, "z": 0}}]"#,
        )
        .unwrap();

        let compound = cache.wrap_compound(&mut kernel, root, &children, 3).unwrap();
        assert_ne!(compound, root);
        assert_eq!(cache.owned_count(3), 1);
        // Sphere + box stay cached after the compound goes away.
        cache.release_owned(&mut kernel, 3);
        assert_eq!(kernel.live_shape_count(), 2);
    }

    #[test]
    fn unknown_and_empty_shapes_fail() {
        let mut kernel = ReferenceKernel::new();
        let mut cache = ShapeCache::new();

        let err = cache
            .get_or_create(&mut kernel, &shape(r#"{"type": "torus"}"#), 1)
            .unwrap_err();
        assert!(matches!(err, WorkerError::UnknownShape(ref t) if t == "torus"));

        let err = cache
            .get_or_create(&mut kernel, &shape(r#"{"type": "concave", "data": []}"#), 1)
            .unwrap_err();
        assert!(matches!(err, WorkerError::EmptyGeometry(_)));
        assert_eq!(kernel.live_shape_count(), 0);
    }
}
