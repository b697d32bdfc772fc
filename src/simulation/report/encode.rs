use crate::core::report_buffer::{ensure_capacity, item_offset};
use crate::core::{ReportBuffer, Transform, Vec3};
use crate::kernel::PhysicsKernel;
use crate::systems::{ConstraintRegistry, ObjectRegistry, SoftShape, VehicleRegistry};

use super::*;

/// One report kind's storage.
///
/// `buf` is `None` while the last buffer is out with the controller; the next
/// encode allocates `len` floats again unless a buffer came back first.
struct ReportSlot {
    kind: u8,
    header: usize,
    buf: Option<ReportBuffer>,
    /// Logical length to allocate when no buffer is held
    len: usize,
}

impl ReportSlot {
    fn new(kind: u8, header: usize, len: usize) -> Self {
        Self { kind, header, buf: None, len }
    }

    /// Buffer with room for `items`, growing in whole chunks
    fn take_chunked(&mut self, item_size: usize, items: usize, chunk: usize) -> ReportBuffer {
        let (kind, len) = (self.kind, self.len);
        let mut buf = self.buf.take().unwrap_or_else(|| ReportBuffer::with_len(kind, len));
        ensure_capacity(&mut buf, kind, COUNTED_HEADER, item_size, items, chunk);
        self.len = buf.len();
        buf.set(0, kind as f32);
        buf
    }

    /// Buffer of exactly `self.len` floats
    fn take_exact(&mut self) -> ReportBuffer {
        let kind = self.kind;
        let mut buf = match self.buf.take() {
            Some(buf) if buf.len() == self.len => buf,
            _ => ReportBuffer::with_len(kind, self.len),
        };
        buf.set(0, kind as f32);
        buf
    }

    fn resize_exact(&mut self, len: usize) {
        self.len = len;
        if self.buf.as_ref().is_some_and(|b| b.len() != len) {
            self.buf = None;
        }
    }

    /// Keep `buf` for the next encode; buffers too short for the header are dropped
    fn put_back(&mut self, buf: ReportBuffer) -> bool {
        if buf.len() < self.header {
            return false;
        }
        self.buf = Some(buf);
        true
    }
}

/// The worker's five report encoders
pub(crate) struct Reports {
    chunk: usize,
    world: ReportSlot,
    collision: ReportSlot,
    vehicle: ReportSlot,
    constraint: ReportSlot,
    soft: ReportSlot,
}

impl Reports {
    pub(crate) fn new(chunk: usize) -> Self {
        let chunked = COUNTED_HEADER;
        Self {
            chunk,
            world: ReportSlot::new(WORLD_REPORT, chunked, chunked + chunk * WORLD_ITEM_SIZE),
            collision: ReportSlot::new(COLLISION_REPORT, chunked, chunked + chunk * COLLISION_ITEM_SIZE),
            vehicle: ReportSlot::new(VEHICLE_REPORT, TAGGED_HEADER, TAGGED_HEADER),
            constraint: ReportSlot::new(CONSTRAINT_REPORT, TAGGED_HEADER, TAGGED_HEADER),
            soft: ReportSlot::new(SOFT_REPORT, COUNTED_HEADER, COUNTED_HEADER),
        }
    }

    fn slot_mut(&mut self, kind: u8) -> Option<&mut ReportSlot> {
        match kind {
            WORLD_REPORT => Some(&mut self.world),
            COLLISION_REPORT => Some(&mut self.collision),
            VEHICLE_REPORT => Some(&mut self.vehicle),
            CONSTRAINT_REPORT => Some(&mut self.constraint),
            SOFT_REPORT => Some(&mut self.soft),
            _ => None,
        }
    }

    /// Adopt a buffer that came back, either from the controller or from a
    /// copying transport. Returns `false` when it was dropped.
    pub(crate) fn reclaim(&mut self, buf: ReportBuffer) -> bool {
        match buf.kind().and_then(|kind| self.slot_mut(kind)) {
            Some(slot) => slot.put_back(buf),
            None => false,
        }
    }

    pub(crate) fn resize_vehicle(&mut self, total_wheels: usize) {
        self.vehicle.resize_exact(TAGGED_HEADER + total_wheels * VEHICLE_ITEM_SIZE);
    }

    pub(crate) fn resize_constraint(&mut self, constraints: usize) {
        self.constraint
            .resize_exact(TAGGED_HEADER + constraints * CONSTRAINT_ITEM_SIZE);
    }

    /// Logical length of the next buffer of `kind`
    pub(crate) fn len_of(&self, kind: u8) -> Option<usize> {
        let slot = match kind {
            WORLD_REPORT => &self.world,
            COLLISION_REPORT => &self.collision,
            VEHICLE_REPORT => &self.vehicle,
            CONSTRAINT_REPORT => &self.constraint,
            SOFT_REPORT => &self.soft,
            _ => return None,
        };
        Some(slot.len)
    }

    // === ENCODERS ===

    /// `[0, n, (id, pos, quat, linVel, angVel) × n]` for every rigid body
    pub(crate) fn encode_world<K: PhysicsKernel>(&mut self, kernel: &K, objects: &ObjectRegistry) -> ReportBuffer {
        let count = objects.rigid_count();
        let mut buf = self.world.take_chunked(WORLD_ITEM_SIZE, count, self.chunk);
        buf.set(1, count as f32);

        for (i, body) in objects.rigid_bodies().enumerate() {
            let off = item_offset(COUNTED_HEADER, WORLD_ITEM_SIZE, i);
            let transform = kernel.center_of_mass_transform(body.handle);
            let out = buf.as_mut_slice();
            out[off] = body.id as f32;
            write_transform(&mut out[off + 1..off + 8], &transform);
            write_vec3(&mut out[off + 8..off + 11], kernel.linear_velocity(body.handle));
            write_vec3(&mut out[off + 11..off + 14], kernel.angular_velocity(body.handle));
        }
        buf
    }

    /// `[1, n, (idA, idB, normalOnB) × n]`, first contact of each touching manifold
    pub(crate) fn encode_collision<K: PhysicsKernel>(
        &mut self,
        kernel: &K,
        objects: &ObjectRegistry,
    ) -> ReportBuffer {
        let manifolds = kernel.num_manifolds();
        let mut buf = self.collision.take_chunked(COLLISION_ITEM_SIZE, manifolds, self.chunk);

        let mut count = 0;
        for i in 0..manifolds {
            let manifold = kernel.manifold(i);
            if manifold.num_contacts == 0 {
                continue;
            }
            let (Some(a), Some(b)) = (objects.id_of(manifold.body0), objects.id_of(manifold.body1)) else {
                continue;
            };
            let contact = kernel.contact_point(i, 0);
            let off = item_offset(COUNTED_HEADER, COLLISION_ITEM_SIZE, count);
            let out = buf.as_mut_slice();
            out[off] = a as f32;
            out[off + 1] = b as f32;
            write_vec3(&mut out[off + 2..off + 5], contact.normal_world_on_b);
            count += 1;
        }
        buf.set(1, count as f32);
        buf
    }

    /// `[2, (vehicleId, wheel, pos, quat) × wheels]`; `None` when no wheel exists
    pub(crate) fn encode_vehicle<K: PhysicsKernel>(
        &mut self,
        kernel: &K,
        vehicles: &VehicleRegistry,
    ) -> Option<ReportBuffer> {
        let wheels: usize = vehicles.iter().map(|v| kernel.wheel_count(v.handle)).sum();
        if wheels == 0 {
            return None;
        }
        if self.vehicle.len < TAGGED_HEADER + wheels * VEHICLE_ITEM_SIZE {
            self.resize_vehicle(wheels);
        }
        let mut buf = self.vehicle.take_exact();

        let mut i = 0;
        for vehicle in vehicles.iter() {
            for wheel in 0..kernel.wheel_count(vehicle.handle) {
                let off = item_offset(TAGGED_HEADER, VEHICLE_ITEM_SIZE, i);
                let transform = kernel.wheel_transform(vehicle.handle, wheel);
                let out = buf.as_mut_slice();
                out[off] = vehicle.id as f32;
                out[off + 1] = wheel as f32;
                write_transform(&mut out[off + 2..off + 9], &transform);
                i += 1;
            }
        }
        mark_unused(&mut buf, VEHICLE_ITEM_SIZE, i);
        Some(buf)
    }

    /// `[3, (id, bodyA, anchor, breakingThreshold) × n]`; `None` when empty
    pub(crate) fn encode_constraint<K: PhysicsKernel>(
        &mut self,
        kernel: &K,
        constraints: &ConstraintRegistry,
    ) -> Option<ReportBuffer> {
        let count = constraints.len();
        if count == 0 {
            return None;
        }
        if self.constraint.len < TAGGED_HEADER + count * CONSTRAINT_ITEM_SIZE {
            self.resize_constraint(count);
        }
        let mut buf = self.constraint.take_exact();

        for (i, constraint) in constraints.iter().enumerate() {
            let off = item_offset(TAGGED_HEADER, CONSTRAINT_ITEM_SIZE, i);
            let out = buf.as_mut_slice();
            out[off] = constraint.id as f32;
            out[off + 1] = constraint.body_a as f32;
            write_vec3(&mut out[off + 2..off + 5], constraint.anchor_origin);
            out[off + 5] = kernel.breaking_impulse_threshold(constraint.handle);
        }
        mark_unused(&mut buf, CONSTRAINT_ITEM_SIZE, count);
        Some(buf)
    }

    /// `[4, bodies, (id, n, items…) × bodies]`
    pub(crate) fn encode_soft<K: PhysicsKernel>(&mut self, kernel: &K, objects: &ObjectRegistry) -> ReportBuffer {
        let bodies = objects.soft_count();
        self.soft
            .resize_exact(COUNTED_HEADER + bodies * 2 + objects.soft_report_size() * 6);
        let mut buf = self.soft.take_exact();
        buf.set(1, bodies as f32);

        let mut offset = COUNTED_HEADER;
        for (body, shape) in objects.soft_bodies() {
            let nodes = kernel.soft_node_count(body.handle);
            let faces = kernel.soft_face_count(body.handle);
            let n = shape.item_count(nodes, faces);
            let out = buf.as_mut_slice();
            out[offset] = body.id as f32;
            out[offset + 1] = n as f32;

            let items = &mut out[offset + 2..offset + 2 + n * shape.floats_per_item()];
            match shape {
                SoftShape::Rope => {
                    for (i, item) in items.chunks_exact_mut(3).enumerate() {
                        write_vec3(item, kernel.soft_node(body.handle, i).position);
                    }
                }
                SoftShape::Cloth => {
                    for (i, item) in items.chunks_exact_mut(6).enumerate() {
                        let node = kernel.soft_node(body.handle, i);
                        write_vec3(&mut item[..3], node.position);
                        write_vec3(&mut item[3..], -node.normal);
                    }
                }
                SoftShape::TriMesh => {
                    for (f, item) in items.chunks_exact_mut(18).enumerate() {
                        let face = kernel.soft_face(body.handle, f);
                        for (corner, node_index) in face.iter().enumerate() {
                            let node = kernel.soft_node(body.handle, *node_index);
                            let at = corner * 6;
                            write_vec3(&mut item[at..at + 3], node.position);
                            write_vec3(&mut item[at + 3..at + 6], node.normal);
                        }
                    }
                }
            }
            offset += n * shape.floats_per_item() + 2;
        }
        buf
    }
}

#[inline(always)]
fn write_vec3(out: &mut [f32], v: Vec3) {
    out[0] = v.x;
    out[1] = v.y;
    out[2] = v.z;
}

/// Origin then rotation, 7 floats
#[inline(always)]
fn write_transform(out: &mut [f32], t: &Transform) {
    write_vec3(&mut out[..3], t.origin);
    out[3] = t.rotation.x;
    out[4] = t.rotation.y;
    out[5] = t.rotation.z;
    out[6] = t.rotation.w;
}

/// Stamp `-1` into the id slot of every entry from `used` on
fn mark_unused(buf: &mut ReportBuffer, item_size: usize, used: usize) {
    let mut off = item_offset(TAGGED_HEADER, item_size, used);
    while off + item_size <= buf.len() {
        buf.set(off, UNUSED_ENTRY);
        off += item_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConstraintDescription, ObjectDescription, WorldConfig};
    use crate::kernel::ReferenceKernel;
    use crate::systems::ShapeCache;

    fn world_with_bodies(n: u32) -> (ReferenceKernel, ObjectRegistry) {
        let mut kernel = ReferenceKernel::new();
        kernel.create_world(&WorldConfig::default());
        let mut shapes = ShapeCache::new();
        let mut objects = ObjectRegistry::new();
        for id in 0..n {
            let desc: ObjectDescription = serde_json::from_value(serde_json::json!({
                "id": id, "type": "sphere", "radius": 0.5, "mass": 1,
                "position": {"x": id as f32 * 3.0, "y": 0, "z": 0}
            }))
            .unwrap();
            objects.add(&mut kernel, &mut shapes, &desc).unwrap();
        }
        (kernel, objects)
    }

    #[test]
    fn world_report_grows_by_whole_chunks() {
        let (kernel, objects) = world_with_bodies(7);
        let mut reports = Reports::new(5);

        let buf = reports.encode_world(&kernel, &objects);
        assert_eq!(buf.len(), COUNTED_HEADER + 10 * WORLD_ITEM_SIZE);
        assert_eq!(buf.as_slice()[..2], [WORLD_REPORT as f32, 7.0]);

        // Transferred away: the next frame allocates the same size again
        let again = reports.encode_world(&kernel, &objects);
        assert_eq!(again.len(), buf.len());
    }

    #[test]
    fn copied_buffers_are_reused() {
        let (kernel, objects) = world_with_bodies(1);
        let mut reports = Reports::new(50);
        let mut buf = reports.encode_world(&kernel, &objects);
        buf.set(buf.len() - 1, 123.0);
        assert!(reports.reclaim(buf));

        let reused = reports.encode_world(&kernel, &objects);
        assert_eq!(reused.as_slice()[reused.len() - 1], 123.0);
    }

    #[test]
    fn short_or_foreign_buffers_are_dropped() {
        let mut reports = Reports::new(50);
        assert!(!reports.reclaim(ReportBuffer::from_vec(vec![WORLD_REPORT as f32])));
        assert!(!reports.reclaim(ReportBuffer::from_vec(vec![7.0, 0.0])));
        assert!(!reports.reclaim(ReportBuffer::from_vec(vec![0.5, 0.0])));
        assert!(reports.reclaim(ReportBuffer::from_vec(vec![VEHICLE_REPORT as f32])));
    }

    #[test]
    fn unused_constraint_entries_are_marked() {
        let (mut kernel, objects) = world_with_bodies(2);
        let mut constraints = ConstraintRegistry::new();
        let mut reports = Reports::new(50);
        for id in 0..3 {
            let desc: ConstraintDescription = serde_json::from_value(serde_json::json!({
                "id": id, "type": "point", "objecta": 0, "objectb": 1,
                "positiona": {"x": 0, "y": 1, "z": 0}
            }))
            .unwrap();
            constraints.add(&mut kernel, &objects, &desc).unwrap();
            reports.resize_constraint(constraints.len());
        }
        constraints.remove(&mut kernel, 1);

        let buf = reports.encode_constraint(&kernel, &constraints).unwrap();
        let data = buf.as_slice();
        assert_eq!(data.len(), TAGGED_HEADER + 3 * CONSTRAINT_ITEM_SIZE);
        assert_eq!(data[1], 0.0);
        assert_eq!(data[1 + CONSTRAINT_ITEM_SIZE], 2.0);
        assert_eq!(data[1 + 2 * CONSTRAINT_ITEM_SIZE], UNUSED_ENTRY);
        assert_eq!(data[3..6], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn empty_registries_skip_tagged_reports() {
        let (kernel, _) = world_with_bodies(0);
        let mut reports = Reports::new(50);
        assert!(reports.encode_vehicle(&kernel, &VehicleRegistry::new()).is_none());
        assert!(reports.encode_constraint(&kernel, &ConstraintRegistry::new()).is_none());
    }
}
