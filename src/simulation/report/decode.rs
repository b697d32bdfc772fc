//! Controller-side readers for the report layouts
//!
//! The worker never calls these; hosts and tests use them to read reports back.

use crate::core::{Quat, Vec3};

use super::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    pub id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEntry {
    pub body_a: u32,
    pub body_b: u32,
    pub normal_on_b: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelState {
    pub vehicle: u32,
    pub wheel: u32,
    pub position: Vec3,
    pub rotation: Quat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintState {
    pub id: u32,
    pub body_a: u32,
    pub anchor: Vec3,
    pub breaking_impulse_threshold: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoftBodyState {
    pub id: u32,
    /// Nodes (rope, cloth) or faces (trimesh)
    pub items: usize,
    pub floats: Vec<f32>,
}

fn vec3(s: &[f32]) -> Vec3 {
    Vec3::new(s[0], s[1], s[2])
}

fn quat(s: &[f32]) -> Quat {
    Quat::new(s[0], s[1], s[2], s[3])
}

fn tagged(data: &[f32], kind: u8) -> bool {
    data.first() == Some(&(kind as f32))
}

/// Entries of a `[kind, count]` report, clamped to what the buffer holds
fn counted_items(data: &[f32], kind: u8, item_size: usize) -> Option<impl Iterator<Item = &[f32]>> {
    if !tagged(data, kind) || data.len() < COUNTED_HEADER {
        return None;
    }
    let count = data[1].max(0.0) as usize;
    Some(data[COUNTED_HEADER..].chunks_exact(item_size).take(count))
}

/// Used entries of a `[kind]` report (stops at the first unused one)
fn tagged_items(data: &[f32], kind: u8, item_size: usize) -> Option<impl Iterator<Item = &[f32]>> {
    if !tagged(data, kind) {
        return None;
    }
    Some(
        data[TAGGED_HEADER..]
            .chunks_exact(item_size)
            .take_while(|item| item[0] != UNUSED_ENTRY),
    )
}

pub fn world(data: &[f32]) -> Option<Vec<BodyState>> {
    let items = counted_items(data, WORLD_REPORT, WORLD_ITEM_SIZE)?;
    Some(
        items
            .map(|s| BodyState {
                id: s[0] as u32,
                position: vec3(&s[1..4]),
                rotation: quat(&s[4..8]),
                linear_velocity: vec3(&s[8..11]),
                angular_velocity: vec3(&s[11..14]),
            })
            .collect(),
    )
}

pub fn collisions(data: &[f32]) -> Option<Vec<CollisionEntry>> {
    let items = counted_items(data, COLLISION_REPORT, COLLISION_ITEM_SIZE)?;
    Some(
        items
            .map(|s| CollisionEntry {
                body_a: s[0] as u32,
                body_b: s[1] as u32,
                normal_on_b: vec3(&s[2..5]),
            })
            .collect(),
    )
}

pub fn vehicles(data: &[f32]) -> Option<Vec<WheelState>> {
    let items = tagged_items(data, VEHICLE_REPORT, VEHICLE_ITEM_SIZE)?;
    Some(
        items
            .map(|s| WheelState {
                vehicle: s[0] as u32,
                wheel: s[1] as u32,
                position: vec3(&s[2..5]),
                rotation: quat(&s[5..9]),
            })
            .collect(),
    )
}

pub fn constraints(data: &[f32]) -> Option<Vec<ConstraintState>> {
    let items = tagged_items(data, CONSTRAINT_REPORT, CONSTRAINT_ITEM_SIZE)?;
    Some(
        items
            .map(|s| ConstraintState {
                id: s[0] as u32,
                body_a: s[1] as u32,
                anchor: vec3(&s[2..5]),
                breaking_impulse_threshold: s[5],
            })
            .collect(),
    )
}

/// Soft bodies; `floats_per_item` is 3 (rope), 6 (cloth) or 18 (trimesh) and
/// comes from the controller's own record of each body's type
pub fn soft_bodies(data: &[f32], floats_per_item: impl Fn(u32) -> usize) -> Option<Vec<SoftBodyState>> {
    if !tagged(data, SOFT_REPORT) || data.len() < COUNTED_HEADER {
        return None;
    }
    let bodies = data[1].max(0.0) as usize;
    let mut out = Vec::with_capacity(bodies);
    let mut offset = COUNTED_HEADER;
    for _ in 0..bodies {
        let id = *data.get(offset)? as u32;
        let items = *data.get(offset + 1)? as usize;
        let len = items * floats_per_item(id);
        let floats = data.get(offset + 2..offset + 2 + len)?.to_vec();
        out.push(SoftBodyState { id, items, floats });
        offset += len + 2;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_kind_is_rejected() {
        assert!(world(&[1.0, 0.0]).is_none());
        assert!(vehicles(&[0.0]).is_none());
        assert!(soft_bodies(&[], |_| 3).is_none());
    }

    #[test]
    fn counted_reports_ignore_stale_tail() {
        let mut data = vec![0.0; 2 + 3 * WORLD_ITEM_SIZE];
        data[1] = 1.0;
        data[2] = 7.0;
        data[3] = 1.0;
        data[2 + WORLD_ITEM_SIZE] = 99.0;
        let bodies = world(&data).unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].id, 7);
        assert_eq!(bodies[0].position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn tagged_reports_stop_at_unused_entry() {
        let mut data = vec![CONSTRAINT_REPORT as f32];
        data.extend_from_slice(&[2.0, 5.0, 0.0, 1.0, 0.0, 100.0]);
        data.extend_from_slice(&[UNUSED_ENTRY, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let entries = constraints(&data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body_a, 5);
        assert_eq!(entries[0].breaking_impulse_threshold, 100.0);
    }

    #[test]
    fn soft_offsets_skip_id_and_count() {
        let data = vec![
            SOFT_REPORT as f32, 2.0,
            3.0, 1.0, 0.0, 1.0, 2.0,
            4.0, 2.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0,
        ];
        let bodies = soft_bodies(&data, |_| 3).unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1].id, 4);
        assert_eq!(bodies[1].floats, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }
}
