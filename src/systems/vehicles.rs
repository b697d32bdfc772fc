//! Vehicle registry - raycast vehicles bound to existing chassis bodies

use log::debug;

use crate::core::Slots;
use crate::domain::{VehicleDescription, VehicleTuning, WheelDescription};
use crate::error::{WorkerError, WorkerResult};
use crate::kernel::{PhysicsKernel, VehicleHandle, VehicleOp, WheelInfo, DISABLE_DEACTIVATION};

use super::objects::ObjectRegistry;

#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    pub id: u32,
    pub chassis: u32,
    pub handle: VehicleHandle,
    pub tuning: VehicleTuning,
    pub wheels: Vec<WheelInfo>,
}

pub struct VehicleRegistry {
    vehicles: Slots<Vehicle>,
    /// Wheels ever added; never decreases
    total_wheels: usize,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self {
            vehicles: Slots::new(),
            total_wheels: 0,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> + '_ {
        self.vehicles.iter().map(|(_, v)| v)
    }

    pub fn total_wheels(&self) -> usize {
        self.total_wheels
    }

    /// Whether body `body_id` is the chassis of a live vehicle
    pub fn references(&self, body_id: u32) -> bool {
        self.iter().any(|v| v.chassis == body_id)
    }

    pub fn add<K: PhysicsKernel>(
        &mut self,
        kernel: &mut K,
        objects: &ObjectRegistry,
        desc: &VehicleDescription,
    ) -> WorkerResult<()> {
        if self.vehicles.contains(desc.id) {
            return Err(WorkerError::DuplicateId(desc.id));
        }
        let chassis = objects
            .handle(desc.rigid_body)
            .ok_or(WorkerError::MissingBody(desc.rigid_body))?;

        let handle = kernel.create_vehicle(chassis, &desc.tuning);
        kernel.set_activation_state(chassis, DISABLE_DEACTIVATION);
        kernel.set_coordinate_system(handle, 0, 1, 2);
        kernel.add_vehicle(handle);

        let vehicle = Vehicle {
            id: desc.id,
            chassis: desc.rigid_body,
            handle,
            tuning: desc.tuning,
            wheels: Vec::new(),
        };
        // Checked above
        let _ = self.vehicles.insert(desc.id, vehicle);
        debug!("vehicle {} added on chassis {}", desc.id, desc.rigid_body);
        Ok(())
    }

    /// Remove from the world and free the slot. Absent ids are a no-op.
    pub fn remove<K: PhysicsKernel>(&mut self, kernel: &mut K, id: u32) -> bool {
        let Some(vehicle) = self.vehicles.remove(id) else {
            return false;
        };
        kernel.remove_vehicle(vehicle.handle);
        kernel.destroy_vehicle(vehicle.handle);
        true
    }

    /// Attach a wheel; returns the new total wheel count
    pub fn add_wheel<K: PhysicsKernel>(&mut self, kernel: &mut K, desc: &WheelDescription) -> WorkerResult<usize> {
        let vehicle = self.vehicles.get_mut(desc.id).ok_or(WorkerError::MissingVehicle(desc.id))?;
        let tuning = desc.tuning.unwrap_or(vehicle.tuning);
        let wheel = WheelInfo {
            connection_point: desc.connection_point,
            direction: desc.wheel_direction,
            axle: desc.wheel_axle,
            suspension_rest_length: desc.suspension_rest_length,
            radius: desc.wheel_radius,
            is_front_wheel: desc.is_front_wheel,
        };
        kernel.add_wheel(vehicle.handle, &wheel, &tuning);
        vehicle.wheels.push(wheel);
        self.total_wheels += 1;
        Ok(self.total_wheels)
    }

    /// Steering/brake/engine force. Absent ids are a no-op (returns `false`).
    pub fn apply<K: PhysicsKernel>(&self, kernel: &mut K, id: u32, op: VehicleOp) -> bool {
        match self.vehicles.get(id) {
            Some(vehicle) => {
                kernel.apply_vehicle_op(vehicle.handle, op);
                true
            }
            None => false,
        }
    }
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self::new()
    }
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
        let desc: ObjectDescription = serde_json::from_str(
            r#"{"id": 1, "type": "box", "width": 2, "height": 1, "depth": 4, "mass": 800, "state": 1}"#,
        )
        .unwrap();
        objects.add(&mut kernel, &mut shapes, &desc).unwrap();
        (kernel, objects)
    }

    fn wheel(vehicle: u32, tuning: Option<&str>) -> WheelDescription {
        let tuning = tuning.map(|t| format!(r#", "tuning": {t}"#)).unwrap_or_default();
        serde_json::from_str(&format!(
            r#"{{"id": {vehicle}, "connection_point": {{"x": 1, "y": 0, "z": 1}},
                "wheel_direction": {{"x": 0, "y": -1, "z": 0}}, "wheel_axle": {{"x": -1, "y": 0, "z": 0}},
                "suspension_rest_length": 0.5, "wheel_radius": 0.4, "is_front_wheel": true{tuning}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn chassis_never_sleeps_once_driven() {
        let (mut kernel, objects) = setup();
        let mut vehicles = VehicleRegistry::new();
        let desc: VehicleDescription = serde_json::from_str(r#"{"id": 0, "rigidBody": 1}"#).unwrap();
        vehicles.add(&mut kernel, &objects, &desc).unwrap();

        let chassis = objects.handle(1).unwrap();
        assert_eq!(kernel.activation_state(chassis), Some(DISABLE_DEACTIVATION));
        assert!(vehicles.references(1));
        assert!(kernel.vehicle_in_world(vehicles.get(0).unwrap().handle));
    }

    #[test]
    fn wheels_take_vehicle_tuning_unless_overridden() {
        let (mut kernel, objects) = setup();
        let mut vehicles = VehicleRegistry::new();
        let desc: VehicleDescription =
            serde_json::from_str(r#"{"id": 0, "rigidBody": 1, "suspension_stiffness": 20}"#).unwrap();
        vehicles.add(&mut kernel, &objects, &desc).unwrap();

        assert_eq!(vehicles.add_wheel(&mut kernel, &wheel(0, None)).unwrap(), 1);
        assert_eq!(
            vehicles
                .add_wheel(&mut kernel, &wheel(0, Some(r#"{"suspension_stiffness": 40}"#)))
                .unwrap(),
            2
        );

        let handle = vehicles.get(0).unwrap().handle;
        assert_eq!(kernel.wheel_tuning(handle, 0).unwrap().suspension_stiffness, 20.0);
        assert_eq!(kernel.wheel_tuning(handle, 1).unwrap().suspension_stiffness, 40.0);
    }

    #[test]
    fn removed_vehicles_keep_the_wheel_total() {
        let (mut kernel, objects) = setup();
        let mut vehicles = VehicleRegistry::new();
        let desc: VehicleDescription = serde_json::from_str(r#"{"id": 3, "rigidBody": 1}"#).unwrap();
        vehicles.add(&mut kernel, &objects, &desc).unwrap();
        vehicles.add_wheel(&mut kernel, &wheel(3, None)).unwrap();

        assert!(vehicles.remove(&mut kernel, 3));
        assert!(!vehicles.remove(&mut kernel, 3));
        assert_eq!(vehicles.total_wheels(), 1);
        assert!(!vehicles.references(1));
        assert!(matches!(
            vehicles.add_wheel(&mut kernel, &wheel(3, None)),
            Err(WorkerError::MissingVehicle(3))
        ));
        assert!(!vehicles.apply(&mut kernel, 3, VehicleOp::Brake { value: 1.0, wheel: 0 }));
    }
}
