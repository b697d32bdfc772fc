use particula_physics_worker::{QueueTransport, ReferenceKernel, WorkerCore};
use serde_json::json;

#[test]
fn perf_smoke_simulate() {
    let mut worker = WorkerCore::new(ReferenceKernel::new(), QueueTransport::default());
    worker.handle_message("makeWorld", json!({"gravity": {"x": 0, "y": -9.8, "z": 0}}));
    worker.enable_perf_metrics(true);
    for id in 0..64u32 {
        worker.handle_message(
            "addObject",
            json!({"id": id, "type": "sphere", "radius": 0.5, "mass": 1,
                   "position": {"x": (id % 8) as f32 * 2.0, "y": 1 + id / 8, "z": 0}}),
        );
    }
    for _ in 0..10 {
        worker.handle_message("simulate", json!({"timeStep": 1.0 / 60.0, "maxSubSteps": 2}));
    }
    let stats = worker.get_perf_stats();
    assert!(stats.step_ms() >= 0.0);
    assert!(stats.report_ms() >= 0.0);
    assert_eq!(stats.rigid_bodies(), 64);
    assert_eq!(worker.frame(), 10);
}
