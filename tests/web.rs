//! Browser smoke test: `wasm-pack test --headless --chrome`

#![cfg(target_arch = "wasm32")]

use particula_physics_worker::simulation::report::{decode, WORLD_REPORT};
use particula_physics_worker::{QueueTransport, ReferenceKernel, WorkerCore};
use serde_json::json;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn version_is_exported() {
    assert_eq!(particula_physics_worker::version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(particula_physics_worker::report_world(), WORLD_REPORT);
}

#[wasm_bindgen_test]
fn worker_core_steps_in_the_browser() {
    particula_physics_worker::init();
    let mut worker = WorkerCore::new(ReferenceKernel::new(), QueueTransport::default());
    worker.handle_message("makeWorld", json!({}));
    worker.handle_message("addObject", json!({"id": 1, "type": "sphere", "radius": 1, "mass": 1,
        "position": {"x": 0, "y": 2, "z": 0}}));
    worker.enable_perf_metrics(true);
    worker.handle_message("simulate", json!({}));

    let report = worker
        .transport_mut()
        .drain()
        .find_map(|m| m.report_data().filter(|d| d[0] == WORLD_REPORT as f32).map(<[f32]>::to_vec))
        .unwrap();
    let bodies = decode::world(&report).unwrap();
    assert_eq!(bodies[0].id, 1);
    assert!(worker.get_perf_stats().step_ms() >= 0.0);
}
