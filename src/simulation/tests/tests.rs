use super::*;
use crate::kernel::ReferenceKernel;
use crate::transport::{Outbound, QueueTransport, EVENT_OBJECT_READY, EVENT_WORLD_READY};
use super::report::{
    COLLISION_REPORT, CONSTRAINT_REPORT, SOFT_REPORT, VEHICLE_ITEM_SIZE, VEHICLE_REPORT, WORLD_REPORT,
};

type TestWorker = WorkerCore<ReferenceKernel, QueueTransport>;

fn worker_with(config: Value) -> TestWorker {
    let mut core = WorkerCore::new(ReferenceKernel::new(), QueueTransport::default());
    core.handle_message("makeWorld", config);
    core.transport_mut().drain().count();
    core
}

fn worker() -> TestWorker {
    worker_with(json!({}))
}

fn add_box(core: &mut TestWorker, id: u32, y: f32) {
    core.handle_message(
        "addObject",
        json!({"id": id, "type": "box", "width": 1, "height": 1, "depth": 1, "mass": 1,
               "position": {"x": 0, "y": y, "z": 0}}),
    );
}

/// Kind tags of the reports queued so far, in order
fn report_kinds(core: &mut TestWorker) -> Vec<f32> {
    core.transport_mut()
        .drain()
        .filter_map(|m| m.report_data().map(|d| d[0]))
        .collect()
}

#[test]
fn commands_before_make_world_are_refused() {
    let mut core = WorkerCore::new(ReferenceKernel::new(), QueueTransport::default());
    let err = core.execute(Command::SetGravity(crate::core::Vec3::zero())).unwrap_err();
    assert!(matches!(err, WorkerError::WorldNotReady));

    add_box(&mut core, 1, 0.0);
    assert!(core.objects().is_empty());
    assert!(core.transport().is_empty());
}

#[test]
fn make_world_announces_itself_and_starts_over() {
    let mut core = WorkerCore::new(ReferenceKernel::new(), QueueTransport::default());
    assert!(!core.kernel().world_created());
    core.handle_message("init", json!({"fixedTimeStep": 0.01}));
    assert!(core.is_world_ready());
    assert!(core.kernel().world_created());
    assert_eq!(core.fixed_time_step(), 0.01);
    assert_eq!(core.transport().event_names(), vec![EVENT_WORLD_READY]);

    add_box(&mut core, 1, 0.0);
    assert_eq!(core.objects().len(), 1);

    core.handle_message("makeWorld", json!({}));
    assert!(core.objects().is_empty());
    assert!(core.shapes().is_empty());
    assert_eq!(core.kernel().live_body_count(), 0);
}

#[test]
fn object_ready_carries_the_bare_id() {
    let mut core = worker();
    add_box(&mut core, 7, 0.0);
    match core.transport_mut().pop() {
        Some(Outbound::Event { cmd, params }) => {
            assert_eq!(cmd, EVENT_OBJECT_READY);
            assert_eq!(params, Some(json!(7)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn failures_are_echoed_only_when_asked() {
    let mut quiet = worker();
    quiet.handle_message("removeObject", json!({"id": 3}));
    assert!(quiet.transport().is_empty());

    let mut loud = worker_with(json!({"reportErrors": true}));
    loud.handle_message("addObject", json!({"id": 1, "type": "torus"}));
    match loud.transport_mut().pop() {
        Some(Outbound::Event { cmd, params: Some(params) }) => {
            assert_eq!(cmd, EVENT_COMMAND_FAILED);
            assert_eq!(params["cmd"], "addObject");
            assert!(params["reason"].as_str().unwrap().contains("torus"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(loud.objects().is_empty());
}

#[test]
fn unknown_and_malformed_messages_do_not_stop_the_worker() {
    let mut core = worker();
    core.handle_message("linkNodes", json!({"a": 1}));
    core.handle_json("not json");
    core.handle_json(r#"{"cmd": "updateMass", "params": {"mass": 2}}"#);
    add_box(&mut core, 1, 0.0);
    assert_eq!(core.objects().len(), 1);
}

#[test]
fn simulate_sends_reports_in_order() {
    let mut core = worker();
    core.handle_message("simulate", Value::Null);
    assert_eq!(report_kinds(&mut core), vec![WORLD_REPORT as f32, COLLISION_REPORT as f32]);
    assert_eq!(core.frame(), 1);

    let mut soft = worker_with(json!({"softbody": true}));
    soft.handle_message("simulate", json!({"timeStep": 0.016}));
    assert_eq!(
        report_kinds(&mut soft),
        vec![WORLD_REPORT as f32, COLLISION_REPORT as f32, SOFT_REPORT as f32]
    );
}

#[test]
fn constraint_report_follows_vehicle_report() {
    let mut core = worker();
    add_box(&mut core, 1, 0.0);
    add_box(&mut core, 2, 3.0);
    core.handle_message("addConstraint", json!({"id": 0, "type": "point", "objecta": 1,
        "positiona": {"x": 0, "y": 1, "z": 0}}));
    core.handle_message("addVehicle", json!({"id": 0, "rigidBody": 2}));
    core.transport_mut().drain().count();

    let handle = core.constraints().get(0).unwrap().handle;
    assert_eq!(core.kernel().constraint_bodies(handle), Some((core.objects().handle(1).unwrap(), None)));

    // A vehicle without wheels has nothing to report
    core.handle_message("simulate", Value::Null);
    assert_eq!(
        report_kinds(&mut core),
        vec![WORLD_REPORT as f32, COLLISION_REPORT as f32, CONSTRAINT_REPORT as f32]
    );

    core.handle_message("addWheel", json!({"id": 0,
        "connection_point": {"x": 1, "y": 0, "z": 1},
        "wheel_direction": {"x": 0, "y": -1, "z": 0},
        "wheel_axle": {"x": -1, "y": 0, "z": 0},
        "suspension_rest_length": 0.5, "wheel_radius": 0.3}));
    core.handle_message("simulate", Value::Null);
    assert_eq!(
        report_kinds(&mut core),
        vec![
            WORLD_REPORT as f32,
            COLLISION_REPORT as f32,
            VEHICLE_REPORT as f32,
            CONSTRAINT_REPORT as f32
        ]
    );
    assert_eq!(core.report_len(VEHICLE_REPORT), Some(1 + VEHICLE_ITEM_SIZE));
}

#[test]
fn bodies_in_use_cannot_be_removed() {
    let mut core = worker();
    add_box(&mut core, 1, 0.0);
    core.handle_message("addConstraint", json!({"id": 4, "type": "point", "objecta": 1}));

    let err = core.execute(Command::RemoveObject { id: 1 }).unwrap_err();
    assert!(matches!(err, WorkerError::BodyInUse { body: 1, .. }));

    core.handle_message("removeConstraint", json!({"id": 4}));
    core.execute(Command::RemoveObject { id: 1 }).unwrap();
    assert!(core.objects().is_empty());
}

#[test]
fn short_time_steps_are_clamped_to_the_fixed_step() {
    let mut core = worker();
    core.enable_perf_metrics(true);
    core.handle_message("simulate", json!({"timeStep": 0.0001}));
    let stats = core.get_perf_stats();
    assert_eq!(stats.sub_steps(), 1);
    assert_eq!(stats.reports_sent(), 2);

    core.enable_perf_metrics(false);
    assert_eq!(core.get_perf_stats().sub_steps(), 0);
}

#[test]
fn returned_buffers_are_matched_by_kind() {
    let mut core = worker();
    assert!(core.reclaim_report(vec![WORLD_REPORT as f32, 0.0, 0.0]));
    assert!(core.reclaim_report(vec![CONSTRAINT_REPORT as f32]));
    assert!(!core.reclaim_report(vec![9.0, 0.0]));
    assert!(!core.reclaim_report(Vec::new()));
}

#[test]
fn oversized_report_chunks_are_capped() {
    let mut core = worker_with(json!({"reportsize": 1u64 << 40}));
    assert_eq!(core.config().report_chunk, crate::domain::MAX_REPORT_CHUNK);
    add_box(&mut core, 1, 0.0);
    core.handle_message("simulate", Value::Null);
    assert_eq!(report_kinds(&mut core)[0], WORLD_REPORT as f32);
}
