use mapdiff::error::ErrorKind;
use mapdiff::failpoints::{MERGE_BEFORE_SINK_CALL, MERGE_BEFORE_WAIT};
use mapdiff::pipeline::{apply_changes, derive_changes};
use mapdiff::sink::memory::{MemoryChangeSink, MemoryEntitySink};
use mapdiff::test_utils::deadline::{DEFAULT_DEADLINE, run_with_deadline};
use mapdiff::test_utils::failpoints::CustomFailScenario;
use mapdiff::test_utils::fixtures::TestEntity;
use mapdiff::test_utils::test_sink_wrapper::TestSinkWrapper;
use mapdiff::types::{Change, Kind, KindCatalog};
use mapdiff_telemetry::tracing::init_test_tracing;

fn single_kind() -> (KindCatalog, Kind) {
    let catalog = KindCatalog::new(["item"]).unwrap();
    let kind = catalog.kind("item").unwrap();
    (catalog, kind)
}

#[test]
fn interrupted_wait_aborts_the_session() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BEFORE_WAIT, "return(interrupted_wait)")]);
    let (catalog, kind) = single_kind();

    // Whichever source arrives first has to wait for the other one.
    let from = vec![(kind, TestEntity::new(1, 0)), (kind, TestEntity::new(2, 0))];
    let to = vec![(kind, TestEntity::new(1, 0)), (kind, TestEntity::new(2, 1))];

    let sink = TestSinkWrapper::wrap(MemoryChangeSink::new());
    let err = run_with_deadline(DEFAULT_DEADLINE, {
        let sink = sink.clone();
        move || derive_changes(catalog, from, to, sink).unwrap_err()
    });

    assert_eq!(err.kind(), ErrorKind::InterruptedWait);
    assert_eq!(sink.complete_calls(), 0);
    assert_eq!(sink.release_calls(), 1);
}

#[test]
fn sink_error_before_output_aborts_the_session() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BEFORE_SINK_CALL, "return(sink_error)")]);
    let (catalog, kind) = single_kind();

    let base = vec![(kind, TestEntity::new(1, 0))];
    let changes = vec![(kind, Change::create(TestEntity::new(2, 0)))];

    let memory = MemoryEntitySink::new();
    let sink = TestSinkWrapper::wrap(memory.clone());
    let err = run_with_deadline(DEFAULT_DEADLINE, {
        let sink = sink.clone();
        move || apply_changes(catalog, base, changes, sink).unwrap_err()
    });

    assert_eq!(err.kind(), ErrorKind::SinkError);
    assert!(memory.entities().is_empty());
    assert_eq!(sink.complete_calls(), 0);
    assert_eq!(sink.release_calls(), 1);
}

#[test]
fn unparameterized_failpoint_reports_injected_failure() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_BEFORE_SINK_CALL, "return")]);
    let (catalog, kind) = single_kind();

    let from = vec![(kind, TestEntity::new(1, 0))];

    let sink = MemoryChangeSink::new();
    let err = run_with_deadline(DEFAULT_DEADLINE, {
        let sink = sink.clone();
        move || derive_changes(catalog, from, Vec::new(), sink).unwrap_err()
    });

    assert_eq!(err.kind(), ErrorKind::FailpointTriggered);
    assert!(sink.changes().is_empty());
    assert!(!sink.is_completed());
    assert!(sink.is_released());
}
