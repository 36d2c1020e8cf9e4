//! Behavioural tests covering the daemon runtime from launch to shutdown.

use std::cell::RefCell;

use rstest::{fixture, rstest};
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use crate::tests::support::{DaemonWorld, StepResult};

const SHUTDOWN_NOTICE: &str = r#"{"success":false,"error":"Server shutting down","shutdown":true}"#;

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld::new())
}

/// Fails the running scenario when a world operation reports an error.
fn settle(result: StepResult) {
    if let Err(error) = result {
        panic!("{error}");
    }
}

#[given("a running daemon")]
fn given_running_daemon(world: &RefCell<DaemonWorld>) {
    settle(world.borrow_mut().start());
}

#[given("{count} connected clients")]
fn given_connected_clients(world: &RefCell<DaemonWorld>, count: usize) {
    for _ in 0..count {
        settle(world.borrow_mut().connect());
    }
}

#[when("the daemon receives a shutdown signal")]
fn when_shutdown_signal(world: &RefCell<DaemonWorld>) {
    world.borrow().trigger_shutdown();
}

#[when("the first client writes {count} echo requests at once")]
fn when_pipelined_echoes(world: &RefCell<DaemonWorld>, count: usize) {
    let batch: String = (0..count)
        .map(|index| json!({ "method": "echo", "args": [index] }).to_string())
        .collect();
    world.borrow_mut().client(0).send_raw(batch.as_bytes());
}

#[when("the first client sends malformed JSON")]
fn when_malformed_json(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().client(0).send_raw(b"{\"method\": echo}");
}

#[when("the first client calls method \"{method}\" with request id {id}")]
fn when_calls_with_request_id(world: &RefCell<DaemonWorld>, method: String, id: u64) {
    let mut world = world.borrow_mut();
    let response = world
        .client(0)
        .call(&json!({ "method": method, "args": [], "request_id": id }));
    world.record_response(response);
}

#[then("every client receives the shutdown notice")]
fn then_clients_notified(world: &RefCell<DaemonWorld>) {
    let expected: Value = serde_json::from_str(SHUTDOWN_NOTICE).expect("notice literal");
    let mut world = world.borrow_mut();
    assert!(!world.clients_mut().is_empty(), "no clients were connected");
    for client in world.clients_mut() {
        assert_eq!(client.receive(), Some(expected.clone()));
    }
}

#[then("every client connection is closed")]
fn then_clients_closed(world: &RefCell<DaemonWorld>) {
    for client in world.borrow_mut().clients_mut() {
        assert!(client.is_closed(), "client should observe end of stream");
    }
}

#[then("the daemon exits cleanly")]
fn then_daemon_exits(world: &RefCell<DaemonWorld>) {
    settle(world.borrow_mut().join());
    match world.borrow().outcome() {
        Some(Ok(())) => {}
        Some(Err(error)) => panic!("daemon failed: {error}"),
        None => panic!("daemon outcome missing"),
    }
}

#[then("the socket file is removed")]
fn then_socket_removed(world: &RefCell<DaemonWorld>) {
    assert!(!world.borrow().socket_path().exists());
}

#[then("the first client receives {count} echo responses in request order")]
fn then_ordered_echoes(world: &RefCell<DaemonWorld>, count: usize) {
    let mut world = world.borrow_mut();
    let client = world.client(0);
    for index in 0..count {
        let response = client.receive().expect("connection closed early");
        assert_eq!(response, json!({ "success": true, "args": [index] }));
    }
}

#[then("the first client receives the error \"{message}\"")]
fn then_first_client_error(world: &RefCell<DaemonWorld>, message: String) {
    let mut world = world.borrow_mut();
    let response = match world.last_response().cloned() {
        Some(response) => response,
        None => world
            .client(0)
            .receive()
            .expect("connection closed before the error"),
    };
    assert_eq!(response.get("success"), Some(&json!(false)));
    assert_eq!(response.get("error"), Some(&json!(message)));
    world.record_response(response);
}

#[then("the first client connection is closed")]
fn then_first_client_closed(world: &RefCell<DaemonWorld>) {
    assert!(world.borrow_mut().client(0).is_closed());
}

#[then("the second client still receives responses")]
fn then_second_client_served(world: &RefCell<DaemonWorld>) {
    let response = world
        .borrow_mut()
        .client(1)
        .call(&json!({ "method": "echo", "args": ["still here"] }));
    assert_eq!(response, json!({ "success": true, "args": ["still here"] }));
}

#[then("the last response carries request id {id}")]
fn then_request_id_echoed(world: &RefCell<DaemonWorld>, id: u64) {
    let world = world.borrow();
    let response = world.last_response().expect("a recorded response");
    assert_eq!(response.get("request_id"), Some(&json!(id)));
}

#[rstest]
fn connected_client_completes_echo_handshake() {
    let mut world = DaemonWorld::new();
    assert_eq!(world.start(), Ok(()));
    assert_eq!(world.connect(), Ok(()));
    assert_eq!(world.clients_mut().len(), 1);
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Connected clients are told about shutdown"
)]
fn shutdown_notifies_clients(#[from(world)] world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Requests on one connection are answered in order"
)]
fn pipelined_requests_in_order(#[from(world)] world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Malformed JSON closes only the offending connection"
)]
fn malformed_json_closes_connection(#[from(world)] world: RefCell<DaemonWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/server_lifecycle.feature",
    name = "Unknown methods report the request id"
)]
fn unknown_method_reports_request_id(#[from(world)] world: RefCell<DaemonWorld>) {
    drop(world);
}
