//! Bridge, broker, dispatcher and simulator wired together the way the binary does it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use elevatorsync::bridge::{self, TelemetryBridge};
use elevatorsync::building::{BuildingState, Direction, DoorStatus};
use elevatorsync::bus::{topics::TopicScheme, LocalBroker};
use elevatorsync::controller::{ElevatorController, SimController};
use elevatorsync::dispatch::DispatchEngine;
use tokio::sync::Mutex;

const POLL: Duration = Duration::from_millis(10);
const TICK: Duration = Duration::from_millis(20);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(500);

fn start_bridge(sim: &SimController, broker: &LocalBroker, scheme: &TopicScheme) {
    let bridge = TelemetryBridge::start(sim.clone(), broker.clone(), scheme.clone(), POLL).unwrap();
    let events = bridge::spawn_event_forwarders(
        broker,
        scheme,
        bridge.building().num_elevators(),
        bridge.building().num_floors(),
    )
    .unwrap();
    thread::spawn(move || bridge.run(events));
}

fn start_physics(sim: &SimController, step: Duration) {
    let sim = sim.clone();
    thread::spawn(move || loop {
        if sim.step().is_err() {
            return;
        }
        thread::sleep(step);
    });
}

/// Polls `check` on the live model until it holds or `limit` passes.
async fn eventually(building: &Arc<Mutex<BuildingState>>, limit: Duration, check: impl Fn(&BuildingState) -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check(&*building.lock().await) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hall_call_is_served_end_to_end() {
    let scheme = TopicScheme::new("0");
    let broker = LocalBroker::new();
    let sim = SimController::new(2, 5, 10, 10);

    start_bridge(&sim, &broker, &scheme);
    start_physics(&sim, Duration::from_millis(20));
    let engine = DispatchEngine::bootstrap(broker.clone(), scheme, TICK, SNAPSHOT_TIMEOUT).await.unwrap();
    let running = tokio::spawn(engine.run());

    sim.press_up(3, true).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut served = false;
    while tokio::time::Instant::now() < deadline {
        if sim.elevator_floor(0).unwrap() == 3
            && sim.door_status(0).unwrap() == DoorStatus::Open
            && !sim.floor_button_up(3).unwrap()
        {
            served = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(served, "elevator 0 never served floor 3");
    running.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispatcher_started_first_waits_for_bridge() {
    let scheme = TopicScheme::new("7");
    let broker = LocalBroker::new();
    let sim = SimController::new(3, 4, 8, 10);
    sim.place(2, 3).unwrap();

    let pending = tokio::spawn(DispatchEngine::bootstrap(broker.clone(), scheme.clone(), TICK, SNAPSHOT_TIMEOUT));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());

    start_bridge(&sim, &broker, &scheme);
    let engine = tokio::time::timeout(Duration::from_secs(3), pending).await.unwrap().unwrap().unwrap();

    let snapshot = engine.take_snapshot().await;
    assert_eq!(snapshot.num_elevators(), 3);
    assert_eq!(snapshot.num_floors(), 4);
    assert_eq!(snapshot.elevator(2).unwrap().max_passengers(), 8);
    assert_eq!(snapshot.elevator(2).unwrap().current_floor(), 3);
    assert_eq!(snapshot.elevator(0).unwrap().door_status(), DoorStatus::Open);
    assert!(snapshot.floor_to_service(1, 3).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn changes_during_an_outage_arrive_after_reconnect() {
    let scheme = TopicScheme::new("0");
    let broker = LocalBroker::new();
    let sim = SimController::new(1, 4, 10, 10);

    start_bridge(&sim, &broker, &scheme);
    let engine = DispatchEngine::bootstrap(broker.clone(), scheme, TICK, SNAPSHOT_TIMEOUT).await.unwrap();
    let building = engine.building();
    let running = tokio::spawn(engine.run());

    broker.set_connected(false);
    sim.press_up(2, true).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!building.lock().await.up_button(2).unwrap());

    broker.reconnect();
    assert!(eventually(&building, Duration::from_secs(3), |b| b.up_button(2).unwrap_or(false)).await);

    // No physics running: the command lands on the controller and is mirrored back
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while sim.target(0).unwrap() != 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sim.target(0).unwrap(), 2);
    assert_eq!(sim.committed_direction(0).unwrap(), Direction::Up);
    running.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn controller_fault_does_not_stop_the_bridge() {
    let scheme = TopicScheme::new("0");
    let broker = LocalBroker::new();
    let sim = SimController::new(1, 3, 10, 10);

    start_bridge(&sim, &broker, &scheme);
    let engine = DispatchEngine::bootstrap(broker.clone(), scheme, TICK, SNAPSHOT_TIMEOUT).await.unwrap();
    let building = engine.building();

    sim.fail_call("elevator_weight");
    sim.set_weight(0, 300).unwrap();
    sim.press_down(2, true).unwrap();

    assert!(eventually(&building, Duration::from_secs(3), |b| b.down_button(2).unwrap_or(false)).await);
    assert_eq!(building.lock().await.elevator(0).unwrap().current_passengers_weight(), 0);

    sim.clear_failures();
    assert!(
        eventually(&building, Duration::from_secs(3), |b| {
            b.elevator(0).map(|e| e.current_passengers_weight() == 300).unwrap_or(false)
        })
        .await
    );
}
