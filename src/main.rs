use std::thread;
use std::time::Duration;

use anyhow::Context;
use elevatorsync::bridge::{self, TelemetryBridge};
use elevatorsync::bus::{topics::TopicScheme, LocalBroker};
use elevatorsync::controller::{ElevatorController, SimController};
use elevatorsync::dispatch::DispatchEngine;
use elevatorsync::{config, init, print};


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = init::parse_args();
    let settings = init::Settings::load(settings_path.as_deref())?;
    print::info(format!("Starting building {:?} with {:?}", settings.building_id, settings));

    let scheme = TopicScheme::new(&settings.building_id);
    let broker = LocalBroker::new();
    let sim = SimController::new(settings.elevators, settings.floors, settings.capacity, settings.floor_height);
    print::controller_settings(&sim).context("reading controller settings")?;

    /* START ----------- Simulator physics ---------------------- */
    {
        let sim = sim.clone();
        thread::spawn(move || loop {
            if let Err(e) = sim.step() {
                print::err(format!("Simulator step failed: {e}"));
            }
            thread::sleep(config::SIM_STEP_INTERVAL);
        });
    }
    /* SLUTT ----------- Simulator physics ---------------------- */

    /* START ----------- Telemetry bridge ---------------------- */
    let bridge = TelemetryBridge::start(sim.clone(), broker.clone(), scheme.clone(), settings.polling_interval())?;
    let events = bridge::spawn_event_forwarders(
        &broker,
        &scheme,
        bridge.building().num_elevators(),
        bridge.building().num_floors(),
    )?;
    thread::spawn(move || bridge.run(events));
    /* SLUTT ----------- Telemetry bridge ---------------------- */

    /* START ----------- Passenger traffic ---------------------- */
    // Presses a hall call on a rotating floor every few seconds so the dispatcher has work
    {
        let sim = sim.clone();
        tokio::spawn(async move {
            let floors = sim.floor_num().unwrap_or(0);
            let mut floor = 0;
            loop {
                tokio::time::sleep(Duration::from_secs(3)).await;
                if floors < 2 {
                    continue;
                }
                floor = (floor + 3) % floors;
                let pressed = if floor + 1 == floors { sim.press_down(floor, true) } else { sim.press_up(floor, true) };
                if let Err(e) = pressed {
                    print::err(format!("Could not press hall call at floor {floor}: {e}"));
                }
            }
        });
    }
    /* SLUTT ----------- Passenger traffic ---------------------- */

    /* START ----------- Dispatcher ---------------------- */
    let engine = DispatchEngine::bootstrap(
        broker.clone(),
        scheme,
        settings.dispatch_interval(),
        settings.snapshot_timeout(),
    )
    .await?;

    {
        let building = engine.building();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(config::PRINT_BUILDING_INTERVAL).await;
                let snapshot = building.lock().await.clone();
                print::building(&snapshot);
            }
        });
    }

    engine.run().await
    /* SLUTT ----------- Dispatcher ---------------------- */
}
