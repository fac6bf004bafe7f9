//! Application entry point — simplex repeater.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`RepeaterConfig`] from disk (returns default on first run).
//! 3. Open the CM108 gateway; degrade to a disconnected no-op gateway when
//!    no fob is attached.
//! 4. Build shared state, the event channel, and the status watch.
//! 5. Spawn the continuous audio-capture thread.
//! 6. Start the carrier-monitor thread feeding edges into the event loop.
//! 7. Create [`tokio`] runtime (multi-thread, 2 workers) and spawn the
//!    1 s identification ticker and the relay state machine.
//! 8. Block until Ctrl-C, then shut down: state machine drains (releasing
//!    PTT and stopping capture), the monitor joins, and PTT is released
//!    once more before exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use simplex_repeater::{
    audio::{capture_channel, run_capture, AudioDevice, CpalAudioDevice},
    config::RepeaterConfig,
    hardware::{CarrierMonitor, CarrierPtt, Cm108Gateway, DisconnectedGateway},
    relay::{new_shared_state, RelayEvent, RelayStateMachine, RepeaterHandle, StatusSnapshot},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("simplex repeater starting up");

    // 2. Configuration
    let config = RepeaterConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        RepeaterConfig::default()
    });

    // 3. Hardware gateway — the repeater keeps running without a fob, it
    //    just cannot sense carrier or key the transmitter.
    let gateway: Arc<dyn CarrierPtt> =
        match Cm108Gateway::open(config.hardware.vendor_id, config.hardware.product_id) {
            Ok(gateway) => {
                if let Err(e) = gateway.set_ptt(false) {
                    log::warn!("initial PTT release failed: {e}");
                }
                Arc::new(gateway)
            }
            Err(e) => {
                log::error!("CM108 unavailable ({e}); carrier detect and PTT disabled");
                Arc::new(DisconnectedGateway)
            }
        };

    // 4. Shared state + channels
    let state = new_shared_state(&config, gateway.is_connected(), Instant::now());
    let (events_tx, events_rx) = mpsc::channel::<RelayEvent>(32);
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());

    // Handle for the dashboard transport (HTTP server, CLI, …) to observe
    // and control the repeater.
    let _handle = RepeaterHandle::new(events_tx.clone(), status_rx);

    // 5. Continuous capture thread — runs for the process lifetime, keeps
    //    the pre-roll rolling through every mode.
    let device: Arc<dyn AudioDevice> = Arc::new(CpalAudioDevice::new(
        config.audio.sample_rate,
        config.audio.frame_size,
    ));
    let (capture_handle, capture_rx) = capture_channel();
    {
        let device = Arc::clone(&device);
        let state = Arc::clone(&state);
        let audio_settings = config.audio.clone();
        std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || run_capture(device, state, capture_rx, audio_settings))
            .expect("failed to spawn audio-capture thread");
    }

    // 6. Carrier monitor thread — edge-triggered carrier events.
    let monitor = {
        let events = events_tx.clone();
        CarrierMonitor::start(
            Arc::clone(&gateway),
            config.hardware.poll_interval(),
            config.hardware.read_timeout(),
            move |carrier| {
                let _ = events.blocking_send(RelayEvent::CarrierChanged(carrier));
            },
        )
    };

    // 7. Runtime, ticker and state machine
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    rt.block_on(async {
        let ticker_events = events_tx.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                if ticker_events.send(RelayEvent::IdentTick).await.is_err() {
                    break;
                }
            }
        });

        let machine = RelayStateMachine::new(
            Arc::clone(&state),
            Arc::clone(&gateway),
            Arc::clone(&device),
            capture_handle.clone(),
            status_tx,
            events_tx.clone(),
            config.clone(),
        );
        let machine_task = tokio::spawn(machine.run(events_rx));

        log::info!("repeater ready");

        // 8. Shutdown on Ctrl-C
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("signal handler failed: {e}");
        }
        log::info!("shutdown requested");

        let _ = events_tx.send(RelayEvent::Shutdown).await;
        let _ = machine_task.await;
    });

    monitor.stop();
    // PTT must never stay asserted past process exit.
    let _ = gateway.set_ptt(false);
    log::info!("shutdown complete");
    Ok(())
}
