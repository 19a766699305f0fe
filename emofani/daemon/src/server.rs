//! Face Server
//!
//! Owns the listener and dispatcher for one face and runs the fixed-rate
//! tick loop until a shutdown signal arrives.

use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use emofani_core::{
    Dispatcher, ExpressionStateMachine, FaceConfig, FaceReadout, MessageQueue, TickReport,
    UdpListener, UdpResponder,
};

/// One face: listener, dispatcher and tick loop
pub struct FaceServer {
    config: FaceConfig,
    json_readout: bool,
}

impl FaceServer {
    pub fn new(config: FaceConfig, json_readout: bool) -> Self {
        Self {
            config,
            json_readout,
        }
    }

    /// Run until SIGINT/SIGTERM
    ///
    /// A failed bind is logged and the face keeps ticking without input, so
    /// the port can be fixed without losing the renderer.
    pub async fn run(self) -> Result<()> {
        let queue = MessageQueue::new();
        let mut listener = UdpListener::new(self.config.receive_port, queue.clone());
        if let Err(e) = listener.start().await {
            error!(error = %e, "Listener inactive, no commands will be received");
        }

        let machine = ExpressionStateMachine::new(&self.config);
        let mut dispatcher = Dispatcher::new(queue, machine, UdpResponder::new());

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let readout_every = u64::from(self.config.tick_hz);
        let mut ticks: u64 = 0;
        let mut last_tick = Instant::now();

        info!(tick_hz = self.config.tick_hz, "Face running");

        let result = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    let report = dispatcher.tick(dt);
                    ticks += 1;

                    if !report.is_quiet() {
                        debug!(
                            processed = report.processed,
                            accepted = report.accepted,
                            rejected = report.rejected,
                            idle_update = report.idle_update,
                            send_failures = report.send_failures,
                            mode = ?dispatcher.machine().mode(),
                            "Tick"
                        );
                    }

                    // Once a second, plus whenever something happened
                    if self.json_readout && (!report.is_quiet() || ticks % readout_every == 0) {
                        println!("{}", readout_line(&report, &dispatcher.machine().readout())?);
                    }
                }
            }
        };

        info!("Shutting down...");
        listener.stop().await;
        result
    }
}

/// One JSON line describing the tick and the current face
fn readout_line(report: &TickReport, readout: &FaceReadout) -> Result<String> {
    serde_json::to_string(&json!({
        "tick": report,
        "face": readout,
    }))
    .context("Failed to serialize readout")
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                info!("Received SIGINT, initiating shutdown");
            }
            _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Received Ctrl-C, initiating shutdown");
    }

    Ok(())
}
