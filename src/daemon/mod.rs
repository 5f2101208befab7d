//! Daemon - the long-running process that owns the run coordinator
//!
//! The daemon:
//! - Builds the coordinator from configuration
//! - Serves repair.* and chat.* requests on the IPC socket
//! - Pushes every bridge message to subscribed clients

pub mod context;
pub mod handlers;

pub use context::DaemonContext;
pub use handlers::DaemonHandler;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::BridgeMessage;
use crate::config::Config;
use crate::coordinator::RunCoordinator;
use crate::error::Result;
use crate::ipc::messages::DaemonEvent;
use crate::ipc::server::{IpcServer, IpcServerConfig};

/// Relay bridge messages to IPC subscribers as repair.event / repair.finished
pub fn forward_bridge(coordinator: &RunCoordinator, ctx: Arc<DaemonContext>) -> JoinHandle<()> {
    let mut rx = coordinator.bridge().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(BridgeMessage::Event(event)) => ctx.broadcast(DaemonEvent::repair_event(&event)),
                Ok(BridgeMessage::Finished { run_id, sentinel }) => {
                    ctx.broadcast(DaemonEvent::repair_finished(&run_id, &sentinel))
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("Bridge relay lagged, skipped {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Serve until `shutdown` is cancelled
pub async fn run(config: &Config, shutdown: CancellationToken) -> Result<()> {
    config.validate()?;
    let coordinator = Arc::new(RunCoordinator::from_config(config));
    log::info!(
        "Daemon starting: workspace {}, socket {}",
        coordinator.workspace().root().display(),
        config.ipc.socket_path.display()
    );

    let server = IpcServer::new(IpcServerConfig::from(&config.ipc));
    let ctx = Arc::new(DaemonContext::new(coordinator.clone(), config, server.event_sender()));
    let relay = forward_bridge(&coordinator, ctx.clone());

    let result = server.run(Arc::new(DaemonHandler::new(ctx)), shutdown).await;

    relay.abort();
    if coordinator.is_running() {
        log::info!("Cancelling in-flight repair before exit");
        let _ = coordinator.cancel();
        coordinator.wait().await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::testing::PASSING;
    use crate::daemon::context::testing::fixture_context;
    use crate::domain::FailureKind;
    use crate::ipc::messages::Events;

    #[tokio::test]
    async fn test_bridge_relay_pushes_events_and_sentinel() {
        let (_temp, ctx) = fixture_context(PASSING);
        let mut rx = ctx.subscribe();
        let relay = forward_bridge(&ctx.coordinator, ctx.clone());

        let run_id = ctx.coordinator.trigger(FailureKind::NullPointer).unwrap();
        ctx.coordinator.wait().await;

        let mut events = 0;
        loop {
            let pushed = rx.recv().await.unwrap();
            if pushed.event == Events::REPAIR_FINISHED {
                assert_eq!(pushed.data["sentinel"], "succeeded");
                assert_eq!(pushed.data["run_id"], run_id.as_str());
                break;
            }
            assert_eq!(pushed.event, Events::REPAIR_EVENT);
            events += 1;
        }
        assert_eq!(events, ctx.coordinator.status().log.len());
        relay.abort();
    }
}
