//! Live sessions - one consumer's filtered view of the bridge

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use super::{BridgeMessage, ForwardPolicy, Sentinel};

/// What a session yields to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionItem {
    /// A forwarded trace line
    Message(String),
    /// The run ended; the session is over
    Finished(Sentinel),
    /// Nothing was forwarded within the idle timeout; the session is over
    TimedOut,
}

/// A consumer attached to the bridge
///
/// Ends after the first sentinel (of the followed run, once one is set),
/// after an idle timeout, or when the bridge is dropped. Ending a session
/// affects no other session and not the run.
pub struct LiveSession {
    rx: broadcast::Receiver<BridgeMessage>,
    policy: Box<dyn ForwardPolicy>,
    idle_timeout: Duration,
    deadline: Instant,
    run_id: Option<String>,
    ended: bool,
}

impl LiveSession {
    pub(super) fn new(
        rx: broadcast::Receiver<BridgeMessage>,
        policy: Box<dyn ForwardPolicy>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            policy,
            idle_timeout,
            deadline: Instant::now() + idle_timeout,
            run_id: None,
            ended: false,
        }
    }

    /// Only end on the sentinel of `run_id`; sentinels of other runs are skipped
    pub fn follow_run(&mut self, run_id: impl Into<String>) {
        self.run_id = Some(run_id.into());
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Next item for the consumer, `None` once the session has ended
    pub async fn next(&mut self) -> Option<SessionItem> {
        if self.ended {
            return None;
        }

        loop {
            match tokio::time::timeout_at(self.deadline, self.rx.recv()).await {
                Err(_) => {
                    log::info!("Live session idle for {:?}, ending", self.idle_timeout);
                    self.ended = true;
                    return Some(SessionItem::TimedOut);
                }
                Ok(Ok(BridgeMessage::Event(event))) => {
                    if let Some(text) = self.policy.forward(&event) {
                        self.deadline = Instant::now() + self.idle_timeout;
                        return Some(SessionItem::Message(text));
                    }
                }
                Ok(Ok(BridgeMessage::Finished { run_id, sentinel })) => {
                    if self.run_id.as_ref().is_some_and(|followed| *followed != run_id) {
                        log::debug!("Live session skipping sentinel of {}", run_id);
                        continue;
                    }
                    self.ended = true;
                    return Some(SessionItem::Finished(sentinel));
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    log::warn!("Live session lagged, skipped {} messages", skipped);
                }
                Ok(Err(RecvError::Closed)) => {
                    self.ended = true;
                    return None;
                }
            }
        }
    }

    /// Drain the session into a vector (until it ends)
    pub async fn collect(mut self) -> Vec<SessionItem> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        items
    }
}
