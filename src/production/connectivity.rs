//! Connectivity probe: TCP reachability of the notifier host

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::retry_scheduler::Trigger;
use crate::traits::Connectivity;

pub const DEFAULT_PROBE_HOST: &str = "api.telegram.org:443";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Online state as last observed by the probe
pub struct ProbeConnectivity {
    host: String,
    online: AtomicBool,
    interval: Duration,
}

impl ProbeConnectivity {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            online: AtomicBool::new(false),
            interval: PROBE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Try one connection and record the result. Returns true on an
    /// unavailable to available transition.
    pub async fn probe(&self) -> bool {
        let reachable = matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&self.host)).await,
            Ok(Ok(_))
        );
        let was_online = self.online.swap(reachable, Ordering::AcqRel);
        if reachable != was_online {
            tracing::info!(host = %self.host, online = reachable, "Connectivity changed");
        }
        reachable && !was_online
    }

    /// Probe forever, sending [`Trigger::ConnectivityRestored`] on each
    /// transition back online. Stops when the receiver is gone.
    pub fn spawn_monitor(self: Arc<Self>, triggers: mpsc::Sender<Trigger>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(host = %self.host, interval_secs = self.interval.as_secs(), "Connectivity monitor started");
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if self.probe().await && triggers.send(Trigger::ConnectivityRestored).await.is_err() {
                    break;
                }
                if triggers.is_closed() {
                    break;
                }
            }
            tracing::info!("Connectivity monitor stopped");
        })
    }
}

impl Default for ProbeConnectivity {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_HOST)
    }
}

impl Connectivity for ProbeConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reports_transition_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let probe = ProbeConnectivity::new(listener.local_addr().unwrap().to_string());
        assert!(!probe.is_online());

        assert!(probe.probe().await);
        assert!(probe.is_online());
        assert!(!probe.probe().await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = ProbeConnectivity::new(addr);
        assert!(!probe.probe().await);
        assert!(!probe.is_online());
    }

    #[tokio::test]
    async fn test_monitor_sends_restored_trigger() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let probe = Arc::new(
            ProbeConnectivity::new(listener.local_addr().unwrap().to_string())
                .with_interval(Duration::from_millis(10)),
        );
        let (tx, mut rx) = mpsc::channel(4);

        let handle = probe.clone().spawn_monitor(tx);
        assert_eq!(rx.recv().await, Some(Trigger::ConnectivityRestored));

        drop(rx);
        handle.await.unwrap();
    }
}
