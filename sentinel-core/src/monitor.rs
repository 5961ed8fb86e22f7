use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info};

use crate::{engine::SnapshotEngine, types::Snapshot};

/// Cloneable handle requesting out-of-schedule refreshes.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    trigger_sink: mpsc::Sender<()>,
}

impl RefreshTrigger {
    /// Returns false if a refresh is already queued.
    pub fn trigger(&self) -> bool {
        match self.trigger_sink.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Manual refresh already queued");
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!("Refresh task is not running");
                false
            }
        }
    }
}

/// Drives an engine on a fixed period and on manual triggers, one cycle at a time.
pub struct Monitor {
    engine: Arc<SnapshotEngine>,
    refresh_trigger: RefreshTrigger,
    refresh_task_handle: JoinHandle<()>,
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.refresh_task_handle.abort();
    }
}

impl Monitor {
    /// Spawns the refresh loop. The first cycle runs right away.
    pub fn start(engine: Arc<SnapshotEngine>, poll_interval: Duration) -> Self {
        // one pending manual refresh at most, extra triggers are coalesced
        let (trigger_sink, trigger_stream) = mpsc::channel(1);

        let refresh_task_handle = start_refresh(engine.clone(), poll_interval, trigger_stream);

        Monitor {
            engine,
            refresh_trigger: RefreshTrigger { trigger_sink },
            refresh_task_handle,
        }
    }

    pub fn engine(&self) -> &Arc<SnapshotEngine> {
        &self.engine
    }

    pub fn trigger(&self) -> bool {
        self.refresh_trigger.trigger()
    }

    pub fn refresh_trigger(&self) -> RefreshTrigger {
        self.refresh_trigger.clone()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.engine.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.engine.subscribe()
    }
}

fn start_refresh(
    engine: Arc<SnapshotEngine>,
    poll_interval: Duration,
    mut trigger_stream: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Monitoring {} addresses every {:?}",
            engine.addresses().len(),
            poll_interval
        );

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => debug!("Scheduled refresh"),
                trigger = trigger_stream.recv() => match trigger {
                    Some(()) => debug!("Manual refresh"),
                    None => break,
                },
            }

            // cycles run inline, so a trigger arriving now waits in the channel
            match engine.refresh().await {
                Ok(snapshot) => debug!(
                    "Cycle {} published, {} changed",
                    snapshot.cycle,
                    snapshot.changed_rows().count()
                ),
                Err(e) => error!("{}", e),
            }
        }

        debug!("Refresh task stopped");
    })
}

#[cfg(test)]
mod test {
    use tokio::time::Instant;

    use super::*;
    use crate::{config::EngineConfig, engine::test::ScriptedFetcher, types::RawBalance};

    const POLL_INTERVAL: Duration = Duration::from_secs(30);

    fn prepare_monitor(fetcher: Arc<ScriptedFetcher>) -> Monitor {
        let config = EngineConfig::new(vec!["P".into(), "Q".into()], "TOKEN", 0);
        let engine = Arc::new(SnapshotEngine::new(&config, fetcher).unwrap());
        Monitor::start(engine, POLL_INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately_then_on_schedule() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("P", &[Some(1)]), ("Q", &[Some(2)])]));
        let monitor = prepare_monitor(fetcher.clone());
        let mut receiver = monitor.subscribe();
        let start = Instant::now();

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().cycle, 1);
        assert!(start.elapsed() < POLL_INTERVAL);

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().cycle, 2);
        assert!(start.elapsed() >= POLL_INTERVAL);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("P", &[Some(1)]), ("Q", &[Some(2)])]));
        let monitor = prepare_monitor(fetcher);
        let mut receiver = monitor.subscribe();

        receiver.changed().await.unwrap();
        receiver.borrow_and_update();
        let start = Instant::now();

        assert!(monitor.trigger());
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().cycle, 2);
        assert!(start.elapsed() < POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_cycle_runs_after_it() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(&[("P", &[Some(1), Some(3)]), ("Q", &[Some(2), Some(4)])])
                .with_delay(Duration::from_secs(5)),
        );
        let monitor = prepare_monitor(fetcher.clone());
        let mut receiver = monitor.subscribe();
        let start = Instant::now();

        // cycle 1 is still waiting on its fetches
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(monitor.snapshot().cycle, 0);
        assert!(monitor.trigger());

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().cycle, 1);
        let first_published = start.elapsed();
        assert!(first_published >= Duration::from_secs(5));

        receiver.changed().await.unwrap();
        let snapshot = receiver.borrow_and_update().clone();
        assert_eq!(snapshot.cycle, 2);
        assert_eq!(snapshot.get(&"P".into()).unwrap().current, RawBalance::from(3u64));
        assert!(start.elapsed() >= first_published + Duration::from_secs(5));
        assert!(start.elapsed() < POLL_INTERVAL);

        assert_eq!(fetcher.calls(), 4);
        assert!(fetcher.max_active() <= monitor.engine().addresses().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_triggers_are_dropped_while_one_is_queued() {
        let fetcher = Arc::new(
            ScriptedFetcher::new(&[("P", &[Some(1)]), ("Q", &[Some(2)])])
                .with_delay(Duration::from_secs(1)),
        );
        let monitor = prepare_monitor(fetcher);

        // the refresh task has not been polled yet
        let trigger = monitor.refresh_trigger();
        assert!(trigger.trigger());
        assert!(!monitor.trigger());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_failure_does_not_stop_schedule() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[
            ("P", &[None, Some(5)]),
            ("Q", &[None, Some(6)]),
        ]));
        let monitor = prepare_monitor(fetcher);
        let mut receiver = monitor.subscribe();

        receiver.changed().await.unwrap();
        assert!(receiver.borrow_and_update().is_cycle_failure());

        receiver.changed().await.unwrap();
        let snapshot = receiver.borrow_and_update().clone();
        assert!(!snapshot.is_cycle_failure());
        assert_eq!(snapshot.changed_rows().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_refreshing() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("P", &[Some(1)]), ("Q", &[Some(2)])]));
        let monitor = prepare_monitor(fetcher.clone());
        let engine = monitor.engine().clone();
        let mut receiver = monitor.subscribe();

        receiver.changed().await.unwrap();
        drop(monitor);

        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert_eq!(engine.snapshot().cycle, 1);
        assert_eq!(fetcher.calls(), 2);
    }
}
