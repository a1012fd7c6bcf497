//! Monitor module: the periodic probe→aggregate→classify→store→decide loop.

mod aggregate;
mod failure;

pub use aggregate::*;
pub use failure::*;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::db::Store;
use crate::probe::Prober;
use crate::remediation::RemediationController;
use crate::state::CounterFile;

/// Orchestrates monitoring runs on a fixed interval.
///
/// One run at a time; probes inside a run fan out concurrently. Every per-run
/// error (probe, store, remediation) is contained to that run — nothing here
/// may crash the scheduler.
pub struct Monitor {
    prober: Prober,
    store: Store,
    failures: FailureStateMachine,
    controller: Arc<RemediationController>,
    maintenance: CounterFile,
    run_interval: Duration,
    retention: ChronoDuration,
    compaction_interval_runs: u32,
}

impl Monitor {
    pub fn new(cfg: &Config, store: Store, controller: Arc<RemediationController>) -> Self {
        let prober = Prober::new(cfg.targets.clone(), cfg.probes_per_target, cfg.probe_timeout);
        let failures = FailureStateMachine::new(
            CounterFile::new(&cfg.state_dir, "failure_count"),
            cfg.failure_threshold,
        );
        let maintenance = CounterFile::new(&cfg.state_dir, "maintenance_count");

        Self {
            prober,
            store,
            failures,
            controller,
            maintenance,
            run_interval: cfg.run_interval,
            retention: ChronoDuration::days(cfg.retention_days as i64),
            compaction_interval_runs: cfg.compaction_interval_runs,
        }
    }

    /// Start the periodic monitoring task. Returns a sender that stops the
    /// loop when dropped or signalled.
    pub fn start(self: Arc<Self>) -> broadcast::Sender<()> {
        let (stop_tx, mut stop_rx) = broadcast::channel(1);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.run_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = interval.tick() => {
                        self.run_once().await;
                    }
                }
            }
        });

        stop_tx
    }

    /// Execute one monitoring run end to end.
    pub async fn run_once(&self) {
        let outcomes = self.prober.run().await;
        self.process_run(&outcomes).await;
    }

    /// Everything after probing: aggregate, classify, persist, decide,
    /// maintain. Split out so the decision pipeline is testable with
    /// synthetic probe outcomes.
    async fn process_run(&self, outcomes: &[Option<f64>]) {
        let summary = aggregate(outcomes, self.prober.total_probes());
        let success_percentage = summary.success_percentage;
        let sample = summary.into_sample(Utc::now());

        tracing::info!(
            "run: {} ({}% success, {}% loss, avg {:?} ms)",
            sample.status,
            sample.success_percentage,
            sample.packet_loss_percentage,
            sample.avg_latency_ms,
        );

        // Persistence failures lose this run's sample but never the process.
        if let Err(e) = self.store.add_sample(&sample) {
            tracing::error!("failed to store sample: {}", e);
        }

        if let Some(outcome) = self.failures.observe(success_percentage, &self.controller).await {
            tracing::info!("automatic remediation outcome: {:?}", outcome);
        }

        self.maintain();
    }

    /// Retention pruning every run; full compaction every N runs.
    fn maintain(&self) {
        let cutoff = Utc::now() - self.retention;
        match self.store.prune_older_than(cutoff) {
            Ok(0) => {}
            Ok(removed) => tracing::info!("retention pruned {} rows", removed),
            Err(e) => tracing::error!("retention pruning failed: {}", e),
        }

        let runs = self.maintenance.load() + 1;
        if runs >= self.compaction_interval_runs {
            tracing::info!("compacting store after {} runs", runs);
            if let Err(e) = self.store.compact() {
                tracing::error!("compaction failed: {}", e);
            }
            if let Err(e) = self.maintenance.store(0) {
                tracing::error!("failed to reset maintenance counter: {}", e);
            }
        } else if let Err(e) = self.maintenance.store(runs) {
            tracing::error!("failed to persist maintenance counter: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Status, StatusSample, TriggerKind};
    use crate::remediation::tests::MockDevice;
    use crate::remediation::PowerCycler;
    use crate::state::CooldownFile;
    use tempfile::{NamedTempFile, TempDir};

    fn test_config(state_dir: &TempDir) -> Config {
        Config {
            targets: vec!["a".into(), "b".into(), "c".into()],
            probes_per_target: 5,
            failure_threshold: 5,
            retention_days: 14,
            compaction_interval_runs: 3,
            state_dir: state_dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn fixture(
        device: std::sync::Arc<MockDevice>,
    ) -> (Monitor, Store, TempDir, NamedTempFile) {
        let state_dir = TempDir::new().unwrap();
        let db = NamedTempFile::new().unwrap();
        let store = Store::new(db.path()).unwrap();
        let cfg = test_config(&state_dir);

        let controller = Arc::new(RemediationController::new(
            PowerCycler::Mock(device),
            cfg.cooldown,
            CooldownFile::new(&cfg.state_dir, "cooldown"),
            store.clone(),
        ));
        let monitor = Monitor::new(&cfg, store.clone(), controller);
        (monitor, store, state_dir, db)
    }

    fn run_outcomes(successes: usize) -> Vec<Option<f64>> {
        (0..15)
            .map(|i| (i < successes).then_some(15.0 + i as f64))
            .collect()
    }

    #[tokio::test]
    async fn test_successful_run_writes_up_sample() {
        let (monitor, store, _dir, _db) = fixture(MockDevice::scripted(vec![]));

        monitor.process_run(&run_outcomes(15)).await;

        let samples = store.all_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].status, Status::Up);
        assert_eq!(samples[0].success_percentage, 100);
        assert!(samples[0].avg_latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_partial_run_writes_partial_sample() {
        let (monitor, store, _dir, _db) = fixture(MockDevice::scripted(vec![]));

        monitor.process_run(&run_outcomes(8)).await;

        let samples = store.all_samples().unwrap();
        assert_eq!(samples[0].status, Status::Partial);
        assert_eq!(samples[0].success_percentage, 53);
        assert_eq!(samples[0].packet_loss_percentage, 47);
    }

    #[tokio::test]
    async fn test_five_down_runs_fire_one_automatic_remediation() {
        let device = MockDevice::scripted(vec![Ok(())]);
        let (monitor, store, _dir, _db) = fixture(device.clone());

        for _ in 0..5 {
            monitor.process_run(&run_outcomes(0)).await;
        }

        assert_eq!(device.call_count(), 1);
        let events = store.all_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger_kind, TriggerKind::Automatic);

        let samples = store.all_samples().unwrap();
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|s| s.status == Status::Down));
        assert!(samples.iter().all(|s| s.avg_latency_ms.is_none()));
    }

    #[tokio::test]
    async fn test_manual_trigger_within_cooldown_is_skipped_after_auto() {
        use crate::remediation::Outcome;

        let device = MockDevice::scripted(vec![Ok(()), Ok(())]);
        let (monitor, _store, _dir, _db) = fixture(device.clone());

        for _ in 0..5 {
            monitor.process_run(&run_outcomes(0)).await;
        }
        assert_eq!(device.call_count(), 1);

        let outcome = monitor
            .controller
            .request(TriggerKind::Manual, "manually triggered")
            .await;
        assert_eq!(outcome, Outcome::SkippedCooldown);
        assert_eq!(device.call_count(), 1);
    }

    #[tokio::test]
    async fn test_compaction_every_n_runs_resets_counter() {
        let (monitor, _store, dir, _db) = fixture(MockDevice::scripted(vec![]));
        let counter = CounterFile::new(dir.path(), "maintenance_count");

        // compaction_interval_runs = 3 in the test config
        monitor.process_run(&run_outcomes(15)).await;
        assert_eq!(counter.load(), 1);
        monitor.process_run(&run_outcomes(15)).await;
        assert_eq!(counter.load(), 2);
        monitor.process_run(&run_outcomes(15)).await;
        assert_eq!(counter.load(), 0);
        monitor.process_run(&run_outcomes(15)).await;
        assert_eq!(counter.load(), 1);
    }

    #[tokio::test]
    async fn test_retention_prunes_old_rows_during_run() {
        let (monitor, store, _dir, _db) = fixture(MockDevice::scripted(vec![]));

        let stale = Utc::now() - ChronoDuration::days(30);
        store
            .add_sample(&StatusSample {
                timestamp: stale,
                status: Status::Up,
                success_percentage: 100,
                avg_latency_ms: Some(10.0),
                max_latency_ms: Some(11.0),
                min_latency_ms: Some(9.0),
                packet_loss_percentage: 0,
            })
            .unwrap();

        monitor.process_run(&run_outcomes(15)).await;

        let samples = store.all_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].timestamp > stale);
    }
}
