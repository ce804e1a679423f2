//! Background scheduler for periodic sync.
//!
//! Every tick syncs each registered user through the [`SyncService`]. The
//! delay between ticks is the configured interval with jitter. A
//! [`SchedulerHandle`] can force a tick, pause, resume or stop the loop.

use std::sync::Arc;
use std::time::Duration;

use capsync_core::SyncConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::service::SyncService;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between ticks.
    pub sync_interval: Duration,
    /// Maximum jitter added to the interval (fraction 0.0-1.0).
    pub jitter_fraction: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(60 * 60),
            jitter_fraction: 0.1,
        }
    }
}

impl SchedulerConfig {
    pub fn new(sync_interval: Duration) -> Self {
        Self {
            sync_interval,
            ..Default::default()
        }
    }

    /// Uses `default_sync_interval` from the sync configuration.
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self::new(config.sync_interval())
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Next delay: the interval plus or minus up to `jitter_fraction` of it.
    pub fn next_sync_delay(&self) -> Duration {
        let base = self.sync_interval.as_secs_f64();
        let range = base * self.jitter_fraction;
        if range <= 0.0 {
            return self.sync_interval;
        }
        let jitter = rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a tick now, even while paused.
    SyncNow,
    Pause,
    Resume,
    Stop,
}

/// Scheduler state.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub paused: bool,
    /// Ticks run so far.
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    /// Users whose run failed outright in the last tick.
    pub failed_users: Vec<String>,
}

impl SchedulerState {
    fn record_tick(&mut self, failed_users: Vec<String>) {
        self.ticks += 1;
        self.last_tick = Some(Utc::now());
        self.failed_users = failed_users;
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Periodic sync loop.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(SchedulerState::default())),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Runs ticks for `users` until stopped.
    ///
    /// The first tick runs immediately. A user whose token cannot be
    /// obtained is skipped for that tick; the others still sync.
    pub async fn run(self, service: Arc<SyncService>, users: Vec<String>) {
        let Self {
            config,
            state,
            mut command_rx,
            ..
        } = self;

        info!(
            interval_secs = config.sync_interval.as_secs(),
            users = users.len(),
            "scheduler started"
        );

        tick(&state, &service, &users).await;

        loop {
            let delay = config.next_sync_delay();
            debug!(delay_secs = delay.as_secs(), "scheduling next sync");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if state.read().await.paused {
                        debug!("scheduler paused, skipping tick");
                        continue;
                    }
                    tick(&state, &service, &users).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::SyncNow) => {
                            debug!("received SyncNow");
                            tick(&state, &service, &users).await;
                        }
                        Some(SchedulerCommand::Pause) => {
                            info!("scheduler paused");
                            state.write().await.paused = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            info!("scheduler resumed");
                            state.write().await.paused = false;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn tick(state: &SharedSchedulerState, service: &SyncService, users: &[String]) {
    let mut failed_users = Vec::new();
    for user_id in users {
        match service.sync_user(user_id).await {
            Ok(result) => debug!(
                user_id = %user_id,
                events = result.events_synced(),
                failed = result.calendars_failed.len(),
                "scheduled sync finished"
            ),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "scheduled sync failed");
                failed_users.push(user_id.clone());
            }
        }
    }
    state.write().await.record_tick(failed_users);
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::SyncNow).await
    }

    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{FeedHealthTracker, HealthPolicy, MemoryHealthStore};
    use crate::notify::LogNotificationSink;
    use crate::store::MemoryCapacityStore;
    use crate::token::StaticTokenProvider;
    use capsync_providers::CannedTransport;

    #[test]
    fn delay_stays_within_jitter() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.1);
        let delays: Vec<_> = (0..200).map(|_| config.next_sync_delay()).collect();
        assert!(delays.iter().all(|d| (53.999..=66.001).contains(&d.as_secs_f64())));
        // not a constant offset
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[test]
    fn zero_jitter_is_exact() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.0);
        assert_eq!(config.next_sync_delay(), Duration::from_secs(60));
        let config = SchedulerConfig::new(Duration::ZERO);
        assert_eq!(config.next_sync_delay(), Duration::ZERO);
    }

    #[test]
    fn interval_from_sync_config() {
        let config = SyncConfig {
            default_sync_interval: 15,
            ..SyncConfig::default()
        };
        assert_eq!(
            SchedulerConfig::from_sync_config(&config).sync_interval,
            Duration::from_secs(900)
        );
    }

    fn service(transport: Arc<CannedTransport>) -> Arc<SyncService> {
        let health = Arc::new(FeedHealthTracker::new(
            Arc::new(MemoryHealthStore::new()),
            Arc::new(LogNotificationSink),
            HealthPolicy::default(),
        ));
        Arc::new(
            SyncService::new(
                SyncConfig::default(),
                transport,
                Arc::new(StaticTokenProvider::new().with_token("alice", "tok")),
                health,
                Arc::new(MemoryCapacityStore::new()),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn scheduler_commands() {
        let transport = Arc::new(
            CannedTransport::new().with_response("/calendars/primary/events", 200, r#"{"items":[]}"#),
        );
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(3600)));
        let handle = scheduler.handle();

        let task = tokio::spawn(scheduler.run(
            service(transport.clone()),
            vec!["alice".to_string(), "bob".to_string()],
        ));

        // initial tick
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = handle.state().await;
        assert_eq!(state.ticks, 1);
        assert_eq!(state.failed_users, vec!["bob".to_string()]);
        assert_eq!(transport.requests().len(), 1);

        handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.state().await.ticks, 2);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_paused().await);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_paused().await);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paused_scheduler_skips_ticks() {
        let transport = Arc::new(
            CannedTransport::new().with_response("/calendars/primary/events", 200, r#"{"items":[]}"#),
        );
        let scheduler =
            Scheduler::new(SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.0));
        let handle = scheduler.handle();
        let task = tokio::spawn(scheduler.run(service(transport.clone()), vec!["alice".into()]));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state().await.ticks, 1);

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(handle.state().await.ticks, 1);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(handle.state().await.ticks >= 2);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
