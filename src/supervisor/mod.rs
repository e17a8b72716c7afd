pub mod clock;

pub use clock::{Clock, SystemClock};

use crate::config::ScheduleConfig;
use crate::model::ScanError;
use crate::notifier::AlertDispatcher;
use crate::pipeline::ScanReport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One complete scan attempt.
#[async_trait::async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self) -> Result<ScanReport, ScanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running { attempt: u32 },
    Sleeping,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed { attempts: u32, report: ScanReport },
    Exhausted { attempts: u32, last_error: ScanError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub interval: Duration,
}

impl From<&ScheduleConfig> for RetryPolicy {
    fn from(schedule: &ScheduleConfig) -> Self {
        Self {
            max_attempts: schedule.max_attempts.max(1),
            retry_delay: Duration::from_secs(schedule.retry_delay_seconds),
            interval: Duration::from_secs(schedule.check_interval_seconds),
        }
    }
}

/// Serial scan loop: retry with a fixed backoff, alert once on exhaustion,
/// then sleep until the next cycle.
pub struct Supervisor {
    scanner: Box<dyn Scanner>,
    alerts: Arc<AlertDispatcher>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    state: CycleState,
    cycles: u64,
}

impl Supervisor {
    pub fn new(
        scanner: Box<dyn Scanner>,
        alerts: Arc<AlertDispatcher>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self { scanner, alerts, clock, policy, state: CycleState::Idle, cycles: 0 }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Runs attempts until one succeeds or the budget is spent. Never sleeps
    /// after the last attempt.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        info!(
            "🔄 Scan cycle #{} started at {}",
            self.cycles,
            self.clock.now().format("%d/%m/%Y %H:%M")
        );

        let mut attempt = 1;
        let outcome = loop {
            self.state = CycleState::Running { attempt };
            match self.scanner.scan().await {
                Ok(report) => {
                    info!(
                        "✅ Scan finished ({} alerts, attempt {}/{})",
                        report.dispatched, attempt, self.policy.max_attempts
                    );
                    break CycleOutcome::Completed { attempts: attempt, report };
                }
                Err(e) if attempt < self.policy.max_attempts => {
                    warn!("⚠️ Attempt {}/{} failed: {}", attempt, self.policy.max_attempts, e);
                    self.clock.sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("❌ All {} attempts failed: {}", attempt, e);
                    self.alerts.notify_admin(&format!("❌ Crash Bot AO: {}", e)).await;
                    break CycleOutcome::Exhausted { attempts: attempt, last_error: e };
                }
            }
        };

        self.state = CycleState::Idle;
        outcome
    }

    async fn rest(&mut self) {
        self.state = CycleState::Sleeping;
        info!("💤 Next scan in {}s", self.policy.interval.as_secs());
        self.clock.sleep(self.policy.interval).await;
        self.state = CycleState::Idle;
    }

    pub async fn run_forever(&mut self) {
        loop {
            match self.run_cycle().await {
                CycleOutcome::Completed { attempts, report } => info!(
                    "📊 Cycle #{}: {} pages, {} new, {} seen, {} failed deliveries ({} attempts)",
                    self.cycles,
                    report.harvest.pages_read,
                    report.rows.accepted,
                    report.rows.already_seen,
                    report.delivery_failures,
                    attempts
                ),
                CycleOutcome::Exhausted { attempts, last_error } => warn!(
                    "Cycle #{} gave up after {} attempts: {}",
                    self.cycles, attempts, last_error
                ),
            }
            self.rest().await;
        }
    }
}

#[cfg(test)]
impl Supervisor {
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs `n` cycles, each followed by the interval sleep.
    pub async fn run_cycles(&mut self, n: u64) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(n as usize);
        for _ in 0..n {
            outcomes.push(self.run_cycle().await);
            self.rest().await;
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Subscriber, SubscriptionFilter};
    use crate::model::BrowserError;
    use crate::testing::{ManualClock, RecordingMessenger};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results; succeeds once the script runs out.
    struct ScriptedScanner {
        script: Mutex<VecDeque<Result<ScanReport, ScanError>>>,
        calls: Arc<Mutex<u32>>,
    }

    impl ScriptedScanner {
        fn new(script: Vec<Result<ScanReport, ScanError>>) -> (Self, Arc<Mutex<u32>>) {
            let calls = Arc::new(Mutex::new(0));
            (Self { script: Mutex::new(script.into()), calls: calls.clone() }, calls)
        }
    }

    #[async_trait::async_trait]
    impl Scanner for ScriptedScanner {
        async fn scan(&self) -> Result<ScanReport, ScanError> {
            *self.calls.lock().expect("calls") += 1;
            self.script
                .lock()
                .expect("script")
                .pop_front()
                .unwrap_or_else(|| Ok(ScanReport::default()))
        }
    }

    fn nav_error() -> ScanError {
        ScanError::Navigation {
            stage: "navigation",
            source: BrowserError::HttpError("connection reset".into()),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_secs(60),
            interval: Duration::from_secs(14400),
        }
    }

    struct Setup {
        supervisor: Supervisor,
        calls: Arc<Mutex<u32>>,
        messenger: Arc<RecordingMessenger>,
        clock: Arc<ManualClock>,
    }

    fn setup(script: Vec<Result<ScanReport, ScanError>>) -> Setup {
        let (scanner, calls) = ScriptedScanner::new(script);
        let messenger = Arc::new(RecordingMessenger::default());
        let alerts = Arc::new(AlertDispatcher::new(
            messenger.clone(),
            vec![Subscriber {
                name: "Admin".into(),
                id: "admin".into(),
                subscriptions: SubscriptionFilter::All,
            }],
        ));
        let clock = Arc::new(ManualClock::at(2026, 10, 19));
        let supervisor = Supervisor::new(Box::new(scanner), alerts, clock.clone(), policy());
        Setup { supervisor, calls, messenger, clock }
    }

    #[tokio::test]
    async fn first_success_ends_the_cycle() {
        let mut s = setup(vec![]);
        let outcome = s.supervisor.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Completed { attempts: 1, .. }));
        assert_eq!(*s.calls.lock().unwrap(), 1);
        assert!(s.clock.slept().is_empty());
        assert!(s.messenger.messages().is_empty());
        assert_eq!(s.supervisor.state(), CycleState::Idle);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_after_backoff() {
        let mut s = setup(vec![Err(nav_error())]);
        let outcome = s.supervisor.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Completed { attempts: 2, .. }));
        assert_eq!(s.clock.slept(), vec![Duration::from_secs(60)]);
        assert!(s.messenger.messages().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_send_exactly_one_alert() {
        let mut s = setup((0..4).map(|_| Err(nav_error())).collect());
        let outcome = s.supervisor.run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(*s.calls.lock().unwrap(), 3);
        // backoff only between attempts
        assert_eq!(s.clock.slept(), vec![Duration::from_secs(60); 2]);

        let messages = s.messenger.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "admin");
        assert!(messages[0].1.starts_with("❌ Crash Bot AO: "));
        assert!(messages[0].1.contains("connection reset"));
    }

    #[tokio::test]
    async fn next_cycle_runs_after_an_exhausted_one() {
        let mut s = setup(vec![Err(nav_error()), Err(nav_error()), Err(nav_error())]);
        let outcomes = s.supervisor.run_cycles(2).await;

        assert!(matches!(outcomes[0], CycleOutcome::Exhausted { .. }));
        assert!(matches!(outcomes[1], CycleOutcome::Completed { attempts: 1, .. }));
        assert_eq!(s.supervisor.cycles(), 2);
        assert_eq!(
            s.clock.slept(),
            vec![
                Duration::from_secs(60),
                Duration::from_secs(60),
                Duration::from_secs(14400),
                Duration::from_secs(14400),
            ]
        );
    }

    #[test]
    fn policy_comes_from_schedule() {
        let schedule = ScheduleConfig {
            max_attempts: 0,
            retry_delay_seconds: 5,
            check_interval_seconds: 3600,
        };
        let policy = RetryPolicy::from(&schedule);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
        assert_eq!(policy.interval, Duration::from_secs(3600));
    }
}
