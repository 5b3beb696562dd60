//! Recurring status queries for one job at a time.
//!
//! [`StatusPoller::start`] spawns a single polling task per job and hands back its
//! [`CancellationToken`]. The task only queries and reports: every result travels to the
//! owner as a [`PollUpdate`] tagged with the job it belongs to, and the owner applies it.
//! Starting another job cancels the previous task first, so at most one timer is ever live
//! and nothing from a superseded job reaches the owner.
//!
//! The first query goes out as soon as the activity starts; later ones follow on a fixed
//! cadence. A query still waiting for its response holds up the next tick, and ticks missed
//! that way are skipped rather than bunched up.

use crate::api::JobApi;
use crate::models::JobId;
use crate::progress::{normalize, Progress, StatusPhase};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    pub interval: Duration,
    /// `None` retries failed queries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    NotPolling,
    Polling {
        job_id: JobId,
        last_phase: Option<StatusPhase>,
    },
    Stopped {
        job_id: JobId,
        last_phase: Option<StatusPhase>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Progress(Progress),
    /// The query failed; polling carries on.
    Failed(String),
    /// Too many failures in a row; polling is over.
    GaveUp(String),
}

impl TickOutcome {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Progress(progress) => progress.phase.is_terminal(),
            Self::Failed(_) => false,
            Self::GaveUp(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub job_id: JobId,
    pub outcome: TickOutcome,
}

struct Activity {
    job_id: JobId,
    token: CancellationToken,
    updates: mpsc::UnboundedReceiver<PollUpdate>,
    task: JoinHandle<()>,
}

pub struct StatusPoller {
    api: Arc<dyn JobApi>,
    cadence: Cadence,
    state: PollState,
    activity: Option<Activity>,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn JobApi>, cadence: Cadence) -> Self {
        Self {
            api,
            cadence,
            state: PollState::NotPolling,
            activity: None,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.state, PollState::Polling { .. })
    }

    /// Begins polling `job_id`, superseding whatever was being polled before.
    pub fn start(&mut self, job_id: JobId) -> CancellationToken {
        self.cancel();

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_job(
            Arc::clone(&self.api),
            job_id.clone(),
            self.cadence,
            token.clone(),
            tx,
        ));

        info!(%job_id, interval_ms = self.cadence.interval.as_millis() as u64, "polling started");
        self.state = PollState::Polling {
            job_id: job_id.clone(),
            last_phase: None,
        };
        self.activity = Some(Activity {
            job_id,
            token: token.clone(),
            updates: rx,
            task,
        });

        token
    }

    /// Stops the current activity. Nothing it has in flight will be delivered.
    pub fn cancel(&mut self) {
        if self.activity.is_some() {
            debug!("cancelling active polling");
        }
        self.finish();
    }

    /// Waits for the next update of the current activity.
    ///
    /// Returns `None` once the activity is over or its token has been cancelled, dropping
    /// anything still queued. A terminal update is returned exactly once, after which the
    /// poller is `Stopped`.
    pub async fn next_update(&mut self) -> Option<PollUpdate> {
        loop {
            let activity = self.activity.as_mut()?;
            if activity.token.is_cancelled() {
                self.finish();
                return None;
            }
            let received = activity.updates.recv().await;
            let Some(update) = received.filter(|_| !activity.token.is_cancelled()) else {
                self.finish();
                return None;
            };

            if update.job_id != activity.job_id {
                debug!(stale = %update.job_id, current = %activity.job_id, "dropping stale update");
                continue;
            }

            if let (PollState::Polling { last_phase, .. }, TickOutcome::Progress(progress)) =
                (&mut self.state, &update.outcome)
            {
                *last_phase = Some(progress.phase);
            }

            if update.outcome.is_terminal() {
                info!(job_id = %update.job_id, "polling finished");
                self.finish();
            }
            return Some(update);
        }
    }

    fn finish(&mut self) {
        if let Some(activity) = self.activity.take() {
            activity.token.cancel();
            activity.task.abort();
        }

        if let PollState::Polling { job_id, last_phase } = &self.state {
            self.state = PollState::Stopped {
                job_id: job_id.clone(),
                last_phase: *last_phase,
            };
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.finish();
    }
}

async fn poll_job(
    api: Arc<dyn JobApi>,
    job_id: JobId,
    cadence: Cadence,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<PollUpdate>,
) {
    let mut ticker = time::interval(cadence.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            response = api.status(&job_id) => response,
        };

        let outcome = match response {
            Ok(payload) => {
                failures = 0;
                let progress = normalize(&payload);
                debug!(%job_id, phase = %progress.phase, percent = progress.percent, "status");
                TickOutcome::Progress(progress)
            }
            Err(err) => {
                failures += 1;
                warn!(%job_id, failures, "status check failed: {}", err);
                match cadence.max_consecutive_failures {
                    Some(max) if failures >= max => TickOutcome::GaveUp(format!(
                        "status unavailable after {} attempts: {}",
                        failures, err
                    )),
                    _ => TickOutcome::Failed(err.to_string()),
                }
            }
        };

        let terminal = outcome.is_terminal();
        if token.is_cancelled()
            || tx
                .send(PollUpdate {
                    job_id: job_id.clone(),
                    outcome,
                })
                .is_err()
        {
            break;
        }
        if terminal {
            break;
        }
    }
}
