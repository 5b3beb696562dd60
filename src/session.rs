use crate::api::JobApi;
use crate::errors::{ClientError, SelectionError, SubmitError};
use crate::metadata::fetch_info;
use crate::models::{JobId, VideoInfo};
use crate::poller::{Cadence, PollState, PollUpdate, StatusPoller, TickOutcome};
use crate::progress::{normalize, JobDetail, Progress, StatusPhase};
use crate::selector::VariantSelector;
use crate::submitter::submit_job;
use crate::validator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Client-side view of the one job being tracked.
///
/// `download_url` is only ever set in `Completed` and `detail.error_message` only in `Error`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSession {
    pub job_id: JobId,
    pub phase: StatusPhase,
    pub progress_percent: u8,
    pub label: String,
    pub detail: JobDetail,
    pub download_url: Option<String>,
}

impl JobSession {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            phase: StatusPhase::Idle,
            progress_percent: 0,
            label: "Waiting for the server".to_string(),
            detail: JobDetail::default(),
            download_url: None,
        }
    }

    fn apply(&mut self, progress: &Progress) {
        self.phase = progress.phase;
        self.progress_percent = progress.percent.min(100);
        self.label = progress.label.clone();
        self.detail = progress.detail.clone();
        if self.phase != StatusPhase::Error {
            self.detail.error_message = None;
        }
        self.download_url = match self.phase {
            StatusPhase::Completed => progress.download_url.clone(),
            _ => None,
        };
    }

    fn fail(&mut self, message: &str) {
        self.phase = StatusPhase::Error;
        self.progress_percent = 0;
        self.label = format!("Error: {message}");
        self.detail.error_message = Some(message.to_string());
        self.download_url = None;
    }
}

/// Everything the client knows: the loaded video, the chosen variant, the tracked job and
/// the polling activity behind it.
pub struct ClientSession {
    api: Arc<dyn JobApi>,
    reference: Option<String>,
    info: Option<VideoInfo>,
    selector: VariantSelector,
    job: Option<JobSession>,
    poller: StatusPoller,
}

impl ClientSession {
    pub fn new(api: Arc<dyn JobApi>, cadence: Cadence) -> Self {
        let poller = StatusPoller::new(Arc::clone(&api), cadence);
        Self {
            api,
            reference: None,
            info: None,
            selector: VariantSelector::new(),
            job: None,
            poller,
        }
    }

    /// Validates `reference` and loads its metadata, replacing whatever was loaded before.
    pub async fn load_info(&mut self, reference: &str) -> Result<&VideoInfo, ClientError> {
        let reference = validator::check(reference)?.to_string();

        self.reference = None;
        self.info = None;
        self.selector.clear();

        let info = fetch_info(self.api.as_ref(), &reference).await?;
        self.selector.reset(&info);
        self.reference = Some(reference);
        Ok(self.info.insert(info))
    }

    pub fn info(&self) -> Option<&VideoInfo> {
        self.info.as_ref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selector.selected()
    }

    pub fn select(&mut self, variant_id: &str) -> Result<(), SelectionError> {
        match &self.info {
            Some(info) => self.selector.select(info, variant_id),
            None => Err(SelectionError::InvalidSelection(variant_id.to_string())),
        }
    }

    /// Submits the loaded reference in the selected variant and starts tracking the job.
    pub async fn submit(&mut self) -> Result<JobId, ClientError> {
        let (Some(reference), Some(info)) = (&self.reference, &self.info) else {
            return Err(SubmitError::NoMetadata.into());
        };
        let variant = self.selector.selected().ok_or(SubmitError::NoMetadata)?;
        if info.variant(variant).is_none() {
            return Err(SubmitError::Selection(SelectionError::InvalidSelection(
                variant.to_string(),
            ))
            .into());
        }

        let job_id = submit_job(self.api.as_ref(), reference, variant).await?;
        self.start_polling(job_id.clone());
        Ok(job_id)
    }

    /// Tracks `job_id` from scratch, dropping any job tracked so far.
    pub fn start_polling(&mut self, job_id: JobId) -> CancellationToken {
        self.job = Some(JobSession::new(job_id.clone()));
        self.poller.start(job_id)
    }

    /// Waits for the next status update and folds it into the job session.
    pub async fn next_update(&mut self) -> Option<PollUpdate> {
        let update = self.poller.next_update().await?;
        self.apply(&update);
        Some(update)
    }

    fn apply(&mut self, update: &PollUpdate) -> bool {
        let Some(job) = self.job.as_mut() else {
            return false;
        };
        if job.job_id != update.job_id {
            debug!(stale = %update.job_id, current = %job.job_id, "ignoring update for another job");
            return false;
        }

        match &update.outcome {
            TickOutcome::Progress(progress) => job.apply(progress),
            TickOutcome::GaveUp(message) => job.fail(message),
            TickOutcome::Failed(_) => {}
        }
        true
    }

    pub fn job(&self) -> Option<&JobSession> {
        self.job.as_ref()
    }

    pub fn poll_state(&self) -> &PollState {
        self.poller.state()
    }

    pub fn cancel(&mut self) {
        self.poller.cancel();
    }

    /// One status query outside of any polling activity.
    pub async fn status_once(&self, job_id: &JobId) -> Result<Progress, ClientError> {
        let payload = self.api.status(job_id).await?;
        Ok(normalize(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiError, FetchError, ValidationError};
    use crate::models::{InfoResponse, SubmitResponse};
    use crate::testing::{completed, failed, status, two_variant_info, ScriptedApi};

    const LINK: &str = "https://www.youtube.com/watch?v=abc123";

    fn accepted(id: &str) -> Result<SubmitResponse, ApiError> {
        Ok(SubmitResponse {
            success: true,
            download_id: Some(id.to_string()),
            message: Some("Download started".to_string()),
            error: None,
        })
    }

    fn session(api: ScriptedApi) -> ClientSession {
        ClientSession::new(Arc::new(api), Cadence::default())
    }

    #[tokio::test]
    async fn metadata_defaults_to_first_variant() {
        let mut session = session(ScriptedApi::default().with_info(two_variant_info()));
        let info = session.load_info(LINK).await.unwrap();
        assert_eq!(info.variants.len(), 2);
        assert_eq!(session.selected(), Some("v1"));
    }

    #[tokio::test]
    async fn invalid_reference_short_circuits() {
        let mut session = session(ScriptedApi::default());
        let err = session.load_info("https://vimeo.com/1").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::Unrecognized(_))
        ));
        assert!(session.info().is_none());
    }

    #[tokio::test]
    async fn failed_reload_discards_previous_info() {
        let api = Arc::new(ScriptedApi::default().with_info(two_variant_info()));
        let mut session = ClientSession::new(api.clone(), Cadence::default());
        session.load_info(LINK).await.unwrap();

        *api.info.lock().unwrap() = Some(Ok(InfoResponse {
            success: false,
            error: Some("Video unavailable".to_string()),
            ..Default::default()
        }));
        let err = session.load_info(LINK).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Fetch(FetchError::Upstream("Video unavailable".to_string()))
        );
        assert!(session.info().is_none());
        assert_eq!(session.selected(), None);
    }

    #[tokio::test]
    async fn invalid_selection_keeps_previous() {
        let mut session = session(ScriptedApi::default().with_info(two_variant_info()));
        session.load_info(LINK).await.unwrap();
        session.select("v2").unwrap();
        assert_eq!(
            session.select("nope"),
            Err(SelectionError::InvalidSelection("nope".to_string()))
        );
        assert_eq!(session.selected(), Some("v2"));
    }

    #[tokio::test]
    async fn submit_requires_metadata() {
        let mut session = session(ScriptedApi::default().with_submit(accepted("dl_1")));
        assert_eq!(
            session.submit().await,
            Err(ClientError::Submit(SubmitError::NoMetadata))
        );
        assert!(session.job().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_lifecycle_reaches_completed() {
        let api = ScriptedApi::default()
            .with_info(two_variant_info())
            .with_submit(accepted("dl_1"))
            .with_statuses(
                "dl_1",
                vec![Ok(status("processing")), Ok(status("downloading")), Ok(completed("X"))],
            );
        let mut session = session(api);
        session.load_info(LINK).await.unwrap();
        let job_id = session.submit().await.unwrap();
        assert_eq!(job_id, JobId::new("dl_1"));
        assert_eq!(session.job().unwrap().phase, StatusPhase::Idle);

        let mut percents = Vec::new();
        while session.next_update().await.is_some() {
            let job = session.job().unwrap();
            percents.push(job.progress_percent);
            if job.phase != StatusPhase::Completed {
                assert!(job.download_url.is_none());
            }
        }

        assert_eq!(percents, vec![25, 50, 100]);
        let job = session.job().unwrap();
        assert_eq!(job.phase, StatusPhase::Completed);
        assert_eq!(job.download_url.as_deref(), Some("X"));
        assert!(matches!(session.poll_state(), PollState::Stopped { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_records_message() {
        let api = ScriptedApi::default()
            .with_info(two_variant_info())
            .with_submit(accepted("dl_1"))
            .with_statuses("dl_1", vec![Ok(status("downloading")), Ok(failed("disk full"))]);
        let mut session = session(api);
        session.load_info(LINK).await.unwrap();
        session.submit().await.unwrap();

        while session.next_update().await.is_some() {}

        let job = session.job().unwrap();
        assert_eq!(job.phase, StatusPhase::Error);
        assert_eq!(job.progress_percent, 0);
        assert_eq!(job.detail.error_message.as_deref(), Some("disk full"));
        assert!(job.download_url.is_none());
        assert!(!matches!(session.poll_state(), PollState::Polling { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_replaces_the_tracked_job() {
        let api = ScriptedApi::default()
            .with_info(two_variant_info())
            .with_submit(accepted("job_a"))
            .with_submit(accepted("job_b"))
            .with_statuses("job_a", vec![Ok(status("downloading"))])
            .with_statuses("job_b", vec![Ok(completed("B"))]);
        let mut session = session(api);
        session.load_info(LINK).await.unwrap();
        session.submit().await.unwrap();
        session.next_update().await.unwrap();

        session.submit().await.unwrap();
        let update = session.next_update().await.unwrap();
        assert_eq!(update.job_id, JobId::new("job_b"));
        assert!(session.next_update().await.is_none());

        let job = session.job().unwrap();
        assert_eq!(job.job_id, JobId::new("job_b"));
        assert_eq!(job.download_url.as_deref(), Some("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn updates_for_other_jobs_are_fenced() {
        let api = ScriptedApi::default().with_statuses("job_b", vec![Ok(status("processing"))]);
        let mut session = session(api);
        session.start_polling(JobId::new("job_b"));

        let stale = PollUpdate {
            job_id: JobId::new("job_a"),
            outcome: TickOutcome::Progress(normalize(&completed("A"))),
        };
        assert!(!session.apply(&stale));
        let job = session.job().unwrap();
        assert_eq!(job.phase, StatusPhase::Idle);
        assert!(job.download_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_activity_leaves_job_untouched() {
        let api = Arc::new(ScriptedApi::default().with_statuses("dl_1", vec![Ok(completed("X"))]));
        let mut session = ClientSession::new(api.clone(), Cadence::default());
        let token = session.start_polling(JobId::new("dl_1"));

        while api.calls_for("dl_1") == 0 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        token.cancel();

        assert!(session.next_update().await.is_none());
        let job = session.job().unwrap();
        assert_eq!(job.phase, StatusPhase::Idle);
        assert!(job.download_url.is_none());
        assert!(matches!(session.poll_state(), PollState::Stopped { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn giving_up_lands_in_error() {
        let api = ScriptedApi::default().with_statuses("dl_1", vec![Err(ApiError::Timeout)]);
        let cadence = Cadence {
            max_consecutive_failures: Some(2),
            ..Cadence::default()
        };
        let mut session = ClientSession::new(Arc::new(api), cadence);
        session.start_polling(JobId::new("dl_1"));

        while session.next_update().await.is_some() {}

        let job = session.job().unwrap();
        assert_eq!(job.phase, StatusPhase::Error);
        assert!(job.detail.error_message.is_some());
    }
}
