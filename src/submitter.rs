use crate::api::JobApi;
use crate::errors::SubmitError;
use crate::models::JobId;
use tracing::info;

/// Starts a backend job for `reference` in the given variant.
pub async fn submit_job(
    api: &dyn JobApi,
    reference: &str,
    variant_id: &str,
) -> Result<JobId, SubmitError> {
    let response = api.submit(reference, variant_id).await?;

    if !response.success {
        let message = response
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "failed to start download".to_string());
        return Err(SubmitError::Rejected(message));
    }

    let job_id = response
        .download_id
        .filter(|id| !id.trim().is_empty())
        .map(JobId::new)
        .ok_or_else(|| SubmitError::Rejected("server returned no download id".to_string()))?;

    info!(%job_id, variant = variant_id, "job submitted");
    Ok(job_id)
}
