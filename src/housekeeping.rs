use crate::api::JobApi;
use crate::errors::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupReport {
    pub message: String,
    pub deleted_files: Vec<String>,
}

/// Asks the server to purge files older than a day. No lifecycle, no retry.
pub async fn purge_old_files(api: &dyn JobApi) -> Result<CleanupReport, FetchError> {
    let response = api.cleanup().await.map_err(FetchError::from)?;

    if !response.success {
        return Err(FetchError::Upstream(
            response
                .error
                .unwrap_or_else(|| "cleanup failed".to_string()),
        ));
    }

    Ok(CleanupReport {
        message: response
            .message
            .unwrap_or_else(|| format!("Cleaned up {} old files", response.deleted_files.len())),
        deleted_files: response.deleted_files,
    })
}
