use crate::api::JobApi;
use crate::errors::FetchError;
use crate::models::{VariantOption, VideoInfo};
use tracing::info;

/// Asks the server to describe `reference`. The caller has already validated it.
pub async fn fetch_info(api: &dyn JobApi, reference: &str) -> Result<VideoInfo, FetchError> {
    let response = api.get_info(reference).await?;

    if !response.success {
        let message = response
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "failed to get video information".to_string());
        return Err(FetchError::Upstream(message));
    }

    if response.qualities.is_empty() {
        return Err(FetchError::NoVariants);
    }

    let variants: Vec<VariantOption> = response.qualities.into_iter().map(Into::into).collect();
    info!(title = %response.title, variants = variants.len(), "video info loaded");

    Ok(VideoInfo {
        title: response.title,
        author: response.author,
        length: response.length,
        views: response.views,
        thumbnail: response.thumbnail,
        variants,
    })
}
