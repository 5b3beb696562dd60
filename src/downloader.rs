use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode, Url};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_NAME_LEN: usize = 120;

/// Pulls finished job output from the server into a local directory.
pub struct ArtifactDownloader {
    client: Client,
    output_dir: PathBuf,
    resume: bool,
    retries: u32,
}

impl ArtifactDownloader {
    pub fn new(output_dir: &str, resume: bool, retries: u32) -> Result<Self> {
        let output_path = PathBuf::from(output_dir);
        if !output_path.exists() {
            fs::create_dir_all(&output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
        }

        let client = Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            output_dir: output_path,
            resume,
            retries: retries.max(1),
        })
    }

    pub fn progress_bar(file_name: &str) -> ProgressBar {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:30} {bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(file_name.to_string());
        pb
    }

    /// Downloads `url` as `file_name`, retrying with exponential backoff.
    pub async fn fetch(&self, url: &Url, file_name: &str, pb: &ProgressBar) -> Result<PathBuf> {
        let mut attempt = 0u32;
        let original_message = pb.message().to_string();

        loop {
            attempt += 1;

            match self.download_file(url, file_name, pb).await {
                Ok(path) => {
                    info!(path = %path.display(), "artifact saved");
                    return Ok(path);
                }
                Err(e) if attempt < self.retries => {
                    let delay_ms = backoff_delay(attempt).as_millis() as u64;
                    warn!(attempt, "download failed, retrying in {}ms: {:#}", delay_ms, e);
                    pb.set_message(format!(
                        "{} [Retry {}/{}: {}s wait...]",
                        original_message,
                        attempt,
                        self.retries,
                        delay_ms / 1000
                    ));
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    pb.set_message(original_message.clone());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn download_file(&self, url: &Url, file_name: &str, pb: &ProgressBar) -> Result<PathBuf> {
        let output_path = self.output_dir.join(file_name);
        let partial_path = partial_path(&output_path);

        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .context("HEAD request failed")?;

        let total_bytes = if response.status().is_success() {
            response
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        } else {
            None
        };

        if output_path.exists() {
            let actual_size = fs::metadata(&output_path)?.len();
            let is_valid = match total_bytes {
                Some(expected) => actual_size == expected,
                None => actual_size > 0,
            };

            if is_valid {
                pb.set_message(format!("{} (already present)", file_name));
                pb.finish();
                return Ok(output_path);
            }
            fs::remove_file(&output_path)?;
        }

        let mut current_pos = 0u64;
        if self.resume && partial_path.exists() {
            current_pos = fs::metadata(&partial_path)?.len();
        }

        if let Some(total) = total_bytes {
            if current_pos > total {
                fs::remove_file(&partial_path)?;
                return Err(anyhow!(
                    "Partial file size {} exceeds expected size {} for {}",
                    current_pos,
                    total,
                    file_name
                ));
            }
            if current_pos == total && total > 0 {
                fs::rename(&partial_path, &output_path)
                    .context("Failed to rename completed file")?;
                pb.finish();
                return Ok(output_path);
            }

            pb.set_length(total);
            pb.set_position(current_pos);
        }

        let mut request = self.client.get(url.clone());
        if current_pos > 0 {
            request = request.header("Range", format!("bytes={}-", current_pos));
        }

        let mut response = request.send().await.context("GET request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP request failed: {}", status));
        }
        if current_pos > 0 && status != StatusCode::PARTIAL_CONTENT {
            // server ignored the range, start over
            current_pos = 0;
            pb.set_position(0);
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(current_pos > 0)
            .truncate(current_pos == 0)
            .open(&partial_path)
            .context("Failed to open output file")?;

        let mut downloaded = 0u64;
        while let Some(chunk) = response.chunk().await? {
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            pb.set_position(current_pos + downloaded);
        }
        file.flush()?;
        drop(file);

        fs::rename(&partial_path, &output_path).context("Failed to rename completed file")?;

        let actual_size = fs::metadata(&output_path)?.len();
        let is_valid = match total_bytes {
            Some(expected) => actual_size == expected,
            None => actual_size > 0,
        };

        if !is_valid {
            fs::remove_file(&output_path).ok();
            pb.abandon_with_message("Size mismatch!");
            return Err(anyhow!(
                "File size mismatch for {}: expected {} bytes, got {} bytes",
                file_name,
                total_bytes.unwrap_or(0),
                actual_size
            ));
        }

        pb.finish_with_message(format!("{} done", file_name));
        Ok(output_path)
    }
}

/// 1s, 2s, 4s... capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(5);
    Duration::from_millis((1000u64 << shift).min(30_000))
}

fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Local file name for a finished job: the video title when known, keeping the
/// server file's extension, otherwise the server's own file name.
pub fn artifact_file_name(url: &Url, title: Option<&str>) -> String {
    let served = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string();

    let Some(title) = title.map(sanitize).filter(|t| !t.is_empty()) else {
        return sanitize(&served);
    };

    match Path::new(&served).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", title, ext),
        None => title,
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    cleaned.trim().trim_matches('.').to_string()
}
