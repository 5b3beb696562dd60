mod api;
mod cli;
mod config;
mod downloader;
mod errors;
mod housekeeping;
mod metadata;
mod models;
mod poller;
mod progress;
mod selector;
mod session;
mod submitter;
#[cfg(test)]
mod testing;
mod validator;

use anyhow::{anyhow, bail, Context, Result};
use api::{resolve_download_url, HttpJobApi, JobApi};
use clap::Parser;
use cli::{Args, Command};
use config::ClientConfig;
use downloader::{artifact_file_name, ArtifactDownloader};
use indicatif::{ProgressBar, ProgressStyle};
use models::{JobId, VideoInfo};
use poller::TickOutcome;
use progress::{JobDetail, StatusPhase};
use session::{ClientSession, JobSession};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_args(&args)?;

    let api: Arc<dyn JobApi> = Arc::new(
        HttpJobApi::new(config.server.clone(), config.request_timeout)
            .context("Failed to set up API client")?,
    );
    let mut session = ClientSession::new(Arc::clone(&api), config.cadence);

    match args.command {
        Command::Info { url } => {
            let info = session.load_info(&url).await?;
            print_info(info);
        }
        Command::Download {
            url,
            quality,
            output,
            no_fetch,
            retries,
            no_resume,
        } => {
            let info = session.load_info(&url).await?;
            print_info(info);

            if let Some(quality) = quality {
                session.select(&quality)?;
            }
            let selected = session.selected().unwrap_or_default().to_string();

            let job_id = session.submit().await?;
            println!("\nStarted job {} ({})", job_id, selected);

            let job = follow(&mut session).await?;
            let download_url = finished_url(&job)?;

            if no_fetch {
                println!("File ready at {}", resolve_download_url(&config.server, download_url)?);
                return Ok(());
            }

            let url = resolve_download_url(&config.server, download_url)?;
            let title = job
                .detail
                .title
                .as_deref()
                .or_else(|| session.info().map(|i| i.title.as_str()));
            let file_name = artifact_file_name(&url, title);

            let downloader = ArtifactDownloader::new(&output, !no_resume, retries)?;
            let pb = ArtifactDownloader::progress_bar(&file_name);
            let path = downloader.fetch(&url, &file_name, &pb).await?;
            println!("Saved {}", path.display());
        }
        Command::Status { job_id, watch } => {
            let job_id = JobId::new(job_id);
            if watch {
                session.start_polling(job_id);
                let job = follow(&mut session).await?;
                if let Ok(url) = finished_url(&job) {
                    println!("File ready at {}", resolve_download_url(&config.server, url)?);
                }
            } else {
                let progress = session.status_once(&job_id).await?;
                println!("{}: {} ({}%)", job_id, progress.label, progress.percent);
                print_detail(&progress.detail);
                if let Some(url) = &progress.download_url {
                    println!("File ready at {}", resolve_download_url(&config.server, url)?);
                }
            }
        }
        Command::Cleanup => {
            let report = housekeeping::purge_old_files(api.as_ref()).await?;
            println!("{}", report.message);
            for file in &report.deleted_files {
                println!("  removed {}", file);
            }
        }
    }

    Ok(())
}

fn print_info(info: &VideoInfo) {
    println!("{}", info.title);
    println!("  by {} | {} | {} views", info.author, info.length, info.views);
    println!("  thumbnail: {}", info.thumbnail);
    println!("Variants:");
    for (idx, variant) in info.variants.iter().enumerate() {
        let marker = if idx == 0 { "*" } else { " " };
        println!(
            " {} {:<10} {} ({})",
            marker, variant.id, variant.label, variant.kind
        );
    }
}

fn print_detail(detail: &JobDetail) {
    if let Some(title) = &detail.title {
        println!("  Title: {}", title);
    }
    if let Some(resolution) = &detail.resolution {
        println!("  Quality: {}", resolution);
    }
    if let Some(size) = detail.filesize_mb {
        println!("  Size: {:.1} MB", size);
    }
}

/// Polls the session's job until it ends, drawing a progress bar. Ctrl-C cancels polling.
async fn follow(session: &mut ClientSession) -> Result<JobSession> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40} {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_message("Waiting for the server");

    loop {
        let next = tokio::select! {
            update = session.next_update() => Some(update),
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(update) = next else {
            session.cancel();
            pb.abandon_with_message("Cancelled");
            bail!("Interrupted, stopped polling");
        };
        let Some(update) = update else {
            break;
        };

        let job = session
            .job()
            .ok_or_else(|| anyhow!("No job is being tracked"))?;
        match &update.outcome {
            TickOutcome::Failed(err) => {
                pb.set_message(format!("{} (status check failed: {})", job.label, err));
            }
            _ => {
                pb.set_position(job.progress_percent as u64);
                pb.set_message(detail_line(job));
            }
        }
    }

    let job = session
        .job()
        .cloned()
        .ok_or_else(|| anyhow!("No job is being tracked"))?;

    match job.phase {
        StatusPhase::Completed => {
            pb.finish_with_message(detail_line(&job));
            Ok(job)
        }
        StatusPhase::Error => {
            pb.abandon_with_message(job.label.clone());
            Err(anyhow!(
                "Job {} failed: {}",
                job.job_id,
                job.detail.error_message.as_deref().unwrap_or("unknown error")
            ))
        }
        _ => {
            pb.abandon();
            Err(anyhow!("Polling for job {} ended early", job.job_id))
        }
    }
}

fn detail_line(job: &JobSession) -> String {
    let mut line = job.label.clone();
    if let Some(resolution) = &job.detail.resolution {
        line.push_str(&format!(" | {}", resolution));
    }
    if let Some(size) = job.detail.filesize_mb {
        line.push_str(&format!(" | {:.1} MB", size));
    }
    line
}

fn finished_url(job: &JobSession) -> Result<&str> {
    job.download_url
        .as_deref()
        .ok_or_else(|| anyhow!("Job {} finished without a download URL", job.job_id))
}
