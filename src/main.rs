mod batch;
mod cli;
mod config;
mod downloader;
mod http;
mod models;
mod resolver;

use anyhow::Result;
use clap::Parser;
use cli::{Args, JobPreset};
use config::Job;
use http::HttpClient;
use models::StationId;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn preset_jobs(preset: JobPreset) -> Result<Vec<Job>> {
    Ok(match preset {
        JobPreset::All => vec![
            config::aux_profiles(),
            config::aux_traj(),
            config::core_traj(),
            config::bio_profile_index()?,
        ],
        JobPreset::AuxProfiles => vec![config::aux_profiles()],
        JobPreset::AuxTraj => vec![config::aux_traj()],
        JobPreset::CoreTraj => vec![config::core_traj()],
        JobPreset::Index => vec![config::bio_profile_index()?],
    })
}

fn select_jobs(args: &Args) -> Result<Vec<Job>> {
    let mut jobs = match &args.config {
        Some(path) => config::load_jobs(path)?,
        None => preset_jobs(args.job)?,
    };

    for job in &mut jobs {
        if let Some(root) = &args.root {
            job.root = root.clone();
        }
        if !args.stations.is_empty() && !job.stations.is_empty() {
            job.stations = args.stations.iter().map(|id| StationId::new(id.trim())).collect();
        }
        job.validate()?;
    }

    Ok(jobs)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let jobs = select_jobs(&args)?;

    let client = HttpClient::new(args.timeout.map(Duration::from_secs), args.proxy.as_deref())?;

    let mut total = 0;
    for job in &jobs {
        let pb = batch::progress_bar()?;
        let report = batch::run(&client, job, &pb).await?;

        info!(
            job = %report.job,
            new_files = report.total_new_files(),
            failed = report.failures().count(),
            unlisted = report.unavailable_listings().count(),
            "Job finished"
        );

        total += report.total_new_files();
    }

    if jobs.len() > 1 {
        println!("\nDone: {} new files across {} jobs", total, jobs.len());
    }

    Ok(())
}
