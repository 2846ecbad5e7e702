use crate::config::{Job, Source};
use crate::downloader::Downloader;
use crate::http::Transport;
use crate::models::{BatchReport, ListingOutcome, RemoteFile, StationId, StationReport};
use crate::resolver;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Runs one job to completion, station by station in the configured order.
///
/// A station whose listing or files fail over HTTP simply contributes fewer
/// new files. Filesystem errors stop the batch.
pub async fn run<T: Transport>(transport: &T, job: &Job, pb: &ProgressBar) -> Result<BatchReport> {
    let downloader = Downloader::new(transport, &job.root);
    info!(job = %job.name, root = %downloader.output_dir().display(), "Starting job");

    if let Source::SingleFile { overwrite, .. } = job.source {
        return run_single(&downloader, job, overwrite, pb).await;
    }

    pb.set_length(job.stations.len() as u64);
    pb.set_position(0);
    pb.set_message(job.name.clone());

    let mut stations = Vec::with_capacity(job.stations.len());
    for station in &job.stations {
        let report = mirror_station(&downloader, &job.source, station).await?;

        pb.suspend(|| {
            println!(
                "{} new files downloaded for WMO {}.",
                report.new_files(),
                report.station
            )
        });
        pb.inc(1);

        stations.push(report);
    }

    let report = BatchReport {
        job: job.name.clone(),
        stations,
    };

    pb.suspend(|| {
        println!(
            "Download completed. Total of {} new files downloaded.",
            report.total_new_files()
        )
    });
    pb.finish_with_message(format!("{} complete", job.name));

    Ok(report)
}

async fn mirror_station<T: Transport>(
    downloader: &Downloader<'_, T>,
    source: &Source,
    station: &StationId,
) -> Result<StationReport> {
    let resolution = resolver::resolve(downloader.transport(), source, station).await?;

    let mut files = Vec::with_capacity(resolution.files.len());
    for file_name in resolution.files {
        let remote = RemoteFile {
            base_url: resolution.base_url.clone(),
            file_name,
        };
        let outcome = downloader.fetch(&remote, station).await?;
        files.push((remote.file_name, outcome));
    }

    Ok(StationReport {
        station: station.clone(),
        listing: resolution.listing,
        files,
    })
}

async fn run_single<T: Transport>(
    downloader: &Downloader<'_, T>,
    job: &Job,
    overwrite: bool,
    pb: &ProgressBar,
) -> Result<BatchReport> {
    let station = StationId::new(job.name.clone());
    let resolution = resolver::resolve(downloader.transport(), &job.source, &station).await?;

    pb.set_length(1);
    pb.set_position(0);
    pb.set_message(job.name.clone());

    let mut files = Vec::with_capacity(resolution.files.len());
    for file_name in resolution.files {
        let remote = RemoteFile {
            base_url: resolution.base_url.clone(),
            file_name,
        };
        let outcome = downloader.fetch_flat(&remote, overwrite).await?;
        pb.suspend(|| println!("{}: {}", remote.file_name, outcome));
        files.push((remote.file_name, outcome));
    }
    pb.inc(1);
    pb.finish_with_message(format!("{} complete", job.name));

    Ok(BatchReport {
        job: job.name.clone(),
        stations: vec![StationReport {
            station,
            listing: ListingOutcome::Listed { count: files.len() },
            files,
        }],
    })
}

/// Progress bar over the stations of a job, drawn on stderr.
pub fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} {bar:40} {pos}/{len}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::{FakeTransport, capture_logs};
    use crate::models::FetchOutcome;
    use std::fs;
    use std::path::Path;
    use url::Url;

    const LISTING_1902578: &str = r#"<html><body><pre>
        <a href="?C=N;O=D">Name</a>
        <a href="/aux/coriolis/1902578/">Parent Directory</a>
        <a href="R1902578_001.nc">R1902578_001.nc</a>
        <a href="R1902578_002.nc">R1902578_002.nc</a>
        </pre></body></html>"#;

    fn profiles_job(root: &Path, stations: &[&str]) -> Job {
        Job {
            name: "aux-profiles".to_string(),
            root: root.to_path_buf(),
            stations: stations.iter().map(|id| StationId::from(*id)).collect(),
            source: Source::ListingPage {
                url_template: "https://host/aux/{id}/profiles/".to_string(),
                extension: ".nc".to_string(),
            },
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    fn transport_for_1902578() -> FakeTransport {
        FakeTransport::new()
            .route("https://host/aux/1902578/profiles/", 200, LISTING_1902578)
            .route("https://host/aux/1902578/profiles/R1902578_001.nc", 200, b"one".to_vec())
            .route("https://host/aux/1902578/profiles/R1902578_002.nc", 200, b"two".to_vec())
    }

    #[tokio::test]
    async fn first_run_downloads_every_listed_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_for_1902578();
        let job = profiles_job(dir.path(), &["1902578"]);

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 2);
        assert_eq!(report.stations[0].listing, ListingOutcome::Listed { count: 2 });
        assert_eq!(file_count(&dir.path().join("1902578")), 2);
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_for_1902578();
        let job = profiles_job(dir.path(), &["1902578"]);

        run(&transport, &job, &ProgressBar::hidden()).await.unwrap();
        transport.clear_requests();
        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 0);
        assert!(report.stations[0]
            .files
            .iter()
            .all(|(_, outcome)| *outcome == FetchOutcome::Skipped));
        // Only the listing page is requested again.
        assert_eq!(
            transport.requests(),
            vec!["https://host/aux/1902578/profiles/".to_string()]
        );
        assert_eq!(file_count(&dir.path().join("1902578")), 2);
    }

    #[tokio::test]
    async fn missing_listing_does_not_stop_later_stations() {
        let (logs, _guard) = capture_logs();
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_for_1902578();
        let job = profiles_job(dir.path(), &["6903094", "1902578"]);

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.stations.len(), 2);
        assert_eq!(report.stations[0].new_files(), 0);
        assert!(matches!(
            report.stations[0].listing,
            ListingOutcome::Unavailable { .. }
        ));
        assert_eq!(report.stations[1].new_files(), 2);
        assert_eq!(report.total_new_files(), 2);

        let warnings = logs.lines_with("WARN", &["station=6903094", "status=404"]);
        assert_eq!(warnings.len(), 1, "{}", logs.contents());
        assert!(logs.lines_with("WARN", &["station=1902578"]).is_empty());
    }

    #[tokio::test]
    async fn empty_listing_only_requests_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new().route(
            "https://host/aux/1902593/profiles/",
            200,
            "<html><a href=\"readme.txt\">readme</a></html>",
        );
        let job = profiles_job(dir.path(), &["1902593"]);

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 0);
        assert_eq!(report.stations[0].listing, ListingOutcome::Listed { count: 0 });
        assert_eq!(transport.requests().len(), 1);
        assert!(!dir.path().join("1902593").exists());
    }

    #[tokio::test]
    async fn failed_file_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new()
            .route("https://host/aux/1902578/profiles/", 200, LISTING_1902578)
            .route("https://host/aux/1902578/profiles/R1902578_001.nc", 200, b"one".to_vec());
        let job = profiles_job(dir.path(), &["1902578"]);

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 1);
        assert!(matches!(
            report.stations[0].files[1],
            (_, FetchOutcome::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn synthesized_job_fetches_one_file_per_station() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new()
            .route("https://host/dac/1902578/1902578_Rtraj.nc", 200, b"traj".to_vec());
        let job = Job {
            name: "core-traj".to_string(),
            root: dir.path().to_path_buf(),
            stations: vec!["1902578".into(), "6903094".into()],
            source: Source::Synthesized {
                url_template: "https://host/dac/{id}/".to_string(),
                name_template: "{id}_Rtraj.nc".to_string(),
            },
        };

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 1);
        assert!(dir.path().join("1902578/1902578_Rtraj.nc").is_file());
        assert!(!dir.path().join("6903094/6903094_Rtraj.nc").exists());
        assert_eq!(transport.requests().len(), 2);
    }

    fn index_job(root: &Path, overwrite: bool) -> Job {
        Job {
            name: "index".to_string(),
            root: root.to_path_buf(),
            stations: Vec::new(),
            source: Source::SingleFile {
                url: Url::parse("https://host/argo_bio-profile_index.txt").unwrap(),
                file_name: "argo_bio-profile_index.txt".to_string(),
                overwrite,
            },
        }
    }

    fn index_transport(body: &str) -> FakeTransport {
        FakeTransport::new().route("https://host/argo_bio-profile_index.txt", 200, body)
    }

    #[tokio::test]
    async fn single_file_job_writes_flat() {
        let dir = tempfile::tempdir().unwrap();
        let transport = index_transport("# Title");
        let job = index_job(dir.path(), false);

        let report = run(&transport, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 1);
        assert_eq!(
            fs::read(dir.path().join("argo_bio-profile_index.txt")).unwrap(),
            b"# Title"
        );
    }

    #[tokio::test]
    async fn refreshed_index_holds_latest_body() {
        let dir = tempfile::tempdir().unwrap();
        let job = index_job(dir.path(), true);

        run(&index_transport("v1"), &job, &ProgressBar::hidden()).await.unwrap();
        let second = index_transport("v2");
        let report = run(&second, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.total_new_files(), 1);
        assert_eq!(second.requests().len(), 1);
        assert_eq!(
            fs::read(dir.path().join("argo_bio-profile_index.txt")).unwrap(),
            b"v2"
        );
    }

    #[tokio::test]
    async fn index_without_refresh_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let job = index_job(dir.path(), false);

        run(&index_transport("v1"), &job, &ProgressBar::hidden()).await.unwrap();
        let second = index_transport("v2");
        let report = run(&second, &job, &ProgressBar::hidden()).await.unwrap();

        assert_eq!(report.stations[0].files[0].1, FetchOutcome::Skipped);
        assert!(second.requests().is_empty());
        assert_eq!(
            fs::read(dir.path().join("argo_bio-profile_index.txt")).unwrap(),
            b"v1"
        );
    }
}
