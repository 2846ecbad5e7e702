use crate::http::{self, Failure, Transport};
use crate::models::{FetchOutcome, RemoteFile, StationId};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Incremental fetcher for one download root.
///
/// A file whose destination already exists is never requested again, whatever
/// its content, unless the caller explicitly asks for a flat file to be
/// refreshed. HTTP problems are reported through [`FetchOutcome::Failed`];
/// only filesystem errors come back as `Err`.
pub struct Downloader<'a, T> {
    transport: &'a T,
    output_dir: PathBuf,
}

impl<'a, T: Transport> Downloader<'a, T> {
    pub fn new(transport: &'a T, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            output_dir: output_dir.into(),
        }
    }

    pub fn transport(&self) -> &'a T {
        self.transport
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Mirrors `remote` into `<output dir>/<station>/`.
    pub async fn fetch(&self, remote: &RemoteFile, station: &StationId) -> Result<FetchOutcome> {
        let local_dir = self.output_dir.join(station.as_str());
        self.fetch_into(remote, &local_dir, Some(station), false).await
    }

    /// Mirrors `remote` straight into the output dir, for files that do not
    /// belong to a station. With `overwrite`, an existing copy is replaced
    /// by a fresh one; a failed request leaves the old copy in place.
    pub async fn fetch_flat(&self, remote: &RemoteFile, overwrite: bool) -> Result<FetchOutcome> {
        let local_dir = self.output_dir.clone();
        self.fetch_into(remote, &local_dir, None, overwrite).await
    }

    async fn fetch_into(
        &self,
        remote: &RemoteFile,
        local_dir: &Path,
        station: Option<&StationId>,
        overwrite: bool,
    ) -> Result<FetchOutcome> {
        let file_url = match remote.url() {
            Ok(url) => url,
            Err(e) => {
                let failure = Failure::BadUrl(e.to_string());
                http::log_failure("Cannot resolve file URL", station, &remote.file_name, &failure);
                return Ok(FetchOutcome::Failed {
                    reason: failure.to_string(),
                });
            }
        };

        let local_name = remote.local_name();
        let local_path = local_dir.join(local_name);

        if !overwrite && local_path.exists() {
            if local_name != remote.file_name {
                debug!(
                    href = %remote.file_name,
                    path = %local_path.display(),
                    "File already exists under the same local name"
                );
            } else {
                debug!(path = %local_path.display(), "File already exists");
            }
            return Ok(FetchOutcome::Skipped);
        }

        fs::create_dir_all(local_dir)
            .with_context(|| format!("Failed to create directory {}", local_dir.display()))?;

        let failure = match self.transport.get(&file_url).await {
            Ok(response) if response.status == StatusCode::OK => {
                let partial_path = local_dir.join(format!("{}.part", local_name));
                fs::write(&partial_path, &response.body)
                    .with_context(|| format!("Failed to write {}", partial_path.display()))?;
                fs::rename(&partial_path, &local_path).with_context(|| {
                    format!("Failed to rename completed file {}", local_path.display())
                })?;

                let bytes = response.body.len() as u64;
                info!(path = %local_path.display(), bytes, "Downloaded");
                return Ok(FetchOutcome::Downloaded { bytes });
            }
            Ok(response) => Failure::Status(response.status),
            Err(e) => Failure::Transport(format!("{:#}", e)),
        };

        http::log_failure("Error downloading", station, file_url.as_str(), &failure);
        Ok(FetchOutcome::Failed {
            reason: failure.to_string(),
        })
    }
}
