use crate::models::StationId;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const AUX_ROOT: &str = "https://data-argo.ifremer.fr/aux/coriolis";
pub const DAC_ROOT: &str = "https://data-argo.ifremer.fr/dac/coriolis";
pub const BIO_PROFILE_INDEX_URL: &str = "https://data-argo.ifremer.fr/argo_bio-profile_index.txt";

/// Placeholder substituted with the station identifier in URL and name templates.
pub const ID_PLACEHOLDER: &str = "{id}";

pub const DEFAULT_STATIONS: [&str; 22] = [
    "1902578", "1902593", "1902601", "1902637", "1902685", "2903783", "2903787", "2903794",
    "3902471", "3902498", "4903634", "4903657", "4903658", "4903660", "4903739", "4903740",
    "5906970", "6904240", "6904241", "6990503", "6990514", "7901028",
];

fn default_stations() -> Vec<StationId> {
    DEFAULT_STATIONS.iter().map(|id| StationId::from(*id)).collect()
}

fn default_extension() -> String {
    ".nc".to_string()
}

/// Where a job finds the names of the files it mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Source {
    /// Fetch an HTML directory index and keep the hrefs ending in `extension`.
    ListingPage {
        url_template: String,
        #[serde(default = "default_extension")]
        extension: String,
    },
    /// One file per station, named from the identifier. No listing request.
    Synthesized {
        url_template: String,
        name_template: String,
    },
    /// A single file stored flat in the download root. With `overwrite` the
    /// file is fetched again on every run and replaced once the new copy is
    /// complete; per-station files never are.
    SingleFile {
        url: Url,
        file_name: String,
        #[serde(default)]
        overwrite: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub name: String,
    pub root: PathBuf,
    #[serde(default = "default_stations")]
    pub stations: Vec<StationId>,
    pub source: Source,
}

impl Job {
    /// Checks that every template renders to a valid URL and that no
    /// station identifier is blank.
    pub fn validate(&self) -> Result<()> {
        if let Some(station) = self.stations.iter().find(|s| s.as_str().trim().is_empty()) {
            return Err(anyhow!("Job {} has an empty station identifier: {:?}", self.name, station));
        }

        let probe = StationId::from(DEFAULT_STATIONS[0]);
        match &self.source {
            Source::ListingPage { url_template, extension } => {
                render_url(url_template, &probe)
                    .with_context(|| format!("Invalid url_template in job {}", self.name))?;
                if extension.is_empty() {
                    return Err(anyhow!("Job {} has an empty extension filter", self.name));
                }
            }
            Source::Synthesized {
                url_template,
                name_template,
            } => {
                render_url(url_template, &probe)
                    .with_context(|| format!("Invalid url_template in job {}", self.name))?;
                if !name_template.contains(ID_PLACEHOLDER) {
                    return Err(anyhow!(
                        "Job {} name_template must contain {}",
                        self.name,
                        ID_PLACEHOLDER
                    ));
                }
            }
            Source::SingleFile { file_name, .. } => {
                if file_name.is_empty() || file_name.contains('/') {
                    return Err(anyhow!("Job {} has an invalid file_name: {:?}", self.name, file_name));
                }
            }
        }

        Ok(())
    }
}

pub fn render(template: &str, station: &StationId) -> String {
    template.replace(ID_PLACEHOLDER, station.as_str())
}

pub fn render_url(template: &str, station: &StationId) -> Result<Url> {
    let rendered = render(template, station);
    Url::parse(&rendered).with_context(|| format!("Invalid URL: {}", rendered))
}

pub fn aux_profiles() -> Job {
    Job {
        name: "aux-profiles".to_string(),
        root: PathBuf::from("argo_profiles"),
        stations: default_stations(),
        source: Source::ListingPage {
            url_template: format!("{}/{}/profiles/", AUX_ROOT, ID_PLACEHOLDER),
            extension: default_extension(),
        },
    }
}

pub fn aux_traj() -> Job {
    Job {
        name: "aux-traj".to_string(),
        root: PathBuf::from("argo_trajectory_files"),
        stations: default_stations(),
        source: Source::Synthesized {
            url_template: format!("{}/{}/", AUX_ROOT, ID_PLACEHOLDER),
            name_template: format!("{}_Rtraj_aux.nc", ID_PLACEHOLDER),
        },
    }
}

pub fn core_traj() -> Job {
    Job {
        name: "core-traj".to_string(),
        root: PathBuf::from("argo_core_trajectory_files"),
        stations: default_stations(),
        source: Source::Synthesized {
            url_template: format!("{}/{}/", DAC_ROOT, ID_PLACEHOLDER),
            name_template: format!("{}_Rtraj.nc", ID_PLACEHOLDER),
        },
    }
}

pub fn bio_profile_index() -> Result<Job> {
    Ok(Job {
        name: "index".to_string(),
        root: PathBuf::from("."),
        stations: Vec::new(),
        source: Source::SingleFile {
            url: Url::parse(BIO_PROFILE_INDEX_URL)?,
            file_name: "argo_bio-profile_index.txt".to_string(),
            overwrite: true,
        },
    })
}

pub fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let jobs: Vec<Job> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    if jobs.is_empty() {
        return Err(anyhow!("No jobs defined in {}", path.display()));
    }

    for job in &jobs {
        job.validate()?;
    }

    Ok(jobs)
}
