use serde::Deserialize;
use std::fmt;
use url::Url;

/// WMO number of an Argo float, kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub base_url: Url,
    pub file_name: String,
}

impl RemoteFile {
    /// Absolute URL of the file, resolved against the base like an href.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.file_name)
    }

    /// Name the file is stored under locally: the last path segment of the
    /// file name, so absolute hrefs stay inside the station directory.
    ///
    /// Hrefs that differ only before the last `/` (`a/x.nc`, `b/x.nc`) share
    /// one local file; whichever is fetched second finds it present and is
    /// skipped.
    pub fn local_name(&self) -> &str {
        self.file_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64 },
    Skipped,
    Failed { reason: String },
}

impl FetchOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded { .. })
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Downloaded { bytes } => write!(f, "downloaded ({} bytes)", bytes),
            FetchOutcome::Skipped => f.write_str("already present, skipped"),
            FetchOutcome::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    Listed { count: usize },
    /// The listing could not be fetched; the station contributes no files.
    Unavailable { reason: String },
}

#[derive(Debug, Clone)]
pub struct StationReport {
    pub station: StationId,
    pub listing: ListingOutcome,
    pub files: Vec<(String, FetchOutcome)>,
}

impl StationReport {
    pub fn new_files(&self) -> usize {
        self.files.iter().filter(|(_, outcome)| outcome.is_new()).count()
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub job: String,
    pub stations: Vec<StationReport>,
}

impl BatchReport {
    pub fn total_new_files(&self) -> usize {
        self.stations.iter().map(StationReport::new_files).sum()
    }

    /// Files that were listed but could not be fetched, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (&StationId, &str, &str)> {
        self.stations.iter().flat_map(|report| {
            report.files.iter().filter_map(move |(name, outcome)| match outcome {
                FetchOutcome::Failed { reason } => Some((&report.station, name.as_str(), reason.as_str())),
                _ => None,
            })
        })
    }

    pub fn unavailable_listings(&self) -> impl Iterator<Item = (&StationId, &str)> {
        self.stations.iter().filter_map(|report| match &report.listing {
            ListingOutcome::Unavailable { reason } => Some((&report.station, reason.as_str())),
            ListingOutcome::Listed { .. } => None,
        })
    }
}
