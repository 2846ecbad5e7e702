use crate::config::{self, Source};
use crate::http::{self, Failure, Transport};
use crate::models::{ListingOutcome, StationId};
use anyhow::{Result, anyhow};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Files to consider for one station, all relative to `base_url`.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub base_url: Url,
    pub files: Vec<String>,
    pub listing: ListingOutcome,
}

/// Works out which remote files belong to `station`.
///
/// A listing page that cannot be fetched is not an error: the station just
/// resolves to no files. `Err` is reserved for templates that do not render
/// to a URL.
pub async fn resolve<T: Transport>(
    transport: &T,
    source: &Source,
    station: &StationId,
) -> Result<Resolution> {
    match source {
        Source::ListingPage {
            url_template,
            extension,
        } => {
            let base_url = config::render_url(url_template, station)?;
            let (files, listing) = list_directory(transport, &base_url, extension, station).await?;
            Ok(Resolution {
                base_url,
                files,
                listing,
            })
        }
        Source::Synthesized {
            url_template,
            name_template,
        } => {
            let base_url = config::render_url(url_template, station)?;
            let files = vec![config::render(name_template, station)];
            Ok(Resolution {
                base_url,
                files,
                listing: ListingOutcome::Listed { count: 1 },
            })
        }
        Source::SingleFile { url, file_name, .. } => Ok(Resolution {
            base_url: url.clone(),
            files: vec![file_name.clone()],
            listing: ListingOutcome::Listed { count: 1 },
        }),
    }
}

async fn list_directory<T: Transport>(
    transport: &T,
    base_url: &Url,
    extension: &str,
    station: &StationId,
) -> Result<(Vec<String>, ListingOutcome)> {
    let response = match transport.get(base_url).await {
        Ok(response) if response.status == reqwest::StatusCode::OK => response,
        Ok(response) => return Ok(unavailable(station, base_url, Failure::Status(response.status))),
        Err(e) => return Ok(unavailable(station, base_url, Failure::Transport(format!("{:#}", e)))),
    };

    let page = String::from_utf8_lossy(&response.body);
    let files = extract_links(&page, extension)?;
    debug!(%station, url = %base_url, bytes = response.body.len(), files = files.len(), "Parsed listing page");

    let count = files.len();
    Ok((files, ListingOutcome::Listed { count }))
}

fn unavailable(station: &StationId, url: &Url, failure: Failure) -> (Vec<String>, ListingOutcome) {
    http::log_failure("Error accessing listing page", Some(station), url.as_str(), &failure);
    (
        Vec::new(),
        ListingOutcome::Unavailable {
            reason: failure.to_string(),
        },
    )
}

/// Hrefs of every `<a>` in document order whose target ends with `extension`.
/// The match is case sensitive; anchors without an href are ignored.
pub fn extract_links(html: &str, extension: &str) -> Result<Vec<String>> {
    let selector = Selector::parse("a").map_err(|e| anyhow!("Invalid selector: {:?}", e))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| href.ends_with(extension))
        .map(str::to_string)
        .collect())
}
