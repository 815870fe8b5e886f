//! HTTP directory-listing gateway
//!
//! Camera feeds commonly publish images as a plain web server index (Apache or
//! nginx autoindex). Listing fetches the index page and extracts direct links to
//! image files; fetching downloads one linked file. Both use the same
//! normalised base URL and the same credentials.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;
use wildcam_common::types::AuthConfig;

use super::{RemoteFile, TransportGateway};
use crate::error::TransportError;

/// Extensions treated as images, compared case-insensitively
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff"];

/// Timestamp layouts printed next to links by common autoindex modules
const LISTING_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d-%b-%Y %H:%M"];

enum RequestAuth {
    None,
    Basic { username: String, password: String },
    Header(HeaderValue),
}

impl RequestAuth {
    fn from_config(auth: &AuthConfig) -> Result<Self, TransportError> {
        match auth {
            AuthConfig::None => Ok(RequestAuth::None),
            AuthConfig::Basic { username, password } => Ok(RequestAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            AuthConfig::Header { value } => {
                let mut header = HeaderValue::from_str(value).map_err(|_| {
                    TransportError::InvalidCredentials(
                        "header value contains characters not allowed in HTTP headers".to_string(),
                    )
                })?;
                header.set_sensitive(true);
                Ok(RequestAuth::Header(header))
            },
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestAuth::None => request,
            RequestAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            },
            RequestAuth::Header(value) => request.header(AUTHORIZATION, value.clone()),
        }
    }
}

/// Gateway over an HTTP directory index
pub struct HttpDirectoryGateway {
    client: Client,
    base_url: Url,
    auth: RequestAuth,
}

impl HttpDirectoryGateway {
    pub fn new(client: Client, base_url: &str, auth: &AuthConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            auth: RequestAuth::from_config(auth)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response, TransportError> {
        let response = self
            .auth
            .apply(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TransportGateway for HttpDirectoryGateway {
    async fn list_files(&self) -> Result<Vec<RemoteFile>, TransportError> {
        debug!(url = %self.base_url, "Fetching directory listing");

        let html = self
            .get(&self.base_url)
            .await?
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(self.base_url.as_str(), e))?;

        let files = parse_directory_listing(&html, &self.base_url)?;
        debug!(url = %self.base_url, count = files.len(), "Parsed directory listing");
        Ok(files)
    }

    async fn fetch_file(&self, file: &RemoteFile) -> Result<Vec<u8>, TransportError> {
        let bytes = self
            .get(&file.url)
            .await?
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(file.url.as_str(), e))?;

        debug!(filename = %file.filename, bytes = bytes.len(), "Fetched remote file");
        Ok(bytes.to_vec())
    }
}

/// Parse and canonicalise a base URL so it ends with exactly one `/`
///
/// Relative links in the index resolve against the directory, not its parent,
/// and listing and fetching share one base.
pub fn normalize_base_url(raw: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    url.set_query(None);
    url.set_fragment(None);
    let path = format!("{}/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// Whether a filename carries one of the allowed image extensions
pub fn is_image_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(stem, ext)| {
            !stem.is_empty() && IMAGE_EXTENSIONS.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Extract image files directly under `base` from an HTML index page
///
/// Sort links, parent links, subdirectories, links off the base directory and
/// non-image files are dropped silently. The result is sorted by filename.
pub fn parse_directory_listing(html: &str, base: &Url) -> Result<Vec<RemoteFile>, TransportError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").map_err(|e| TransportError::Protocol {
        url: base.to_string(),
        reason: format!("invalid link selector: {}", e),
    })?;

    let mut files: BTreeMap<String, RemoteFile> = BTreeMap::new();

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
            continue;
        }

        let Ok(mut url) = base.join(href) else {
            debug!(href, "Skipping unresolvable link");
            continue;
        };
        url.set_query(None);
        url.set_fragment(None);

        let Some(filename) = direct_child_name(base, &url) else {
            continue;
        };
        if !is_image_filename(&filename) {
            continue;
        }

        let modified_at = parse_listing_timestamp(&listing_context(link));
        files.entry(filename.clone()).or_insert(RemoteFile {
            filename,
            url,
            modified_at,
        });
    }

    Ok(files.into_values().collect())
}

/// Decoded name of `url` when it sits directly inside the `base` directory
fn direct_child_name(base: &Url, url: &Url) -> Option<String> {
    if url.origin() != base.origin() {
        return None;
    }

    let rest = url.path().strip_prefix(base.path())?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }

    match urlencoding::decode(rest) {
        Ok(name) => Some(name.into_owned()),
        Err(_) => {
            warn!(path = rest, "Skipping link with undecodable name");
            None
        },
    }
}

/// Text that autoindex pages print alongside a link
///
/// Inline indexes put size and date in the text node after the anchor; table
/// indexes put them in the cells following the anchor's cell.
fn listing_context(link: ElementRef<'_>) -> String {
    let mut text = String::new();

    if let Some(node) = link.next_sibling() {
        if let Some(inline) = node.value().as_text() {
            text.push_str(inline);
        }
    }

    if let Some(cell) = link.parent().and_then(ElementRef::wrap) {
        if cell.value().name() == "td" {
            for sibling in cell.next_siblings().filter_map(ElementRef::wrap) {
                text.push(' ');
                text.extend(sibling.text());
            }
        }
    }

    text
}

fn parse_listing_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.windows(2).find_map(|pair| {
        let candidate = format!("{} {}", pair[0], pair[1]);
        LISTING_TIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&candidate, format).ok())
            .map(|naive| naive.and_utc())
    })
}
