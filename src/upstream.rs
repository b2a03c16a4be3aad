//! Client for the third-party image search API (Pixabay compatible).
//!
//! One search is one GET request: no retries, a fixed timeout. The response's
//! `hits` are mapped one by one; a hit that does not map is logged and skipped
//! instead of failing the whole search.

use crate::model::{ImagePrivacy, NewImage};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Parameters of one upstream search, passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub image_type: String,
    pub orientation: String,
    pub category: Option<String>,
    pub per_page: u32,
    pub page: u32,
}

impl SearchParams {
    /// The category actually sent upstream; `all` means no filter.
    pub fn effective_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    /// Human readable summary stored with the search history,
    /// e.g. `type=photo, orientation=all, category=nature`.
    pub fn filters_summary(&self) -> String {
        let mut summary = format!("type={}, orientation={}", self.image_type, self.orientation);
        if let Some(category) = self.effective_category() {
            summary.push_str(&format!(", category={category}"));
        }
        summary
    }

    fn query_pairs(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("key", api_key.to_string()),
            ("q", self.query.clone()),
            ("image_type", self.image_type.clone()),
            ("orientation", self.orientation.clone()),
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
        ];
        if let Some(category) = self.effective_category() {
            pairs.push(("category", category.to_string()));
        }
        pairs
    }
}

/// The mapped outcome of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub total_hits: u64,
    pub hits: Vec<NewImage>,
}

/// One image as the upstream API describes it.
///
/// Also accepted as the body of "save external image", which is why every
/// field is optional here and required-ness is decided by the mapping.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalHit {
    pub id: Option<i64>,
    #[serde(rename = "pageURL")]
    pub page_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tags: Option<String>,
    #[serde(rename = "previewURL")]
    pub preview_url: Option<String>,
    pub preview_width: Option<u32>,
    pub preview_height: Option<u32>,
    #[serde(rename = "webformatURL")]
    pub webformat_url: Option<String>,
    pub webformat_width: Option<u32>,
    pub webformat_height: Option<u32>,
    #[serde(rename = "largeImageURL")]
    pub large_image_url: Option<String>,
    #[serde(rename = "fullHDURL")]
    pub full_hd_url: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub image_size: Option<u64>,
    pub views: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
}

impl ExternalHit {
    /// Maps a search hit. `webformatURL` is mandatory.
    pub fn into_search_image(self) -> Result<NewImage, HitError> {
        let webformat_url = self
            .webformat_url
            .as_deref()
            .ok_or(HitError::MissingUrl)
            .and_then(normalize_image_url)?;

        Ok(self.into_new_image(webformat_url))
    }

    /// Maps a client supplied image, falling back to `largeImageURL` when
    /// `webformatURL` is absent.
    pub fn into_saved_image(self) -> Result<NewImage, HitError> {
        let raw = self
            .webformat_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or(self.large_image_url.as_deref())
            .ok_or(HitError::MissingUrl)?;
        let webformat_url = normalize_image_url(raw)?;

        Ok(self.into_new_image(webformat_url))
    }

    fn into_new_image(self, webformat_url: String) -> NewImage {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        NewImage {
            external_id: self.id,
            page_url: non_blank(self.page_url),
            kind: non_blank(self.kind).unwrap_or_else(|| "photo".to_string()),
            tags: self.tags.unwrap_or_default(),
            preview_url: non_blank(self.preview_url).unwrap_or_else(|| webformat_url.clone()),
            preview_width: self.preview_width,
            preview_height: self.preview_height,
            webformat_width: self.webformat_width,
            webformat_height: self.webformat_height,
            large_image_url: non_blank(self.large_image_url)
                .unwrap_or_else(|| webformat_url.clone()),
            full_hd_url: non_blank(self.full_hd_url),
            image_url: non_blank(self.image_url),
            image_width: self.image_width,
            image_height: self.image_height,
            image_size: self.image_size,
            file_name: None,
            original_file_name: None,
            views: self.views.unwrap_or(0),
            downloads: self.downloads.unwrap_or(0),
            likes: self.likes.unwrap_or(0),
            comments: self.comments.unwrap_or(0),
            // The upstream uploader is not one of our users.
            user_id: None,
            privacy: ImagePrivacy::Public,
            webformat_url,
        }
    }
}

/// Normalizes an image URL into its dedup key form.
///
/// The URL must be absolute; surrounding whitespace and the fragment are dropped
/// and scheme and host are lowercased by the parser.
pub fn normalize_image_url(raw: &str) -> Result<String, HitError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(HitError::MissingUrl);
    }

    let mut url = Url::parse(raw).map_err(|e| HitError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    url.set_fragment(None);

    Ok(url.to_string())
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl UpstreamClient {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Request(e.without_url()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Runs one search and maps its hits, in upstream order.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResult, UpstreamError> {
        tracing::info!(
            query = %params.query,
            filters = %params.filters_summary(),
            page = params.page,
            per_page = params.per_page,
            "calling image search API"
        );

        let response = self
            .http
            .get(self.base_url.clone())
            .query(&params.query_pairs(&self.api_key))
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.without_url()))?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::Request(e.without_url()))?;

        parse_search_body(body)
    }
}

fn parse_search_body(body: Value) -> Result<SearchResult, UpstreamError> {
    if let Some(error) = body.get("error") {
        return Err(UpstreamError::Api(
            error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()),
        ));
    }

    let hits = body
        .get("hits")
        .and_then(Value::as_array)
        .ok_or(UpstreamError::MissingHits)?;

    let mapped: Vec<NewImage> = hits
        .iter()
        .enumerate()
        .filter_map(|(idx, hit)| {
            let mapped = serde_json::from_value::<ExternalHit>(hit.clone())
                .map_err(HitError::from)
                .and_then(ExternalHit::into_search_image);

            match mapped {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "skipping unusable search hit");
                    None
                }
            }
        })
        .collect();

    let total_hits = body
        .get("totalHits")
        .and_then(Value::as_u64)
        .unwrap_or(mapped.len() as u64);

    Ok(SearchResult {
        total_hits,
        hits: mapped,
    })
}

/// Why a single hit could not be mapped.
#[derive(Debug, Error)]
pub enum HitError {
    #[error("image URL is missing")]
    MissingUrl,

    #[error("image URL {url} is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("malformed hit: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport failure, timeout or undecodable body. Never carries the request URL.
    #[error("image search request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("image search API answered with status {0}")]
    Status(StatusCode),

    #[error("image search API reported an error: {0}")]
    Api(String),

    #[error("image search response has no hits array")]
    MissingHits,
}
