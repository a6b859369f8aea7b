use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::MetadataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseKind {
    Track,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicMetadata {
    pub kind: ReleaseKind,
    pub artist_name: String,
    /// Track title, or album name for collections
    pub display_name: String,
    pub genre: String,
    pub release_year: String,
}

/// One entry of the lookup response's `results` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRecord {
    #[serde(default)]
    pub wrapper_type: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub primary_genre_name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupRecord>,
}

/// First four characters of an ISO-8601 date.
pub fn release_year(date: &str) -> String {
    date.chars().take(4).collect()
}

impl MusicMetadata {
    pub fn from_record(record: &LookupRecord) -> Self {
        let kind = match record.wrapper_type.as_deref() {
            Some("track") => ReleaseKind::Track,
            Some(_) => ReleaseKind::Collection,
            None if record.track_name.is_some() => ReleaseKind::Track,
            None => ReleaseKind::Collection,
        };

        let display_name = record
            .track_name
            .clone()
            .or_else(|| record.collection_name.clone())
            .unwrap_or_default();

        Self {
            kind,
            artist_name: record.artist_name.clone().unwrap_or_default(),
            display_name,
            genre: record.primary_genre_name.clone().unwrap_or_default(),
            release_year: record
                .release_date
                .as_deref()
                .map(release_year)
                .unwrap_or_default(),
        }
    }

    /// "genre • year", omitting whichever part is empty.
    pub fn details_line(&self) -> String {
        [self.genre.as_str(), self.release_year.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" • ")
    }
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Extracts a catalog id from a bare id or a catalog link. A link's `i`
/// query parameter (a track inside an album page) wins over the trailing
/// path segment (the album).
pub fn parse_identifier(input: &str) -> Result<String, MetadataError> {
    let input = input.trim();
    if is_numeric_id(input) {
        return Ok(input.to_string());
    }

    let invalid = || MetadataError::InvalidIdentifier(input.to_string());
    let url = Url::parse(input).map_err(|_| invalid())?;

    if let Some((_, track)) = url.query_pairs().find(|(k, v)| k == "i" && is_numeric_id(v)) {
        return Ok(track.into_owned());
    }

    url.path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .last()
                .map(|s| s.trim_start_matches("id").to_string())
        })
        .filter(|s| is_numeric_id(s))
        .ok_or_else(invalid)
}

pub fn parse_lookup_response(body: &str, id: &str) -> Result<MusicMetadata, MetadataError> {
    let response: LookupResponse =
        serde_json::from_str(body).map_err(|e| MetadataError::Decode(e.to_string()))?;
    response
        .results
        .first()
        .map(MusicMetadata::from_record)
        .ok_or_else(|| MetadataError::NotFound(id.to_string()))
}

pub struct MetadataClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    country: Option<String>,
}

impl MetadataClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: settings.lookup_endpoint.clone(),
            country: settings.lookup_country.clone(),
        }
    }

    pub fn fetch(&self, identifier: &str) -> Result<MusicMetadata, MetadataError> {
        let id = parse_identifier(identifier)?;
        info!("Looking up catalog id {id}");

        let mut request = self.http.get(&self.endpoint).query(&[("id", id.as_str())]);
        if let Some(country) = &self.country {
            request = request.query(&[("country", country.as_str())]);
        }

        let body = request.send()?.error_for_status()?.text()?;
        debug!("lookup response: {} bytes", body.len());
        parse_lookup_response(&body, &id)
    }
}
