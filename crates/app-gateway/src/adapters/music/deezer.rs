use std::{path::PathBuf, time::Duration};

use app_config::gateway::Credential;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, trace};
use url::Url;

use super::{CatalogError, MusicCatalog, Track};
use crate::{
    adapters::{subprocess, FetchRequest, USER_AGENT},
    artifact::find_media_file,
    error::{ErrorKind, GatewayError},
};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Returned by the API for ids that do not exist.
const DATA_NOT_FOUND_CODE: i64 = 800;

/// The public Deezer API, with `deemix` for full tracks.
#[derive(Debug, Clone)]
pub struct DeezerCatalog {
    client: Client,
    base_url: String,
    deemix: Option<PathBuf>,
}

impl DeezerCatalog {
    pub fn new<T>(base_url: T, deemix: Option<PathBuf>) -> Result<Self, CatalogError>
    where
        T: Into<String>,
    {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            deemix,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(?url, ?query, "Requesting Deezer API");

        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl MusicCatalog for DeezerCatalog {
    fn name(&self) -> &'static str {
        "deezer"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let body = self
            .get("/search", &[("q", query), ("limit", &limit.to_string())])
            .await?;

        parse_search(&body)
    }

    async fn track(&self, id: u64) -> Result<Option<Track>, CatalogError> {
        let body = self.get(&format!("/track/{}", id), &[]).await?;

        parse_track(&body)
    }

    async fn preview(&self, track: &Track) -> Result<Vec<u8>, CatalogError> {
        let Some(url) = &track.preview_url else {
            return Err(CatalogError::Api("track has no preview".to_string()));
        };

        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.bytes().await?.to_vec())
    }

    async fn full_track(
        &self,
        track: &Track,
        credential: &Credential,
        req: &FetchRequest<'_>,
    ) -> Result<PathBuf, GatewayError> {
        let program = self.deemix.as_deref().ok_or_else(|| {
            GatewayError::with_detail(ErrorKind::DownloadFailed, "deemix is not installed")
        })?;

        // Portable mode reads its login from `./config/.arl`.
        let config_dir = req.work_dir.join("config");
        tokio::fs::create_dir(&config_dir)
            .await
            .map_err(GatewayError::internal)?;
        tokio::fs::write(config_dir.join(".arl"), credential.expose())
            .await
            .map_err(GatewayError::internal)?;

        let out_dir = req.work_dir.join("music");
        let link = track.link.as_ref().map_or_else(
            || format!("https://www.deezer.com/track/{}", track.id),
            ToString::to_string,
        );

        let mut cmd = Command::new(program);
        cmd.arg("--portable")
            .args(["--bitrate", "128"])
            .arg("--path")
            .arg(&out_dir)
            .arg(&link)
            .current_dir(req.work_dir);

        subprocess::run("deemix", cmd, req.constraints.timeout, &req.cancel)
            .await
            .map_err(|e| e.into_gateway_error(req.work_dir))?;

        let file = find_media_file(&out_dir).ok_or_else(|| {
            GatewayError::with_detail(ErrorKind::DownloadFailed, "no artifact produced")
        })?;
        debug!(?file, "deemix downloaded track");

        Ok(file)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse<T> {
    Error { error: ApiError },
    Ok(T),
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: u64,
    title: String,
    artist: ApiArtist,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
}

impl From<ApiTrack> for Track {
    fn from(x: ApiTrack) -> Self {
        let parse = |x: Option<String>| x.filter(|x| !x.is_empty()).and_then(|x| Url::parse(&x).ok());

        Self {
            id: x.id,
            title: x.title,
            artist: x.artist.name,
            preview_url: parse(x.preview),
            link: parse(x.link),
            duration_secs: x.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<ApiTrack>,
}

fn decode<'a, T>(body: &'a [u8]) -> Result<ApiResponse<T>, CatalogError>
where
    T: Deserialize<'a>,
{
    serde_json::from_slice(body).map_err(|e| CatalogError::Decode(e.to_string()))
}

fn parse_search(body: &[u8]) -> Result<Vec<Track>, CatalogError> {
    match decode::<SearchPage>(body)? {
        ApiResponse::Ok(page) => Ok(page.data.into_iter().map(Track::from).collect()),
        ApiResponse::Error { error } => Err(CatalogError::Api(error.message)),
    }
}

fn parse_track(body: &[u8]) -> Result<Option<Track>, CatalogError> {
    match decode::<ApiTrack>(body)? {
        ApiResponse::Ok(track) => Ok(Some(track.into())),
        ApiResponse::Error { error } if error.code == DATA_NOT_FOUND_CODE => Ok(None),
        ApiResponse::Error { error } => Err(CatalogError::Api(error.message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "data": [
            {
                "id": 3135556,
                "title": "Harder, Better, Faster, Stronger",
                "duration": 224,
                "link": "https://www.deezer.com/track/3135556",
                "preview": "https://cdnt-preview.dzcdn.net/api/1/1/a/b/c/0/abc.mp3",
                "artist": { "id": 27, "name": "Daft Punk" }
            },
            {
                "id": 1,
                "title": "No preview",
                "preview": "",
                "artist": { "name": "Someone" }
            }
        ],
        "total": 2
    }"#;

    #[test]
    fn parses_search_results() {
        let tracks = parse_search(SEARCH_BODY.as_bytes()).expect("parses");

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Daft Punk");
        assert_eq!(tracks[0].duration_secs, Some(224));
        assert!(tracks[0].preview_url.is_some());
        assert!(tracks[1].preview_url.is_none());
    }

    #[test]
    fn empty_search_is_not_an_error() {
        let tracks = parse_search(br#"{"data":[],"total":0}"#).expect("parses");

        assert!(tracks.is_empty());
    }

    #[test]
    fn api_errors_are_reported() {
        let body = br#"{"error":{"type":"Exception","message":"Quota limit exceeded","code":4}}"#;

        assert!(matches!(parse_search(body), Err(CatalogError::Api(x)) if x.contains("Quota")));
        assert!(matches!(parse_track(body), Err(CatalogError::Api(_))));
    }

    #[test]
    fn missing_track_is_none() {
        let body = br#"{"error":{"type":"DataException","message":"no data","code":800}}"#;

        assert!(matches!(parse_track(body), Ok(None)));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(parse_search(b"<html>"), Err(CatalogError::Decode(_))));
    }
}
