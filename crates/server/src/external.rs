use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::utils::url_escape;

#[derive(Debug)]
pub enum ExternalError {
    Http(reqwest::Error),
    Status(u16),
    Decode(String),
    Empty,
}

impl std::fmt::Display for ExternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalError::Http(err) => write!(f, "http error: {}", err),
            ExternalError::Status(code) => write!(f, "http {}", code),
            ExternalError::Decode(err) => write!(f, "decode error: {}", err),
            ExternalError::Empty => write!(f, "empty response"),
        }
    }
}

impl std::error::Error for ExternalError {}

impl From<reqwest::Error> for ExternalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExternalError::Decode(err.to_string())
        } else {
            ExternalError::Http(err)
        }
    }
}

/// A generative text model: prompt in, free text out.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError>;
}

/// Looks up a picture for an artist name.
#[async_trait]
pub trait ArtistSearch: Send + Sync {
    async fn picture_url(&self, artist: &str) -> Result<Option<String>, ExternalError>;
}

#[derive(Clone)]
pub struct GeminiModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiModel {
    pub fn new(
        client: Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<GenerateContent<'a>>,
}

#[derive(Serialize)]
struct GenerateContent<'a> {
    parts: Vec<GeneratePart<'a>>,
}

#[derive(Serialize)]
struct GeneratePart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl TextModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            url_escape(&self.model),
            url_escape(&self.api_key)
        );
        let body = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![GeneratePart { text: prompt }],
            }],
        };
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status().as_u16()));
        }
        let payload: GenerateResponse = response.json().await?;
        first_candidate_text(payload).ok_or(ExternalError::Empty)
    }
}

#[derive(Clone)]
pub struct DeezerSearch {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DeezerSearch {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct DeezerArtistSearch {
    #[serde(default)]
    data: Vec<DeezerArtist>,
}

#[derive(Deserialize)]
struct DeezerArtist {
    picture_xl: Option<String>,
    picture_medium: Option<String>,
}

fn best_picture(search: DeezerArtistSearch) -> Option<String> {
    let artist = search.data.into_iter().next()?;
    artist
        .picture_xl
        .filter(|url| !url.is_empty())
        .or(artist.picture_medium.filter(|url| !url.is_empty()))
}

#[async_trait]
impl ArtistSearch for DeezerSearch {
    async fn picture_url(&self, artist: &str) -> Result<Option<String>, ExternalError> {
        let url = format!("{}/search/artist?q={}", self.base_url, url_escape(artist));
        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(ExternalError::Status(response.status().as_u16()));
        }
        let payload: DeezerArtistSearch = response.json().await?;
        Ok(best_picture(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_candidate_text() {
        let payload: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"[1, "},{"text":"2]"}]}},
                {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(payload).as_deref(), Some("[1, 2]"));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(first_candidate_text(blocked), None);
    }

    #[test]
    fn prefers_extra_large_picture() {
        let payload: DeezerArtistSearch = serde_json::from_str(
            r#"{"data":[{"picture_xl":"https://x/xl.jpg","picture_medium":"https://x/m.jpg"}]}"#,
        )
        .unwrap();
        assert_eq!(best_picture(payload).as_deref(), Some("https://x/xl.jpg"));

        let payload: DeezerArtistSearch = serde_json::from_str(
            r#"{"data":[{"picture_xl":"","picture_medium":"https://x/m.jpg"}]}"#,
        )
        .unwrap();
        assert_eq!(best_picture(payload).as_deref(), Some("https://x/m.jpg"));

        let empty: DeezerArtistSearch = serde_json::from_str(r#"{"data":[],"total":0}"#).unwrap();
        assert_eq!(best_picture(empty), None);
    }
}
