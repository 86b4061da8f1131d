//! TLE sources
//!
//! A source hands back raw, non-blank lines for one object. Validation is
//! left to [`orbital_mechanics::TleRecord`]; a source only reports whether
//! it produced any text at all.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("TLE request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("TLE source returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("TLE source returned no data for {0}")]
    Empty(String),
}

pub trait TleSource {
    fn fetch(
        &self,
        object_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

/// CelesTrak GP query in TLE format.
#[derive(Debug, Clone)]
pub struct CelestrakSource {
    client: reqwest::Client,
    base_url: String,
}

impl CelestrakSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, object_id: &str) -> String {
        format!("{}?CATNR={}&FORMAT=TLE", self.base_url, object_id)
    }
}

impl TleSource for CelestrakSource {
    fn fetch(
        &self,
        object_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send {
        let request = self.client.get(self.url_for(object_id));
        let object_id = object_id.to_string();

        async move {
            info!("Fetching TLE for {} from CelesTrak", object_id);

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status()));
            }

            let lines = non_blank_lines(&response.text().await?);
            if lines.is_empty() {
                return Err(FetchError::Empty(object_id));
            }

            debug!("CelesTrak returned {} line(s) for {}", lines.len(), object_id);
            Ok(lines)
        }
    }
}

pub fn non_blank_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end().to_string())
        .collect()
}
