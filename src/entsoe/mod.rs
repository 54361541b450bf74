pub(crate) mod archive;
pub(crate) mod areas;
pub(crate) mod curves;
pub(crate) mod datasets;
pub(crate) mod documents;
pub(crate) mod parse;
pub(crate) mod tables;
pub(crate) mod time;

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

const BASE_URL: &str = "https://web-api.tp.entsoe.eu/api";

/// Request timeout for datasets the platform answers as plain XML documents.
pub(crate) const XML_TIMEOUT: Duration = Duration::from_secs(60);

/// Request timeout for datasets the platform answers as (possibly nested)
/// ZIP archives, which take noticeably longer to assemble server-side.
pub(crate) const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Error, Debug)]
pub enum EntsoeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// One raw platform answer: the body bytes and the declared content type.
///
/// The archive unwrapper decides from these whether the body is a ZIP
/// archive, a plain XML document or garbage.
#[derive(Debug)]
pub struct RawResponse {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct EntsoeClient {
    client: Client,
    api_key: String,
}

impl EntsoeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Issue one GET against the platform and return the raw body with its
    /// declared content type. The security token is appended here so no
    /// caller ever handles it.
    pub(crate) async fn fetch_raw(
        &self,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<RawResponse, EntsoeError> {
        let mut query: Vec<(&str, &str)> = vec![("securityToken", self.api_key.as_str())];
        query.extend_from_slice(params);

        let response = self
            .client
            .get(BASE_URL)
            .query(&query)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(RawResponse {
            bytes,
            content_type,
        })
    }
}
