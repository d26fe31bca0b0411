use anyhow::{anyhow, Result};
use reqwest::{
    header,
    header::{HeaderMap, HeaderValue},
    Client, ClientBuilder, StatusCode,
};
use tokio::time::Duration;

use crate::models::FlagData;

const API_URL: &str = "https://api.flagsync.io/v1";

/// The environment variable to change the default timeout for requests.
const FLAGSYNC_TIMEOUT_MS: &str = "FLAGSYNC_TIMEOUT_MS";

fn create_http_connection_client() -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let timeout = std::env::var(FLAGSYNC_TIMEOUT_MS)
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u64>()
        .unwrap_or(3000);
    ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(60)))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .timeout(Duration::from_millis(timeout))
        .default_headers(headers)
        .build()
}

#[derive(Clone)]
pub struct FlagHttpClient {
    base_url: String,
    http_client: Client,
}

impl FlagHttpClient {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let base_url = base_url.unwrap_or_else(|| API_URL.to_string());
        let http_client = create_http_connection_client()
            .map_err(|err| anyhow!("failed to build the http client: {}", err))?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Fetches the flag data for a site. When a visitor code is given the
    /// service scopes experiment assignments to it, otherwise it assigns one
    /// and returns it in the payload.
    pub async fn fetch_flag_data(
        &self,
        site_code: &str,
        visitor_code: Option<&str>,
    ) -> Result<FlagData> {
        let url = format!("{}/sites/{}/flags", self.base_url, site_code);
        let mut request = self.http_client.get(url);
        if let Some(code) = visitor_code {
            request = request.query(&[("visitorCode", code)]);
        }

        let response = request.send().await;
        let res = match response {
            Ok(result) => match result.status() {
                StatusCode::OK => Ok(result),
                status => Err(anyhow!("flag service error: {}", status)),
            },
            Err(err) => Err(anyhow!("failed to send request: {}", err)),
        }?;

        res.json::<FlagData>()
            .await
            .map_err(|err| anyhow!("error parsing flag data response: {}", err))
    }
}
