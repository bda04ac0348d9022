//!
//! src/fetch.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Defines methods for hitting the Spotify accounts and search
//! endpoints and the session that carries the bearer token
//!

use reqwest::{Client, header, redirect, RequestBuilder};
use tracing::{debug, warn};

use crate::config::{Credentials, HttpConfig, SpotifyConfig};
use crate::errors::StatsError;
use crate::types::{ArtistMetadata, SearchResponse, TokenResponse};

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, StatsError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| StatsError::Http(format!("build client: {e}")))
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, StatsError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    /// POST {token_url} grant_type=client_credentials
    pub fn token_request(&self, creds: &Credentials) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .body("grant_type=client_credentials")
    }

    /// GET /v1/search?q=artist:{name}&type=artist&market=&limit=
    pub fn search_artist(&self, name: &str, bearer: &str) ->
        Result<RequestBuilder, StatsError> {
        let url = self.cfg.api_base.join("search")
            .map_err(|e| StatsError::Config(format!("search url: {e}")))?;
        Ok( self.http.get(url).bearer_auth(bearer).query(&[
            ("q", format!("artist:{name}").as_str()),
            ("type", "artist"),
            ("market", &self.cfg.market),
            ("limit", &self.cfg.search_limit.to_string())
        ]))
    }

    ///
    /// Exchanges the client credentials for an access token. A reply
    /// without a token (bad credentials, unexpected body) is `None`,
    /// only transport failures are errors.
    ///
    pub async fn request_token(&self, creds: &Credentials) ->
        Result<Option<String>, StatsError> {
        let response = self.token_request(creds).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = %status, "spotify.token.rejected");
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(|t| t.access_token)
            .filter(|t| !t.is_empty());
        debug!(granted = token.is_some(), "spotify.token");
        Ok(token)
    }
}

///
/// A client paired with the bearer token it obtained. Replaces any
/// process-wide credential state.
///
#[derive(Clone, Debug)]
pub struct SpotifySession {
    client: SpotifyClient,
    access_token: String
}

impl SpotifySession {
    pub fn new(client: SpotifyClient, access_token: String) -> Self {
        Self { client, access_token }
    }

    /// `None` when the token endpoint grants no token
    pub async fn connect(client: SpotifyClient, creds: &Credentials) ->
        Result<Option<Self>, StatsError> {
        let token = client.request_token(creds).await?;
        Ok( token.map(|access_token| Self::new(client, access_token)) )
    }

    /// Raw search results in server order
    pub async fn search(&self, name: &str) -> Result<Vec<ArtistMetadata>, StatsError> {
        let response = self.client.search_artist(name, &self.access_token)?
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Http(format!("search {name:?} returned {status}")));
        }

        let body: SearchResponse = response.json().await?;
        Ok( body.artists.map(|page| page.items).unwrap_or_default() )
    }
}
