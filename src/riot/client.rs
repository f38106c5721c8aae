//! Riot API client: identity resolution, match-id discovery, match detail.
//!
//! Base: `https://{region}.api.riotgames.com`. Every call carries the API key
//! as the `api_key` query parameter. All retry loops are capped; exhausting a
//! cap surfaces `RiotError::RetryExhausted` instead of spinning forever.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::util::env::{env_opt, env_parse, env_req};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug, Error)]
pub enum RiotError {
    #[error("retries exhausted after {attempts} attempts (last status: {last_status:?})")]
    RetryExhausted {
        attempts: u32,
        last_status: Option<u16>,
    },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response missing field `{0}`")]
    MissingField(&'static str),
}

/// Human-facing `name#tag` account identifier. Mutable (players rename), so
/// never used as a storage key; it only feeds puuid resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
    pub game_name: String,
    pub tag_line: String,
}

impl PlayerHandle {
    /// Parse `"name#tag"`. None when the separator or either half is missing.
    pub fn parse(raw: &str) -> Option<Self> {
        let (name, tag) = raw.split_once('#')?;
        let name = name.trim();
        let tag = tag.trim();
        if name.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self {
            game_name: name.to_string(),
            tag_line: tag.to_string(),
        })
    }
}

impl std::fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.game_name, self.tag_line)
    }
}

#[derive(Debug, Clone)]
pub struct RiotConfig {
    pub api_key: String,
    pub region: String,
    /// Worker-pool width for match-detail fetches.
    pub concurrency: usize,
    /// Retry cap on match-detail fetches (429s and transient failures).
    pub detail_max_retries: u32,
    /// Retry cap on identity/listing calls.
    pub list_max_retries: u32,
    /// Long single backoff for a rate-limited identity lookup.
    pub resolve_backoff_secs: u64,
    /// Fixed delay before retrying an unexpected status.
    pub retry_delay_secs: u64,
    /// Backoff for a 429 without a Retry-After header.
    pub default_retry_after_secs: u64,
    pub match_start: u32,
    pub match_count: u32,
    pub request_timeout_secs: u64,
}

impl Default for RiotConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            region: "europe".into(),
            concurrency: 10,
            detail_max_retries: 5,
            list_max_retries: 10,
            resolve_backoff_secs: 121,
            retry_delay_secs: 5,
            default_retry_after_secs: 10,
            match_start: 0,
            match_count: 10,
            request_timeout_secs: 15,
        }
    }
}

impl RiotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self {
            api_key: env_req("RIOT_API_KEY")?,
            ..Self::default()
        };
        if let Some(v) = env_opt("RIOT_REGION") {
            cfg.region = v;
        }
        cfg.concurrency = env_parse("RIOT_CONCURRENCY", cfg.concurrency).max(1);
        cfg.detail_max_retries = env_parse("RIOT_DETAIL_MAX_RETRIES", cfg.detail_max_retries);
        cfg.list_max_retries = env_parse("RIOT_LIST_MAX_RETRIES", cfg.list_max_retries);
        cfg.resolve_backoff_secs = env_parse("RIOT_RESOLVE_BACKOFF_SECS", cfg.resolve_backoff_secs);
        cfg.retry_delay_secs = env_parse("RIOT_RETRY_DELAY_SECS", cfg.retry_delay_secs);
        cfg.match_start = env_parse("RIOT_MATCH_START", cfg.match_start);
        cfg.match_count = env_parse("RIOT_MATCH_COUNT", cfg.match_count);
        Ok(cfg)
    }
}

/// Backoff for a 429: the server's Retry-After when it parses, else the
/// configured default.
fn retry_delay(retry_after: Option<&str>, default_secs: u64) -> Duration {
    let secs = retry_after
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[derive(Debug, Clone)]
pub struct RiotClient {
    http: Client,
    cfg: RiotConfig,
}

impl RiotClient {
    pub fn new(cfg: RiotConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("trinkets-ingest/0.1")
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &RiotConfig {
        &self.cfg
    }

    fn base_url(&self) -> String {
        format!("https://{}.api.riotgames.com", self.cfg.region)
    }

    fn account_url(&self, handle: &PlayerHandle) -> String {
        format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.base_url(),
            urlencoding::encode(&handle.game_name),
            urlencoding::encode(&handle.tag_line)
        )
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(url)
            .header("Accept", "application/json")
            .query(&[("api_key", self.cfg.api_key.as_str())])
            .send()
            .await
    }

    /// GET with the shared retry policy: 429 honors Retry-After (default
    /// otherwise), any other non-200 and transport failures retry after the
    /// fixed delay, all under the given cap.
    async fn get_with_retry(&self, url: &str, max_retries: u32) -> Result<Value, RiotError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send(url).await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<Value>().await?);
                    }
                    if attempt >= max_retries {
                        return Err(RiotError::RetryExhausted {
                            attempts: attempt + 1,
                            last_status: Some(status.as_u16()),
                        });
                    }
                    let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                        let d = retry_delay(
                            resp.headers()
                                .get("Retry-After")
                                .and_then(|h| h.to_str().ok()),
                            self.cfg.default_retry_after_secs,
                        );
                        warn!(url, delay_secs = d.as_secs(), "rate limited; backing off");
                        d
                    } else {
                        let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
                        warn!(url, status = status.as_u16(), body, "unexpected status; retrying");
                        Duration::from_secs(self.cfg.retry_delay_secs)
                    };
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt >= max_retries {
                        return Err(err.into());
                    }
                    warn!(url, error = %err, "transport error; retrying");
                    tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Resolve a handle to its puuid. `Ok(None)` when the handle no longer
    /// exists (the player renamed). A rate-limited lookup sleeps the long
    /// backoff once and retries exactly once more.
    pub async fn resolve_puuid(&self, handle: &PlayerHandle) -> Result<Option<String>, RiotError> {
        info!(handle = %handle, "resolving puuid");
        let url = self.account_url(handle);
        let mut attempt: u32 = 0;
        let mut rate_limited = false;
        loop {
            match self.send(&url).await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body: Value = resp.json().await?;
                        let puuid = body
                            .get("puuid")
                            .and_then(|v| v.as_str())
                            .map(str::to_string);
                        if puuid.is_none() {
                            info!(handle = %handle, "puuid not in response; nickname must have changed");
                        }
                        return Ok(puuid);
                    }
                    if status == StatusCode::NOT_FOUND {
                        info!(handle = %handle, "account not found; nickname must have changed");
                        return Ok(None);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if rate_limited {
                            return Err(RiotError::RetryExhausted {
                                attempts: attempt + 1,
                                last_status: Some(429),
                            });
                        }
                        rate_limited = true;
                        warn!(
                            handle = %handle,
                            delay_secs = self.cfg.resolve_backoff_secs,
                            "rate limited on account lookup; sleeping"
                        );
                        tokio::time::sleep(Duration::from_secs(self.cfg.resolve_backoff_secs))
                            .await;
                        continue;
                    }
                    if attempt >= self.cfg.list_max_retries {
                        return Err(RiotError::RetryExhausted {
                            attempts: attempt + 1,
                            last_status: Some(status.as_u16()),
                        });
                    }
                    warn!(handle = %handle, status = status.as_u16(), "unexpected status; retrying");
                    tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt >= self.cfg.list_max_retries {
                        return Err(err.into());
                    }
                    warn!(handle = %handle, error = %err, "transport error; retrying");
                    tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Resolve via a legacy numeric summoner id (no rename risk on this path).
    pub async fn resolve_puuid_by_summoner_id(
        &self,
        summoner_id: &str,
    ) -> Result<String, RiotError> {
        let url = format!(
            "{}/lol/summoner/v4/summoners/{}",
            self.base_url(),
            urlencoding::encode(summoner_id)
        );
        let body = self.get_with_retry(&url, self.cfg.list_max_retries).await?;
        body.get("puuid")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(RiotError::MissingField("puuid"))
    }

    /// One page of match ids for a puuid. Pagination across the full history
    /// is the caller's concern (loop with increasing `start`).
    pub async fn list_match_ids(
        &self,
        puuid: &str,
        start: u32,
        count: u32,
    ) -> Result<Vec<String>, RiotError> {
        let url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start={}&count={}",
            self.base_url(),
            urlencoding::encode(puuid),
            start,
            count
        );
        let body = self.get_with_retry(&url, self.cfg.list_max_retries).await?;
        let ids: Vec<String> = serde_json::from_value(body).map_err(|_| {
            RiotError::MissingField("match id array")
        })?;
        Ok(ids)
    }

    /// Raw match-detail payload. Decoding into the typed schema happens at the
    /// orchestrator so a malformed body can be logged verbatim and skipped.
    pub async fn fetch_match(&self, match_id: &str) -> Result<Value, RiotError> {
        let url = format!(
            "{}/lol/match/v5/matches/{}",
            self.base_url(),
            urlencoding::encode(match_id)
        );
        self.get_with_retry(&url, self.cfg.detail_max_retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_service_policy() {
        let cfg = RiotConfig::default();
        assert_eq!(cfg.region, "europe");
        assert_eq!(cfg.concurrency, 10);
        assert_eq!(cfg.detail_max_retries, 5);
        assert_eq!(cfg.resolve_backoff_secs, 121);
        assert_eq!(cfg.match_count, 10);
    }

    #[test]
    fn retry_delay_honors_server_header() {
        assert_eq!(retry_delay(Some("3"), 10), Duration::from_secs(3));
        assert_eq!(retry_delay(None, 10), Duration::from_secs(10));
        assert_eq!(retry_delay(Some("soon"), 10), Duration::from_secs(10));
    }

    #[test]
    fn handle_parsing() {
        let h = PlayerHandle::parse("PlayerA#EUW").unwrap();
        assert_eq!(h.game_name, "PlayerA");
        assert_eq!(h.tag_line, "EUW");
        assert_eq!(h.to_string(), "PlayerA#EUW");
        assert!(PlayerHandle::parse("no-separator").is_none());
        assert!(PlayerHandle::parse("#tagonly").is_none());
    }

    #[tokio::test]
    async fn account_url_percent_encodes_handle_segments() {
        let client = RiotClient::new(RiotConfig::default()).unwrap();
        let handle = PlayerHandle::parse("jué ji#00097").unwrap();
        let url = client.account_url(&handle);
        assert_eq!(
            url,
            "https://europe.api.riotgames.com/riot/account/v1/accounts/by-riot-id/ju%C3%A9%20ji/00097"
        );
    }

    #[tokio::test]
    async fn client_builds_against_configured_region() {
        let client = RiotClient::new(RiotConfig {
            region: "americas".into(),
            ..RiotConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://americas.api.riotgames.com");
    }
}
