//! Tally REST client. Requires an API key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::adapter::outbound::http;
use crate::domain::governance::Platform;
use crate::error::SourceError;
use crate::port::outbound::governance::{GovernanceSource, RawProposal};

const SOURCE: &str = "tally";

pub struct TallySource {
    http: Client,
    base_url: String,
    api_key: String,
}

impl TallySource {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http: http::client(timeout_ms),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn fetch_space(&self, space: &str) -> Result<Vec<ProposalDto>, SourceError> {
        let url = format!("{}/governance/{space}/proposals", self.base_url);
        let page: Page = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SourceError::transient(SOURCE, e))?
            .json()
            .await
            .map_err(|e| SourceError::transient(SOURCE, e))?;
        Ok(page.into_proposals())
    }
}

/// Vote counts arrive as JSON numbers or as decimal strings of token wei.
fn amount<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }
    match Option::<Amount>::deserialize(de)? {
        None => Ok(0.0),
        Some(Amount::Number(n)) => Ok(n),
        Some(Amount::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Page {
    Wrapped { proposals: Vec<ProposalDto> },
    Bare(Vec<ProposalDto>),
}

impl Page {
    fn into_proposals(self) -> Vec<ProposalDto> {
        match self {
            Self::Wrapped { proposals } | Self::Bare(proposals) => proposals,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProposalDto {
    id: String,
    #[serde(default)]
    title: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "amount")]
    quorum: f64,
    #[serde(default, deserialize_with = "amount")]
    for_votes: f64,
    #[serde(default, deserialize_with = "amount")]
    against_votes: f64,
    #[serde(default, deserialize_with = "amount")]
    abstain_votes: f64,
}

impl ProposalDto {
    fn into_raw(self, space: &str, fetched_at: DateTime<Utc>) -> RawProposal {
        RawProposal {
            platform: Platform::Tally,
            id: self.id,
            space: space.to_string(),
            title: self.title,
            state: self.status,
            quorum: self.quorum,
            starts_at: self.start_time,
            ends_at: self.end_time,
            votes_for: self.for_votes,
            votes_against: self.against_votes,
            votes_abstain: self.abstain_votes,
            fetched_at,
        }
    }
}

#[async_trait]
impl GovernanceSource for TallySource {
    fn platform(&self) -> Platform {
        Platform::Tally
    }

    /// Spaces are fetched one by one; a space that fails is skipped unless
    /// every space fails.
    async fn fetch_proposals(&self, spaces: &[String]) -> Result<Vec<RawProposal>, SourceError> {
        let fetched_at = Utc::now();
        let mut out = Vec::new();
        let mut last_err = None;
        for space in spaces {
            match self.fetch_space(space).await {
                Ok(proposals) => {
                    debug!(space = %space, count = proposals.len(), "Fetched Tally proposals");
                    out.extend(proposals.into_iter().map(|p| p.into_raw(space, fetched_at)));
                }
                Err(e) => {
                    warn!(space = %space, error = %e, "Tally fetch failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if out.is_empty() => Err(e),
            _ => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_numeric_amounts_parse() {
        let json = r#"{"proposals":[{
            "id":"42","title":"Raise cap","status":"SUCCEEDED",
            "startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-04T00:00:00Z",
            "quorum":"1000","forVotes":"1500.5","againstVotes":200,"abstainVotes":null}]}"#;
        let page: Page = serde_json::from_str(json).unwrap();
        let raw = page.into_proposals().remove(0).into_raw("compound", Utc::now());
        assert_eq!(raw.quorum, 1000.0);
        assert_eq!(raw.votes_for, 1500.5);
        assert_eq!(raw.votes_against, 200.0);
        assert_eq!(raw.votes_abstain, 0.0);
        assert_eq!(raw.space, "compound");
        assert_eq!(raw.state, "SUCCEEDED");
    }

    #[test]
    fn bare_array_response_is_accepted() {
        let json = r#"[{"id":"1","status":"ACTIVE",
            "startTime":"2024-01-01T00:00:00Z","endTime":"2024-01-02T00:00:00Z"}]"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.into_proposals().len(), 1);
    }
}
