//! Snapshot hub GraphQL client.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::adapter::outbound::http;
use crate::domain::governance::Platform;
use crate::error::SourceError;
use crate::port::outbound::governance::{GovernanceSource, RawProposal};

const SOURCE: &str = "snapshot";

const QUERY: &str = r#"
query Proposals($spaces: [String]!, $first: Int!) {
  proposals(first: $first, where: { space_in: $spaces }, orderBy: "created", orderDirection: desc) {
    id
    title
    choices
    start
    end
    state
    quorum
    scores
    space { id }
  }
}"#;

/// Proposals fetched per request, newest first.
const PAGE: u32 = 50;

pub struct SnapshotSource {
    http: Client,
    url: String,
}

impl SnapshotSource {
    #[must_use]
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http: http::client(timeout_ms),
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Data {
    #[serde(default)]
    proposals: Vec<ProposalDto>,
}

#[derive(Debug, Deserialize)]
struct ProposalDto {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    choices: Vec<String>,
    start: i64,
    end: i64,
    state: String,
    #[serde(default)]
    quorum: f64,
    #[serde(default)]
    scores: Vec<f64>,
    space: SpaceDto,
}

#[derive(Debug, Deserialize)]
struct SpaceDto {
    id: String,
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Split per-choice scores into (for, against, abstain).
///
/// Choices are matched by label; an unlabelled ballot reads the first two
/// choices as for and against.
fn split_scores(choices: &[String], scores: &[f64]) -> (f64, f64, f64) {
    let find = |labels: &[&str]| {
        choices
            .iter()
            .position(|c| labels.iter().any(|l| c.trim().eq_ignore_ascii_case(l)))
            .and_then(|i| scores.get(i).copied())
    };
    let votes_for = find(&["for", "yes", "yae", "approve"])
        .unwrap_or_else(|| scores.first().copied().unwrap_or(0.0));
    let against = find(&["against", "no", "nay", "reject"])
        .unwrap_or_else(|| scores.get(1).copied().unwrap_or(0.0));
    let abstain = find(&["abstain"]).unwrap_or(0.0);
    (votes_for, against, abstain)
}

impl ProposalDto {
    fn into_raw(self, fetched_at: DateTime<Utc>) -> Option<RawProposal> {
        let starts_at = timestamp(self.start)?;
        let ends_at = timestamp(self.end)?;
        let (votes_for, votes_against, votes_abstain) = split_scores(&self.choices, &self.scores);
        Some(RawProposal {
            platform: Platform::Snapshot,
            id: self.id,
            space: self.space.id,
            title: self.title,
            state: self.state,
            quorum: self.quorum,
            starts_at,
            ends_at,
            votes_for,
            votes_against,
            votes_abstain,
            fetched_at,
        })
    }
}

#[async_trait]
impl GovernanceSource for SnapshotSource {
    fn platform(&self) -> Platform {
        Platform::Snapshot
    }

    async fn fetch_proposals(&self, spaces: &[String]) -> Result<Vec<RawProposal>, SourceError> {
        if spaces.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "query": QUERY,
            "variables": { "spaces": spaces, "first": PAGE },
        });
        let envelope: Envelope = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SourceError::transient(SOURCE, e))?
            .json()
            .await
            .map_err(|e| SourceError::transient(SOURCE, e))?;

        if let Some(err) = envelope.errors.first() {
            return Err(SourceError::transient(SOURCE, &err.message));
        }
        let fetched_at = Utc::now();
        let proposals: Vec<RawProposal> = envelope
            .data
            .map(|d| d.proposals)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                let id = p.id.clone();
                let raw = p.into_raw(fetched_at);
                if raw.is_none() {
                    warn!(proposal = %id, "Snapshot proposal with invalid timestamps");
                }
                raw
            })
            .collect();
        debug!(count = proposals.len(), "Fetched Snapshot proposals");
        Ok(proposals)
    }
}
