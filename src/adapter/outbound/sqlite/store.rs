//! SQLite-backed [`Store`].
//!
//! Each entity is one row with its JSON body. Current-state upserts compare
//! `computed_at` inside a transaction, so a stale write never replaces a
//! newer one and readers never see half a record.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::database::connection::{create_pool, run_migrations, DbPool};
use super::database::model::{
    CurrentAssessmentRow, EventRow, GuidanceRow, LiquidityRow, NewForecastRow, NewHistoryRow,
    NewSentimentRow, ProposalRow, VolatilityRow,
};
use super::database::schema::{
    assessment_history, current_assessments, forecast_history, guidance, liquidity_forecasts,
    proposals, sentiment_samples, upgrade_events, volatility_forecasts,
};
use crate::domain::event::UpgradeEvent;
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::governance::{GovernanceProposal, ProposalKey};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::error::{PersistenceError, Result};
use crate::port::outbound::store::{Store, StoreResult};

/// Fixed-width UTC timestamp; lexical order equals time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn encode<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(PersistenceError::unavailable)
}

fn decode<T: DeserializeOwned>(body: &str) -> StoreResult<T> {
    serde_json::from_str(body).map_err(PersistenceError::unavailable)
}

fn db(e: diesel::result::Error) -> PersistenceError {
    PersistenceError::unavailable(e)
}

const VOLATILITY: &str = "volatility";
const LIQUIDITY: &str = "liquidity";

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built or a migration fails.
    pub fn open(path: &Path) -> Result<Self> {
        let pool = create_pool(&path.to_string_lossy())?;
        run_migrations(&pool)?;
        Ok(Self::new(pool))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.pool.get().map_err(PersistenceError::unavailable)?;
        f(&mut conn)
    }

    fn saved_forecasts<T: DeserializeOwned>(
        &self,
        protocol: &ProtocolId,
        entity: &str,
    ) -> StoreResult<Vec<T>> {
        let bodies: Vec<String> = self.with_conn(|conn| {
            forecast_history::table
                .filter(forecast_history::protocol.eq(protocol.as_str()))
                .filter(forecast_history::entity.eq(entity))
                .order((forecast_history::computed_at.asc(), forecast_history::id.asc()))
                .select(forecast_history::body)
                .load(conn)
                .map_err(db)
        })?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    fn event_from_row(row: EventRow) -> StoreResult<UpgradeEvent> {
        let ingested_at = DateTime::parse_from_rfc3339(&row.ingested_at)
            .map_err(PersistenceError::unavailable)?
            .with_timezone(&Utc);
        Ok(UpgradeEvent {
            key: crate::domain::event::EventKey {
                network: row.network.into(),
                tx_hash: row.tx_hash.into(),
                log_index: u64::try_from(row.log_index).map_err(PersistenceError::unavailable)?,
            },
            protocol: row.protocol.into(),
            upgrade: row.upgrade_id.into(),
            block_number: u64::try_from(row.block_number).map_err(PersistenceError::unavailable)?,
            payload: decode(&row.payload)?,
            ingested_at,
        })
    }
}

/// Upsert `body` into a `(key, computed_at, body)` table unless the stored
/// row is newer. Returns whether the row was written.
macro_rules! upsert_newer {
    ($conn:expr, $table:ident, $key_col:ident, $row:expr) => {{
        let row = $row;
        $conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            let existing: Option<String> = $table::table
                .filter($table::$key_col.eq(&row.$key_col))
                .select($table::computed_at)
                .first(conn)
                .optional()?;
            if existing.is_some_and(|at| at > row.computed_at) {
                return Ok(false);
            }
            diesel::replace_into($table::table).values(&row).execute(conn)?;
            Ok(true)
        })
    }};
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_event(&self, event: &UpgradeEvent) -> StoreResult<bool> {
        let row = EventRow {
            network: event.key.network.to_string(),
            tx_hash: event.key.tx_hash.to_string(),
            log_index: i64::try_from(event.key.log_index).map_err(PersistenceError::unavailable)?,
            protocol: event.protocol.to_string(),
            upgrade_id: event.upgrade.to_string(),
            block_number: i64::try_from(event.block_number).map_err(PersistenceError::unavailable)?,
            kind: event.kind().to_string(),
            payload: encode(&event.payload)?,
            ingested_at: ts(event.ingested_at),
        };
        self.with_conn(|conn| {
            let inserted = diesel::insert_or_ignore_into(upgrade_events::table)
                .values(&row)
                .execute(conn)
                .map_err(db)?;
            Ok(inserted == 1)
        })
    }

    async fn events_for_upgrade(&self, upgrade: &UpgradeId) -> StoreResult<Vec<UpgradeEvent>> {
        let rows: Vec<EventRow> = self.with_conn(|conn| {
            upgrade_events::table
                .filter(upgrade_events::upgrade_id.eq(upgrade.as_str()))
                .order((upgrade_events::block_number.asc(), upgrade_events::log_index.asc()))
                .select(EventRow::as_select())
                .load(conn)
                .map_err(db)
        })?;
        rows.into_iter().map(Self::event_from_row).collect()
    }

    async fn upsert_proposal(&self, proposal: &GovernanceProposal) -> StoreResult<()> {
        let row = ProposalRow {
            platform: proposal.platform.to_string(),
            proposal_id: proposal.id.to_string(),
            protocol: proposal.protocol.to_string(),
            status: proposal.status().to_string(),
            body: encode(proposal)?,
            updated_at: ts(Utc::now()),
        };
        self.with_conn(|conn| {
            diesel::replace_into(proposals::table)
                .values(&row)
                .execute(conn)
                .map_err(db)?;
            Ok(())
        })
    }

    async fn proposal(&self, key: &ProposalKey) -> StoreResult<Option<GovernanceProposal>> {
        let body: Option<String> = self.with_conn(|conn| {
            proposals::table
                .filter(proposals::platform.eq(key.platform.to_string()))
                .filter(proposals::proposal_id.eq(key.id.as_str()))
                .select(proposals::body)
                .first(conn)
                .optional()
                .map_err(db)
        })?;
        body.as_deref().map(decode).transpose()
    }

    async fn proposals(&self) -> StoreResult<Vec<GovernanceProposal>> {
        let bodies: Vec<String> = self.with_conn(|conn| {
            proposals::table
                .order((proposals::platform.asc(), proposals::proposal_id.asc()))
                .select(proposals::body)
                .load(conn)
                .map_err(db)
        })?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    async fn save_assessment(&self, assessment: &RiskAssessment) -> StoreResult<()> {
        let body = encode(assessment)?;
        let upgrade_id = assessment.upgrade.to_string();
        let computed_at = ts(assessment.computed_at);
        self.with_conn(|conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(assessment_history::table)
                    .values(&NewHistoryRow {
                        upgrade_id: upgrade_id.clone(),
                        computed_at: computed_at.clone(),
                        body: body.clone(),
                    })
                    .execute(conn)?;
                let existing: Option<String> = current_assessments::table
                    .find(&upgrade_id)
                    .select(current_assessments::computed_at)
                    .first(conn)
                    .optional()?;
                if existing.map_or(true, |at| at <= computed_at) {
                    diesel::replace_into(current_assessments::table)
                        .values(&CurrentAssessmentRow {
                            upgrade_id: upgrade_id.clone(),
                            computed_at: computed_at.clone(),
                            body: body.clone(),
                        })
                        .execute(conn)?;
                } else {
                    debug!(upgrade = %upgrade_id, "Older assessment kept out of current state");
                }
                Ok(())
            })
            .map_err(db)
        })
    }

    async fn current_assessment(&self, upgrade: &UpgradeId) -> StoreResult<Option<RiskAssessment>> {
        let body: Option<String> = self.with_conn(|conn| {
            current_assessments::table
                .find(upgrade.as_str())
                .select(current_assessments::body)
                .first(conn)
                .optional()
                .map_err(db)
        })?;
        body.as_deref().map(decode).transpose()
    }

    async fn assessment_history(&self, upgrade: &UpgradeId) -> StoreResult<Vec<RiskAssessment>> {
        let bodies: Vec<String> = self.with_conn(|conn| {
            assessment_history::table
                .filter(assessment_history::upgrade_id.eq(upgrade.as_str()))
                .order((assessment_history::computed_at.asc(), assessment_history::id.asc()))
                .select(assessment_history::body)
                .load(conn)
                .map_err(db)
        })?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    async fn recent_assessments(&self, limit: usize) -> StoreResult<Vec<RiskAssessment>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut bodies: Vec<String> = self.with_conn(|conn| {
            assessment_history::table
                .order((assessment_history::computed_at.desc(), assessment_history::id.desc()))
                .limit(limit)
                .select(assessment_history::body)
                .load(conn)
                .map_err(db)
        })?;
        bodies.reverse();
        bodies.iter().map(|b| decode(b)).collect()
    }

    async fn save_volatility(&self, forecast: &VolatilityForecast) -> StoreResult<()> {
        let row = VolatilityRow {
            protocol: forecast.protocol.to_string(),
            computed_at: ts(forecast.computed_at),
            body: encode(forecast)?,
        };
        let history = NewForecastRow {
            protocol: row.protocol.clone(),
            entity: VOLATILITY.to_string(),
            computed_at: row.computed_at.clone(),
            body: row.body.clone(),
        };
        self.with_conn(|conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(forecast_history::table)
                    .values(&history)
                    .execute(conn)?;
                upsert_newer!(conn, volatility_forecasts, protocol, row)
            })
            .map_err(db)
        })?;
        Ok(())
    }

    async fn latest_volatility(&self, protocol: &ProtocolId) -> StoreResult<Option<VolatilityForecast>> {
        let body: Option<String> = self.with_conn(|conn| {
            volatility_forecasts::table
                .find(protocol.as_str())
                .select(volatility_forecasts::body)
                .first(conn)
                .optional()
                .map_err(db)
        })?;
        body.as_deref().map(decode).transpose()
    }

    async fn volatility_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<VolatilityForecast>> {
        self.saved_forecasts(protocol, VOLATILITY)
    }

    async fn save_liquidity(&self, forecast: &LiquidityForecast) -> StoreResult<()> {
        let row = LiquidityRow {
            protocol: forecast.protocol.to_string(),
            computed_at: ts(forecast.computed_at),
            body: encode(forecast)?,
        };
        let history = NewForecastRow {
            protocol: row.protocol.clone(),
            entity: LIQUIDITY.to_string(),
            computed_at: row.computed_at.clone(),
            body: row.body.clone(),
        };
        self.with_conn(|conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(forecast_history::table)
                    .values(&history)
                    .execute(conn)?;
                upsert_newer!(conn, liquidity_forecasts, protocol, row)
            })
            .map_err(db)
        })?;
        Ok(())
    }

    async fn latest_liquidity(&self, protocol: &ProtocolId) -> StoreResult<Option<LiquidityForecast>> {
        let body: Option<String> = self.with_conn(|conn| {
            liquidity_forecasts::table
                .find(protocol.as_str())
                .select(liquidity_forecasts::body)
                .first(conn)
                .optional()
                .map_err(db)
        })?;
        body.as_deref().map(decode).transpose()
    }

    async fn liquidity_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<LiquidityForecast>> {
        self.saved_forecasts(protocol, LIQUIDITY)
    }

    async fn save_guidance(&self, value: &ExecutionGuidance) -> StoreResult<()> {
        let row = GuidanceRow {
            upgrade_id: value.upgrade.to_string(),
            computed_at: ts(value.computed_at),
            body: encode(value)?,
        };
        self.with_conn(|conn| upsert_newer!(conn, guidance, upgrade_id, row).map_err(db))?;
        Ok(())
    }

    async fn latest_guidance(&self, upgrade: &UpgradeId) -> StoreResult<Option<ExecutionGuidance>> {
        let body: Option<String> = self.with_conn(|conn| {
            guidance::table
                .find(upgrade.as_str())
                .select(guidance::body)
                .first(conn)
                .optional()
                .map_err(db)
        })?;
        body.as_deref().map(decode).transpose()
    }

    async fn append_sentiment(&self, sample: &SentimentSample) -> StoreResult<()> {
        let row = NewSentimentRow {
            text_hash: sample.text_hash.clone(),
            protocol: sample.protocol.as_ref().map(ToString::to_string),
            observed_at: ts(sample.timestamp),
            body: encode(sample)?,
        };
        self.with_conn(|conn| {
            diesel::insert_into(sentiment_samples::table)
                .values(&row)
                .execute(conn)
                .map_err(db)?;
            Ok(())
        })
    }

    async fn sentiment_since(
        &self,
        protocol: Option<&ProtocolId>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SentimentSample>> {
        let since = ts(since);
        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut query = sentiment_samples::table
                .filter(sentiment_samples::observed_at.ge(&since))
                .order((sentiment_samples::observed_at.asc(), sentiment_samples::id.asc()))
                .select(sentiment_samples::body)
                .into_boxed();
            if let Some(p) = protocol {
                query = query.filter(sentiment_samples::protocol.eq(p.as_str()));
            }
            query.load(conn).map_err(db)
        })?;
        bodies.iter().map(|b| decode(b)).collect()
    }
}

