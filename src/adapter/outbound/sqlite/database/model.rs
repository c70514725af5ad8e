//! Database row types for Diesel ORM.
//!
//! Entities are stored as JSON in a `body` column next to the key and
//! timestamp columns that queries filter and order on.

use diesel::prelude::*;

use super::schema::{
    assessment_history, current_assessments, forecast_history, guidance, liquidity_forecasts,
    proposals, sentiment_samples, upgrade_events, volatility_forecasts,
};

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = upgrade_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventRow {
    pub network: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub protocol: String,
    pub upgrade_id: String,
    pub block_number: i64,
    pub kind: String,
    pub payload: String,
    pub ingested_at: String,
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = proposals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProposalRow {
    pub platform: String,
    pub proposal_id: String,
    pub protocol: String,
    pub status: String,
    pub body: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = current_assessments)]
pub struct CurrentAssessmentRow {
    pub upgrade_id: String,
    pub computed_at: String,
    pub body: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = assessment_history)]
pub struct NewHistoryRow {
    pub upgrade_id: String,
    pub computed_at: String,
    pub body: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = volatility_forecasts)]
pub struct VolatilityRow {
    pub protocol: String,
    pub computed_at: String,
    pub body: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = liquidity_forecasts)]
pub struct LiquidityRow {
    pub protocol: String,
    pub computed_at: String,
    pub body: String,
}

/// Append-only copy of every saved forecast. `entity` is `volatility` or
/// `liquidity`.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = forecast_history)]
pub struct NewForecastRow {
    pub protocol: String,
    pub entity: String,
    pub computed_at: String,
    pub body: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = guidance)]
pub struct GuidanceRow {
    pub upgrade_id: String,
    pub computed_at: String,
    pub body: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sentiment_samples)]
pub struct NewSentimentRow {
    pub text_hash: String,
    pub protocol: Option<String>,
    pub observed_at: String,
    pub body: String,
}
