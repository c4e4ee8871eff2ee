use rusqlite::{params, Connection};
use serde::Serialize;
use time::OffsetDateTime;

use crate::errors::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapUsage {
    pub total_loads: i64,
    pub monthly_limit: i64,
    pub remaining_loads: i64,
}

impl MapUsage {
    pub fn new(total_loads: i64, monthly_limit: i64) -> Self {
        Self {
            total_loads,
            monthly_limit,
            remaining_loads: (monthly_limit - total_loads).max(0),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.remaining_loads == 0
    }
}

/// Start of the calendar month (UTC) containing `now`.
fn start_of_month(now: i64) -> i64 {
    let dt = OffsetDateTime::from_unix_timestamp(now).unwrap_or_else(|_| OffsetDateTime::now_utc());

    dt.replace_day(1)
        .unwrap_or(dt)
        .replace_time(time::Time::MIDNIGHT)
        .unix_timestamp()
}

/// Counts map loads in the current calendar month (UTC).
pub fn count_loads_this_month(conn: &Connection, now: i64) -> Result<i64, ServerError> {
    conn.query_row(
        "select count(*) from map_loads where created_at >= ?",
        params![start_of_month(now)],
        |r| r.get(0),
    )
    .map_err(|e| ServerError::DbError(format!("count map loads failed: {e}")))
}

pub fn record_map_load(conn: &Connection, now: i64) -> Result<(), ServerError> {
    conn.execute(
        "insert into map_loads (created_at) values (?)",
        params![now],
    )
    .map_err(|e| ServerError::DbError(format!("record map load failed: {e}")))?;
    Ok(())
}

pub fn monthly_usage(conn: &Connection, now: i64, limit: i64) -> Result<MapUsage, ServerError> {
    Ok(MapUsage::new(count_loads_this_month(conn, now)?, limit))
}
