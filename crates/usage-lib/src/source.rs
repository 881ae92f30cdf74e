//! Station and charge-session history
//!
//! The tables belong to the charging platform; this module only reads them.

use crate::models::{ChargeSession, Station};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Read access to station inventory and charging history
#[async_trait]
pub trait StationSource: Send + Sync {
    /// All stations, including those that never had a session
    async fn fetch_stations(&self) -> Result<Vec<Station>, sqlx::Error>;

    /// Sessions that started at or after `cutoff` and have an end timestamp
    async fn fetch_completed_sessions_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<ChargeSession>, sqlx::Error>;
}

const STATIONS_QUERY: &str = r#"
SELECT
    c.ID_Colonnina AS station_id,
    CAST(c.Potenza_kW AS DOUBLE) AS power_kw,
    c.NIL AS neighborhood
FROM colonnina c
ORDER BY c.ID_Colonnina
"#;

const SESSIONS_QUERY: &str = r#"
SELECT
    r.ID_Ricarica AS session_id,
    r.ID_Colonnina AS station_id,
    r.Data_Ora_Inizio AS started_at,
    r.Data_Ora_Fine AS ended_at,
    CAST(r.Energia_Erogata_kWh AS DOUBLE) AS energy_kwh
FROM ricarica r
WHERE r.Data_Ora_Inizio >= ?
  AND r.Data_Ora_Fine IS NOT NULL
ORDER BY r.ID_Colonnina, r.Data_Ora_Inizio
"#;

/// MySQL-backed source over the `colonnina` and `ricarica` tables
#[derive(Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Connect to the platform database
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("Connected to station database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl StationSource for MySqlSource {
    async fn fetch_stations(&self) -> Result<Vec<Station>, sqlx::Error> {
        let stations: Vec<Station> = sqlx::query_as(STATIONS_QUERY)
            .fetch_all(&self.pool)
            .await?;
        debug!(count = stations.len(), "Fetched stations");
        Ok(stations)
    }

    async fn fetch_completed_sessions_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<ChargeSession>, sqlx::Error> {
        let sessions: Vec<ChargeSession> = sqlx::query_as(SESSIONS_QUERY)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        debug!(count = sessions.len(), cutoff = %cutoff, "Fetched completed sessions");
        Ok(sessions)
    }
}

/// In-memory source, used for previews and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub stations: Vec<Station>,
    pub sessions: Vec<ChargeSession>,
}

impl MemorySource {
    pub fn new(stations: Vec<Station>, sessions: Vec<ChargeSession>) -> Self {
        Self { stations, sessions }
    }
}

#[async_trait]
impl StationSource for MemorySource {
    async fn fetch_stations(&self) -> Result<Vec<Station>, sqlx::Error> {
        Ok(self.stations.clone())
    }

    async fn fetch_completed_sessions_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<ChargeSession>, sqlx::Error> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.started_at >= cutoff && s.ended_at.is_some())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_source_filters_like_the_sql_query() {
        let source = MemorySource::new(
            vec![Station {
                station_id: 1,
                power_kw: 11.0,
                neighborhood: None,
            }],
            vec![
                ChargeSession {
                    session_id: 1,
                    station_id: 1,
                    started_at: at(1),
                    ended_at: Some(at(1)),
                    energy_kwh: None,
                },
                ChargeSession {
                    session_id: 2,
                    station_id: 1,
                    started_at: at(10),
                    ended_at: Some(at(10)),
                    energy_kwh: Some(3.0),
                },
                ChargeSession {
                    session_id: 3,
                    station_id: 1,
                    started_at: at(11),
                    ended_at: None,
                    energy_kwh: None,
                },
            ],
        );

        let sessions = source.fetch_completed_sessions_since(at(5)).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, 2);
        assert_eq!(source.fetch_stations().await.unwrap().len(), 1);
    }

    #[test]
    fn test_queries_are_read_only() {
        for q in [STATIONS_QUERY, SESSIONS_QUERY] {
            let upper = q.to_uppercase();
            assert!(upper.trim_start().starts_with("SELECT"));
            for verb in ["INSERT", "UPDATE", "DELETE", "DROP"] {
                assert!(!upper.contains(verb));
            }
        }
    }
}
