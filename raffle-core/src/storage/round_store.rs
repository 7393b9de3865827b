use crate::error::{RaffleError, Result};
use crate::storage::Storage;
use crate::types::{Address, Amount, RequestId};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: Uuid,
    pub raffle: Address,
    pub round: u64,
    pub request_id: RequestId,
    pub winner: Address,
    pub payout: Amount,
    pub players: usize,
    pub completed_at: DateTime<Utc>,
}

impl RoundRecord {
    pub fn new(
        raffle: Address,
        round: u64,
        request_id: RequestId,
        winner: Address,
        payout: Amount,
        players: usize,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            raffle,
            round,
            request_id,
            winner,
            payout,
            players,
            completed_at,
        }
    }
}

// Column values as SQLite hands them back, before parsing.
struct RawRound {
    id: String,
    raffle: String,
    round: i64,
    request_id: i64,
    winner: String,
    payout: String,
    players: i64,
    completed_at: i64,
}

impl RawRound {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            raffle: row.get(1)?,
            round: row.get(2)?,
            request_id: row.get(3)?,
            winner: row.get(4)?,
            payout: row.get(5)?,
            players: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }

    fn parse(self) -> Result<RoundRecord> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RaffleError::internal(format!("Invalid round id '{}': {}", self.id, e)))?;
        let payout = self
            .payout
            .parse::<u128>()
            .map_err(|e| RaffleError::internal(format!("Invalid payout '{}': {}", self.payout, e)))?;
        let completed_at = DateTime::from_timestamp(self.completed_at, 0).ok_or_else(|| {
            RaffleError::internal(format!("Invalid completion time {}", self.completed_at))
        })?;

        Ok(RoundRecord {
            id,
            raffle: self.raffle.parse()?,
            round: self.round as u64,
            request_id: RequestId::new(self.request_id as u64),
            winner: self.winner.parse()?,
            payout: Amount::from_wei(payout),
            players: self.players as usize,
            completed_at,
        })
    }
}

const SELECT_ROUNDS: &str =
    "SELECT id, raffle, round, request_id, winner, payout, players, completed_at FROM rounds";

pub struct RoundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_round(&self, record: &RoundRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO rounds
             (id, raffle, round, request_id, winner, payout, players, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.raffle.to_string(),
                record.round as i64,
                record.request_id.value() as i64,
                record.winner.to_string(),
                record.payout.to_wei().to_string(),
                record.players as i64,
                record.completed_at.timestamp(),
            ],
        )?;

        tracing::debug!("Saved round {} of raffle {}", record.round, record.raffle);
        Ok(())
    }

    /// Most recent rounds first.
    pub async fn list_rounds(&self, limit: usize) -> Result<Vec<RoundRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY completed_at DESC, round DESC LIMIT ?1",
            SELECT_ROUNDS
        ))?;
        let rows = stmt.query_map(params![limit as i64], RawRound::from_row)?;

        let mut rounds = Vec::new();
        for row in rows {
            rounds.push(row?.parse()?);
        }
        Ok(rounds)
    }

    pub async fn rounds_for_raffle(&self, raffle: &Address) -> Result<Vec<RoundRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!("{} WHERE raffle = ?1 ORDER BY round ASC", SELECT_ROUNDS))?;
        let rows = stmt.query_map(params![raffle.to_string()], RawRound::from_row)?;

        let mut rounds = Vec::new();
        for row in rows {
            rounds.push(row?.parse()?);
        }
        Ok(rounds)
    }

    pub async fn latest_round(&self) -> Result<Option<RoundRecord>> {
        Ok(self.list_rounds(1).await?.into_iter().next())
    }

    pub async fn round_count(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rounds", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
