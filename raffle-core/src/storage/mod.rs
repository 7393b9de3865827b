pub mod recorder;
pub mod round_store;

pub use recorder::RoundRecorder;
pub use round_store::{RoundRecord, RoundStore};

use crate::error::{RaffleError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RaffleError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Completed rounds, one row per payout
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                id TEXT PRIMARY KEY,
                raffle TEXT NOT NULL,
                round INTEGER NOT NULL,
                request_id INTEGER NOT NULL,
                winner TEXT NOT NULL,
                payout TEXT NOT NULL,
                players INTEGER NOT NULL,
                completed_at INTEGER NOT NULL,
                UNIQUE (raffle, round)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS rounds_completed_at ON rounds (completed_at)",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
