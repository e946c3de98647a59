//! `SQLite`-backed trade store.
//!
//! Uses connection pooling and embedded migrations. Records are stored as
//! JSON snapshots alongside a few queryable columns; the trades table is
//! keyed by position id so re-appending after a crash is a no-op.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use stealth_trade_core::{Position, RiskState, Trade, TradeStore};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    /// Creates a new database connection pool and runs migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` database path (e.g., `<sqlite://trades.db>`)
    ///
    /// # Errors
    ///
    /// Returns error if connection fails or migrations fail.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database, used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn append_trade(&self, trade: &Trade) -> Result<()> {
        let trade_json = serde_json::to_string(trade)?;

        let result = sqlx::query(
            r"
            INSERT INTO trades (position_id, symbol, realized_pnl, closed_at, trade_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(position_id) DO NOTHING
            ",
        )
        .bind(trade.position_id.to_string())
        .bind(&trade.symbol)
        .bind(trade.realized_pnl.to_string())
        .bind(trade.closed_at.to_rfc3339())
        .bind(trade_json)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(position_id = %trade.position_id, "trade already archived, skipping");
        }
        Ok(())
    }

    async fn load_trades(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT trade_json FROM trades ORDER BY closed_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut trades = Vec::new();
        for (trade_json,) in rows {
            trades.push(serde_json::from_str(&trade_json)?);
        }
        Ok(trades)
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        let snapshot_json = serde_json::to_string(position)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r"
            INSERT INTO open_positions (id, symbol, snapshot_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(position.id.to_string())
        .bind(&position.symbol)
        .bind(snapshot_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_position(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM open_positions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_open_positions(&self) -> Result<Vec<Position>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT snapshot_json FROM open_positions ORDER BY updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut positions = Vec::new();
        for (snapshot_json,) in rows {
            positions.push(serde_json::from_str(&snapshot_json)?);
        }
        Ok(positions)
    }

    async fn save_risk_state(&self, state: &RiskState) -> Result<()> {
        let snapshot_json = serde_json::to_string(state)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r"
            INSERT INTO risk_state (id, snapshot_json, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(snapshot_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_risk_state(&self) -> Result<Option<RiskState>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT snapshot_json FROM risk_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((snapshot_json,)) => Ok(Some(serde_json::from_str(&snapshot_json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use stealth_trade_core::{ExitReason, PositionStatus, Side};

    fn sample_position(symbol: &str) -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: Side::Long,
            quantity: 10,
            entry_price: dec!(100),
            opened_at: Utc::now(),
            stop_price: dec!(98),
            target_price: dec!(104),
            trailing_ref: dec!(100),
            status: PositionStatus::Open,
            exit_reason: None,
            close_attempts: 0,
            next_close_attempt_at: None,
        }
    }

    fn sample_trade(position: &Position) -> Trade {
        Trade::from_close(position, dec!(104), dec!(1), Utc::now())
    }

    #[tokio::test]
    async fn append_trade_is_idempotent() {
        let store = SqliteTradeStore::new_in_memory().await.unwrap();
        let mut position = sample_position("ABC");
        position.exit_reason = Some(ExitReason::Target);
        let trade = sample_trade(&position);

        store.append_trade(&trade).await.unwrap();
        store.append_trade(&trade).await.unwrap();

        let trades = store.load_trades().await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].position_id, position.id);
        assert_eq!(trades[0].realized_pnl, dec!(39));
    }

    #[tokio::test]
    async fn position_snapshot_roundtrip() {
        let store = SqliteTradeStore::new_in_memory().await.unwrap();
        let mut position = sample_position("ABC");

        store.upsert_position(&position).await.unwrap();

        // Tighten and re-save: the snapshot must reflect the update.
        position.stop_price = dec!(101);
        position.status = PositionStatus::Trailing;
        store.upsert_position(&position).await.unwrap();

        let loaded = store.load_open_positions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].stop_price, dec!(101));
        assert_eq!(loaded[0].status, PositionStatus::Trailing);

        store.remove_position(position.id).await.unwrap();
        assert!(store.load_open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn risk_state_roundtrip() {
        let store = SqliteTradeStore::new_in_memory().await.unwrap();
        assert!(store.load_risk_state().await.unwrap().is_none());

        let mut state = RiskState::new(dec!(10000), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        state.daily_trades = 3;
        store.save_risk_state(&state).await.unwrap();

        state.daily_trades = 4;
        store.save_risk_state(&state).await.unwrap();

        let loaded = store.load_risk_state().await.unwrap().unwrap();
        assert_eq!(loaded.daily_trades, 4);
        assert_eq!(loaded.equity, dec!(10000));
    }
}
