// Optional SQLite sink for finished games. Writes run on their own task and
// are best-effort; a failure never reaches the hub loop.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::warn;
use uuid::Uuid;

/// One completed game, flattened for the `games` table.
#[derive(Debug, Clone)]
pub struct FinishedGame {
    pub id: Uuid,
    pub started_at: i64,
    pub ended_at: i64,
    pub rows: i64,
    pub cols: i64,
    pub player_names: [Option<String>; 4],
    /// Winning player index, 0 when the game ended without a winner.
    pub result: i64,
    pub termination: String,
    /// JSON array of per-turn records.
    pub pgn_content: String,
}

#[derive(Clone)]
pub struct GameStore {
    pool: SqlitePool,
}

impl GameStore {
    pub async fn connect(database_url: &str) -> Result<GameStore, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;
        Ok(GameStore { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
        MIGRATOR.run(&self.pool).await
    }

    /// Queues an asynchronous insert; the hub never waits on it.
    pub fn record(&self, game: FinishedGame) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                "INSERT OR REPLACE INTO games \
                 (id, started_at, ended_at, rows, cols, \
                  player1_name, player2_name, player3_name, player4_name, \
                  result, termination, pgn_content) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(game.id.to_string())
            .bind(game.started_at)
            .bind(game.ended_at)
            .bind(game.rows)
            .bind(game.cols)
            .bind(&game.player_names[0])
            .bind(&game.player_names[1])
            .bind(&game.player_names[2])
            .bind(&game.player_names[3])
            .bind(game.result)
            .bind(&game.termination)
            .bind(&game.pgn_content)
            .execute(&pool)
            .await;
            if let Err(e) = result {
                warn!(game_id = %game.id, error = %e, "failed to persist finished game");
            }
        });
    }
}
