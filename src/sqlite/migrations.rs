//! Embedded schema migrations for `SQLite`.
//!
//! The SQL files are compiled into the crate and applied in order. Applied
//! names are recorded in `_teamgate_migrations`, so `run` is safe to call on
//! every startup.
//!
//! ```rust,ignore
//! use sqlx::SqlitePool;
//! use teamgate::sqlite::migrations;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await
//! }
//! ```

use sqlx::{Executor, SqlitePool};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250301000001_create_users_table",
        include_str!("../../migrations_sqlite/20250301000001_create_users_table.sql"),
    ),
    (
        "20250301000002_create_teams_table",
        include_str!("../../migrations_sqlite/20250301000002_create_teams_table.sql"),
    ),
    (
        "20250301000003_create_team_members_table",
        include_str!("../../migrations_sqlite/20250301000003_create_team_members_table.sql"),
    ),
    (
        "20250301000004_create_invites_table",
        include_str!("../../migrations_sqlite/20250301000004_create_invites_table.sql"),
    ),
    (
        "20250301000005_create_access_tokens_table",
        include_str!("../../migrations_sqlite/20250301000005_create_access_tokens_table.sql"),
    ),
];

/// Applies every migration not yet recorded.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _teamgate_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _teamgate_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }

        // Statements are split on `;`, so migrations must not put one inside a literal.
        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                (&mut *tx).execute(trimmed).await?;
            }
        }
        sqlx::query("INSERT INTO _teamgate_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(target: "teamgate", "msg=\"migration applied\", name=\"{name}\"");
    }

    Ok(())
}
