//! Durable allow-list and admin set, backed by SQLite.
//!
//! Every call is its own unit of work: statements autocommit, and the pool is
//! opened with `synchronous = FULL` so a returned write survives a crash.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use tracing::{debug, info};

use crate::{domain::UserId, Result};

/// The two persisted id sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessSet {
    AllowedUsers,
    Admins,
}

impl AccessSet {
    fn table(self) -> &'static str {
        match self {
            AccessSet::AllowedUsers => "allowed_users",
            AccessSet::Admins => "admins",
        }
    }
}

#[derive(Clone)]
pub struct AccessStore {
    pool: SqlitePool,
}

impl AccessStore {
    /// Open (or create) the database file and make sure both tables exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening access store");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        for set in [AccessSet::AllowedUsers, AccessSet::Admins] {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (user_id INTEGER PRIMARY KEY)",
                set.table()
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the pool. Any later call fails with `Error::StoreClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Idempotent insert.
    pub async fn add(&self, set: AccessSet, user_id: UserId) -> Result<()> {
        let sql = format!("INSERT OR IGNORE INTO {} (user_id) VALUES (?)", set.table());
        let res = sqlx::query(&sql)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        debug!(
            set = set.table(),
            user_id = user_id.0,
            inserted = res.rows_affected() > 0,
            "access add"
        );
        Ok(())
    }

    /// Idempotent delete.
    pub async fn remove(&self, set: AccessSet, user_id: UserId) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE user_id = ?", set.table());
        let res = sqlx::query(&sql)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        debug!(
            set = set.table(),
            user_id = user_id.0,
            deleted = res.rows_affected() > 0,
            "access remove"
        );
        Ok(())
    }

    pub async fn contains(&self, set: AccessSet, user_id: UserId) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE user_id = ?", set.table());
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// All ids in the set, ascending.
    pub async fn list(&self, set: AccessSet) -> Result<Vec<UserId>> {
        let sql = format!("SELECT user_id FROM {} ORDER BY user_id", set.table());
        let rows: Vec<(i64,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }

    pub async fn count(&self, set: AccessSet) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", set.table());
        let (n,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    pub async fn add_allowed_user(&self, user_id: UserId) -> Result<()> {
        self.add(AccessSet::AllowedUsers, user_id).await
    }

    pub async fn remove_allowed_user(&self, user_id: UserId) -> Result<()> {
        self.remove(AccessSet::AllowedUsers, user_id).await
    }

    pub async fn list_allowed_users(&self) -> Result<Vec<UserId>> {
        self.list(AccessSet::AllowedUsers).await
    }

    pub async fn is_allowed(&self, user_id: UserId) -> Result<bool> {
        self.contains(AccessSet::AllowedUsers, user_id).await
    }

    pub async fn add_admin(&self, user_id: UserId) -> Result<()> {
        self.add(AccessSet::Admins, user_id).await
    }

    pub async fn remove_admin(&self, user_id: UserId) -> Result<()> {
        self.remove(AccessSet::Admins, user_id).await
    }

    pub async fn list_admins(&self) -> Result<Vec<UserId>> {
        self.list(AccessSet::Admins).await
    }

    pub async fn is_admin(&self, user_id: UserId) -> Result<bool> {
        self.contains(AccessSet::Admins, user_id).await
    }
}
