//! SQLite persistence for users and their todos.
//!
//! Every round-trip is bounded by the configured store timeout. Uniqueness of
//! usernames is enforced by the `UNIQUE` constraint, not only by lookups.

use std::{future::Future, time::Duration};

use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Executor, Sqlite, SqlitePool};

use crate::{
    error::{AppError, StoreError},
    model::{Todo, User},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT 0,
    owner_id INTEGER NOT NULL REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_todos_owner_id ON todos (owner_id);
CREATE INDEX IF NOT EXISTS idx_todos_title ON todos (title);
"#;

/// Opens the pool, creating the database file first if needed.
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        tracing::info!(%url, "creating database");
        Sqlite::create_database(url).await?;
    }

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(SCHEMA).await?;
    Ok(())
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout),
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl UserStore {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Inserts a user and returns its id. A taken username is `DuplicateUser`
    /// even when two registrations race past any earlier lookup.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<i64, AppError> {
        let insert = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool);

        match bounded(self.timeout, insert).await {
            Ok(id) => Ok(id),
            Err(StoreError::Database(sqlx::Error::Database(db))) if db.is_unique_violation() => {
                Err(AppError::DuplicateUser)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let lookup = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool);

        bounded(self.timeout, lookup).await
    }
}

#[derive(Debug, Clone)]
pub struct TodoStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl TodoStore {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// All todos of one owner in insertion order.
    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Todo>, StoreError> {
        let list = sqlx::query_as::<_, Todo>(
            "SELECT id, title, completed, owner_id FROM todos WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool);

        bounded(self.timeout, list).await
    }

    pub async fn create(
        &self,
        owner_id: i64,
        title: &str,
        completed: bool,
    ) -> Result<Todo, StoreError> {
        let insert = sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (title, completed, owner_id) VALUES (?, ?, ?) \
             RETURNING id, title, completed, owner_id",
        )
        .bind(title)
        .bind(completed)
        .bind(owner_id)
        .fetch_one(&self.pool);

        bounded(self.timeout, insert).await
    }

    /// Ownership gate: a todo owned by someone else looks exactly like a
    /// missing one.
    pub async fn find_by_id_and_owner(
        &self,
        todo_id: i64,
        owner_id: i64,
    ) -> Result<Option<Todo>, StoreError> {
        let lookup = sqlx::query_as::<_, Todo>(
            "SELECT id, title, completed, owner_id FROM todos WHERE id = ? AND owner_id = ?",
        )
        .bind(todo_id)
        .bind(owner_id)
        .fetch_optional(&self.pool);

        bounded(self.timeout, lookup).await
    }

    /// Overwrites title and completed. `None` if the row is gone.
    pub async fn update(
        &self,
        todo_id: i64,
        owner_id: i64,
        title: &str,
        completed: bool,
    ) -> Result<Option<Todo>, StoreError> {
        let update = sqlx::query_as::<_, Todo>(
            "UPDATE todos SET title = ?, completed = ? WHERE id = ? AND owner_id = ? \
             RETURNING id, title, completed, owner_id",
        )
        .bind(title)
        .bind(completed)
        .bind(todo_id)
        .bind(owner_id)
        .fetch_optional(&self.pool);

        bounded(self.timeout, update).await
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, todo_id: i64, owner_id: i64) -> Result<bool, StoreError> {
        let delete = sqlx::query("DELETE FROM todos WHERE id = ? AND owner_id = ?")
            .bind(todo_id)
            .bind(owner_id)
            .execute(&self.pool);

        let result = bounded(self.timeout, delete).await?;
        Ok(result.rows_affected() > 0)
    }
}
