use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{EventStore, IdentityProvider, StoreError, StoreResult};
use crate::models::{Event, EventId, EventParticipation, EventSummary, NewEvent, User, UserId};

const SUMMARY_SELECT: &str = r#"
    SELECT
        e.id,
        e.title,
        e.description,
        e.event_date AS date,
        COALESCE(
            array_agg(u.username ORDER BY u.username) FILTER (WHERE u.username IS NOT NULL),
            ARRAY[]::TEXT[]
        ) AS participants
    FROM events AS e
    LEFT JOIN event_participations AS p ON p.event_id = e.id
    LEFT JOIN users AS u ON u.id = p.user_id
"#;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Classifies constraint violations so callers can tell a duplicate
/// enrollment from a dangling reference.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate;
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference;
        }
    }
    StoreError::Database(err)
}

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, description, event_date)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, event_date AS date
            "#,
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, description, event_date AS date
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_event_summary(&self, event_id: EventId) -> StoreResult<Option<EventSummary>> {
        let query = format!("{SUMMARY_SELECT} WHERE e.id = $1 GROUP BY e.id");
        let row = sqlx::query_as::<_, EventSummary>(&query)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_event_summaries(&self) -> StoreResult<Vec<EventSummary>> {
        let query = format!("{SUMMARY_SELECT} GROUP BY e.id ORDER BY e.id ASC");
        let rows = sqlx::query_as::<_, EventSummary>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn participant_usernames(&self, event_id: EventId) -> StoreResult<Vec<String>> {
        let usernames = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.username
            FROM event_participations AS p
            INNER JOIN users AS u ON u.id = p.user_id
            WHERE p.event_id = $1
            ORDER BY u.username ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(usernames)
    }

    async fn participation_exists(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM event_participations
                WHERE event_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_participation(&self, participation: &EventParticipation) -> StoreResult<()> {
        // The composite primary key is the authoritative duplicate guard.
        sqlx::query(
            r#"
            INSERT INTO event_participations (event_id, user_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(participation.event_id)
        .bind(&participation.user_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn delete_participation(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM event_participations
            WHERE event_id = $1 AND user_id = $2
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn delete_event(&self, event_id: EventId) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        // The schema cascades as well; deleting explicitly keeps the
        // enrollment removal inside this transaction regardless of schema.
        sqlx::query("DELETE FROM event_participations WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let res = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        if res.rows_affected() < 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
