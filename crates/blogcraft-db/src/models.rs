//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the API models in blogcraft-types.

use blogcraft_types::models::{Post, PostStatus};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;

use crate::{DbError, Result};

pub struct UserRow {
    pub id: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PostRow {
    pub fn into_post(self) -> Result<Post> {
        let id: Uuid = self
            .id
            .parse()
            .map_err(|e| DbError::Corrupt(format!("post id '{}': {}", self.id, e)))?;
        let status: PostStatus = self
            .status
            .parse()
            .map_err(|e| DbError::Corrupt(format!("post '{}': {}", self.id, e)))?;

        Ok(Post {
            id,
            title: self.title,
            content: self.content,
            tags: self.tags,
            status,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Fixed-width RFC 3339 with microseconds, so text ordering in SQLite
/// matches chronological ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the precision we store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}
