use blogcraft_types::models::PostStatus;
use chrono::Duration;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{PostRow, UserRow, format_timestamp, now, parse_timestamp};
use crate::{Database, DbError, Result};

const POST_COLUMNS: &str = "id, title, content, tags, status, created_at, updated_at";

/// Field values for a draft save or a publish.
#[derive(Debug, Clone, Copy)]
pub struct PostWrite<'a> {
    pub title: &'a str,
    /// `None` leaves an existing value alone; new rows get an empty string.
    pub content: Option<&'a str>,
    pub tags: Option<&'a str>,
    /// `Some` forces the status on both paths. `None` keeps an existing
    /// row's status and inserts new rows as drafts.
    pub status: Option<PostStatus>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            ) {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(DbError::DuplicateEmail),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Exact, case-sensitive match on the stored email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password, created_at FROM users WHERE email = ?1",
                    [email],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Posts --

    /// Update the post stored under `key`, or insert a new one with a fresh
    /// id when no row matches. An empty key never matches, so it always
    /// inserts. The lookup and the write share one transaction.
    pub fn upsert_post(&self, key: &str, write: PostWrite<'_>) -> Result<PostRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = match query_post(&tx, key)? {
                Some(current) => {
                    let row = PostRow {
                        title: write.title.to_string(),
                        content: write
                            .content
                            .map(str::to_string)
                            .unwrap_or(current.content),
                        tags: write.tags.map(str::to_string).unwrap_or(current.tags),
                        status: write
                            .status
                            .map(|s| s.as_str().to_string())
                            .unwrap_or(current.status),
                        updated_at: next_updated_at(&current.updated_at)?,
                        id: current.id,
                        created_at: current.created_at,
                    };
                    tx.execute(
                        "UPDATE posts
                         SET title = ?2, content = ?3, tags = ?4, status = ?5, updated_at = ?6
                         WHERE id = ?1",
                        params![row.id, row.title, row.content, row.tags, row.status, row.updated_at],
                    )?;
                    row
                }
                None => {
                    let ts = format_timestamp(now());
                    let row = PostRow {
                        id: Uuid::new_v4().to_string(),
                        title: write.title.to_string(),
                        content: write.content.unwrap_or_default().to_string(),
                        tags: write.tags.unwrap_or_default().to_string(),
                        status: write.status.unwrap_or(PostStatus::Draft).as_str().to_string(),
                        created_at: ts.clone(),
                        updated_at: ts,
                    };
                    tx.execute(
                        "INSERT INTO posts (id, title, content, tags, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            row.id,
                            row.title,
                            row.content,
                            row.tags,
                            row.status,
                            row.created_at,
                            row.updated_at
                        ],
                    )?;
                    row
                }
            };

            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Every post, most recently written first.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `false` without touching the table when no post has `id`.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_post(&tx, id)?.is_none() {
                return Ok(false);
            }
            tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(true)
        })
    }
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            [id],
            map_post,
        )
        .optional()?;
    Ok(row)
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        tags: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Strictly later than `previous`, even if the clock hasn't moved.
fn next_updated_at(previous: &str) -> Result<String> {
    let previous = parse_timestamp(previous)?;
    let current = now();
    let next = if current > previous {
        current
    } else {
        previous + Duration::microseconds(1)
    };
    Ok(format_timestamp(next))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> PostWrite<'_> {
        PostWrite {
            title,
            content: None,
            tags: None,
            status: None,
        }
    }

    fn count_users(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap()
    }

    fn published(title: &str) -> PostWrite<'_> {
        PostWrite {
            status: Some(PostStatus::Published),
            ..draft(title)
        }
    }

    #[test]
    fn duplicate_email_is_distinguished() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@x.com", "hash").unwrap();

        let err = db.create_user("u2", "a@x.com", "hash").unwrap_err();
        assert!(matches!(err, DbError::DuplicateEmail));
        assert_eq!(count_users(&db), 1);
    }

    #[test]
    fn email_lookup_is_case_sensitive() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@x.com", "hash").unwrap();

        assert!(db.get_user_by_email("a@x.com").unwrap().is_some());
        assert!(db.get_user_by_email("A@x.com").unwrap().is_none());
    }

    #[test]
    fn empty_key_always_inserts() {
        let db = Database::open_in_memory().unwrap();
        let a = db.upsert_post("", draft("one")).unwrap();
        let b = db.upsert_post("", draft("two")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, "DRAFT");
        assert_eq!(a.content, "");
        assert_eq!(a.tags, "");
        assert_eq!(db.list_posts().unwrap().len(), 2);
    }

    #[test]
    fn unknown_key_inserts_with_fresh_id() {
        let db = Database::open_in_memory().unwrap();
        let row = db.upsert_post("not-a-real-id", published("hello")).unwrap();

        assert_ne!(row.id, "not-a-real-id");
        assert_eq!(row.status, "PUBLISHED");
        assert!(db.get_post("not-a-real-id").unwrap().is_none());
    }

    #[test]
    fn draft_save_keeps_status_and_absent_fields() {
        let db = Database::open_in_memory().unwrap();
        let created = db
            .upsert_post(
                "",
                PostWrite {
                    title: "first",
                    content: Some("body"),
                    tags: Some("a,b"),
                    status: Some(PostStatus::Published),
                },
            )
            .unwrap();

        let updated = db.upsert_post(&created.id, draft("second")).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "second");
        assert_eq!(updated.content, "body");
        assert_eq!(updated.tags, "a,b");
        assert_eq!(updated.status, "PUBLISHED");
        assert_eq!(updated.created_at, created.created_at);

        let stored = db.get_post(&created.id).unwrap().unwrap();
        assert_eq!(stored.title, "second");
        assert_eq!(stored.updated_at, updated.updated_at);
    }

    #[test]
    fn updated_at_strictly_increases() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_post("", draft("t")).unwrap();
        let second = db.upsert_post(&first.id, published("t")).unwrap();
        let third = db.upsert_post(&first.id, published("t")).unwrap();

        assert!(second.updated_at > first.updated_at);
        assert!(third.updated_at > second.updated_at);
    }

    #[test]
    fn list_orders_by_latest_write() {
        let db = Database::open_in_memory().unwrap();
        let pause = || std::thread::sleep(std::time::Duration::from_millis(2));
        let t1 = db.upsert_post("", draft("t1")).unwrap();
        pause();
        let t2 = db.upsert_post("", draft("t2")).unwrap();
        pause();
        let t3 = db.upsert_post("", draft("t3")).unwrap();
        pause();

        let ids: Vec<String> = db.list_posts().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![t3.id.clone(), t2.id.clone(), t1.id.clone()]);

        // Touching the oldest moves it to the front.
        db.upsert_post(&t1.id, draft("t1 again")).unwrap();
        let ids: Vec<String> = db.list_posts().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![t1.id, t3.id, t2.id]);
    }

    #[test]
    fn delete_reports_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let row = db.upsert_post("", draft("doomed")).unwrap();

        assert!(!db.delete_post("missing").unwrap());
        assert_eq!(db.list_posts().unwrap().len(), 1);

        assert!(db.delete_post(&row.id).unwrap());
        assert!(db.get_post(&row.id).unwrap().is_none());
        assert!(!db.delete_post(&row.id).unwrap());
    }
}
