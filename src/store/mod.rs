//! SQLite-backed record store for users, posts, comments, and likes.
//!
//! Relationships are explicit foreign-key columns with query-by-filter
//! accessors — no implicit traversal. Writes serialize behind a single
//! connection mutex; WAL mode keeps concurrent reads cheap.
//!
//! Failure classes are explicit: `Database` is fatal and never collapses
//! into `NotFound`.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Store failure classes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("username '{0}' is already taken")]
    Duplicate(String),

    #[error("not the owner of this record")]
    Forbidden,

    /// Datastore unavailability or corruption — the fatal class.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A registered user. `digest` is the stored `"<hex_hmac>,<salt>"` string.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub digest: String,
    pub email: Option<String>,
    pub created_at: i64,
}

/// A blog post, joined with its author's username for display.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub subject: String,
    pub content: String,
    pub created_at: i64,
    pub last_modified: i64,
}

/// A comment on a post.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: i64,
}

/// SQLite-backed blog store.
pub struct BlogStore {
    conn: Mutex<Connection>,
}

impl BlogStore {
    /// Open (or create) the blog database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                digest TEXT NOT NULL,
                email TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subject TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_modified INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
            CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);

            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

            CREATE TABLE IF NOT EXISTS likes (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Create a user with a pre-hashed credential digest. Returns the id.
    ///
    /// Usernames are unique and case-sensitive.
    pub fn create_user(
        &self,
        username: &str,
        digest: &str,
        email: Option<&str>,
    ) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, digest, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, digest, email, epoch_secs()],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(username.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by exact username.
    pub fn user_by_name(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, digest, email, created_at FROM users WHERE username = ?1",
            params![username],
            read_user,
        );
        optional(row)
    }

    /// Look up a user by id.
    pub fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, digest, email, created_at FROM users WHERE id = ?1",
            params![id],
            read_user,
        );
        optional(row)
    }

    // ── Posts ───────────────────────────────────────────────────────

    /// Create a post. Returns the new post id.
    pub fn create_post(&self, author_id: i64, subject: &str, content: &str) -> StoreResult<i64> {
        let now = epoch_secs();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO posts (author_id, subject, content, created_at, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![author_id, subject, content, now, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch a post by id, or `NotFound`.
    pub fn post_by_id(&self, id: i64) -> StoreResult<Post> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT p.id, p.author_id, u.username, p.subject, p.content,
                    p.created_at, p.last_modified
             FROM posts p JOIN users u ON p.author_id = u.id
             WHERE p.id = ?1",
            params![id],
            read_post,
        );
        required(row)
    }

    /// Most recent posts, newest first.
    pub fn recent_posts(&self, limit: u32) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.author_id, u.username, p.subject, p.content,
                    p.created_at, p.last_modified
             FROM posts p JOIN users u ON p.author_id = u.id
             ORDER BY p.created_at DESC, p.id DESC LIMIT ?1",
        )?;
        let posts = stmt
            .query_map(params![limit], read_post)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    /// All posts by one author, newest first.
    pub fn posts_by_author(&self, author_id: i64) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.author_id, u.username, p.subject, p.content,
                    p.created_at, p.last_modified
             FROM posts p JOIN users u ON p.author_id = u.id
             WHERE p.author_id = ?1
             ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let posts = stmt
            .query_map(params![author_id], read_post)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    /// Update a post's subject and content. Author-only.
    pub fn update_post(
        &self,
        id: i64,
        author_id: i64,
        subject: &str,
        content: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        self.check_owner(&conn, "posts", id, author_id)?;
        conn.execute(
            "UPDATE posts SET subject = ?1, content = ?2, last_modified = ?3 WHERE id = ?4",
            params![subject, content, epoch_secs(), id],
        )?;
        Ok(())
    }

    /// Delete a post. Author-only; comments and likes cascade.
    pub fn delete_post(&self, id: i64, author_id: i64) -> StoreResult<()> {
        let conn = self.conn.lock();
        self.check_owner(&conn, "posts", id, author_id)?;
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Comments ────────────────────────────────────────────────────

    /// Add a comment to a post. Returns the new comment id.
    pub fn add_comment(&self, post_id: i64, author_id: i64, content: &str) -> StoreResult<i64> {
        let conn = self.conn.lock();
        if !self.row_exists(&conn, "posts", post_id)? {
            return Err(StoreError::NotFound);
        }
        conn.execute(
            "INSERT INTO comments (post_id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![post_id, author_id, content, epoch_secs()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Comments on a post, oldest first.
    pub fn comments_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.author_id, u.username, c.content, c.created_at
             FROM comments c JOIN users u ON c.author_id = u.id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;
        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_name: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    /// Delete a comment. Author-only. Returns the post id for redirects.
    pub fn delete_comment(&self, id: i64, author_id: i64) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let row: Result<(i64, i64), _> = conn.query_row(
            "SELECT post_id, author_id FROM comments WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        let (post_id, owner) = match row {
            Ok(pair) => pair,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if owner != author_id {
            return Err(StoreError::Forbidden);
        }
        conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(post_id)
    }

    // ── Likes ───────────────────────────────────────────────────────

    /// Like a post. Idempotent; liking your own post is `Forbidden`.
    pub fn like_post(&self, post_id: i64, user_id: i64) -> StoreResult<()> {
        let conn = self.conn.lock();
        let author: Result<i64, _> = conn.query_row(
            "SELECT author_id FROM posts WHERE id = ?1",
            params![post_id],
            |row| row.get(0),
        );
        let author = match author {
            Ok(id) => id,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if author == user_id {
            return Err(StoreError::Forbidden);
        }
        conn.execute(
            "INSERT OR IGNORE INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, epoch_secs()],
        )?;
        Ok(())
    }

    /// Remove a like. Succeeds even if none existed.
    pub fn unlike_post(&self, post_id: i64, user_id: i64) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(())
    }

    /// Number of likes on a post.
    pub fn like_count(&self, post_id: i64) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Whether the user has liked the post.
    pub fn user_likes(&self, post_id: i64, user_id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn row_exists(&self, conn: &Connection, table: &str, id: i64) -> StoreResult<bool> {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn check_owner(&self, conn: &Connection, table: &str, id: i64, owner_id: i64) -> StoreResult<()> {
        let row: Result<i64, _> = conn.query_row(
            &format!("SELECT author_id FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        );
        match row {
            Ok(author) if author == owner_id => Ok(()),
            Ok(_) => Err(StoreError::Forbidden),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        digest: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn read_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        subject: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        last_modified: row.get(6)?,
    })
}

fn optional<T>(row: Result<T, rusqlite::Error>) -> StoreResult<Option<T>> {
    match row {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn required<T>(row: Result<T, rusqlite::Error>) -> StoreResult<T> {
    match row {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ── Tests ───────────────────────────────────────────────────────────
