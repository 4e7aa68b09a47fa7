//! Posts, comments and categories.
//!
//! Listings carry like/dislike totals and, when a viewer is given, the
//! viewer's own stance, so a page renders from one call per list.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Category, CategoryId, CommentId, PostId, UserId};
use crate::db::store::{self, Deadline, StoreError, StoreFailure};
use crate::reactions::{Counts, ReactionTarget, Stance, TargetDirectory};
use crate::state::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Not found")]
    NotFound,

    #[error("Unknown category: {0}")]
    UnknownCategory(CategoryId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ForumError {
    fn from(e: rusqlite::Error) -> Self {
        ForumError::Store(e.into())
    }
}

impl StoreFailure for ForumError {
    fn store_error(&self) -> Option<&StoreError> {
        match self {
            ForumError::Store(e) => Some(e),
            _ => None,
        }
    }
}

/// A post as listed or shown, with everything a page needs.
#[derive(Debug, Clone)]
pub struct PostSummary {
    pub id: PostId,
    pub author: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub counts: Counts,
    pub comment_count: i64,
    pub viewer_stance: Option<Stance>,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub counts: Counts,
    pub viewer_stance: Option<Stance>,
}

#[derive(Clone)]
pub struct ForumStore {
    pool: DbPool,
}

impl ForumStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn list_categories(&self, deadline: Deadline) -> Result<Vec<Category>, ForumError> {
        store::with_conn(&self.pool, deadline, |conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
            let categories = stmt
                .query_map([], |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(categories)
        })
    }

    /// Insert a post and its category links together. Any unknown category
    /// id rejects the whole post.
    pub fn create_post(
        &self,
        author: UserId,
        title: &str,
        body: &str,
        category_ids: &[CategoryId],
        deadline: Deadline,
    ) -> Result<PostId, ForumError> {
        let post_id = store::immediate(&self.pool, deadline, |tx| {
            tx.execute(
                "INSERT INTO posts (user_id, title, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![author, title, body, Utc::now()],
            )?;
            let post_id = PostId(tx.last_insert_rowid());

            for &category_id in category_ids {
                let known: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
                    params![category_id],
                    |row| row.get(0),
                )?;
                if !known {
                    return Err(ForumError::UnknownCategory(category_id));
                }
                tx.execute(
                    "INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
                    params![post_id, category_id],
                )?;
            }
            Ok(post_id)
        })?;

        tracing::info!(%post_id, user_id = %author, "Post created");
        Ok(post_id)
    }

    /// Newest first, optionally limited to one category.
    pub fn list_posts(
        &self,
        category: Option<CategoryId>,
        viewer: Option<UserId>,
        deadline: Deadline,
    ) -> Result<Vec<PostSummary>, ForumError> {
        store::with_conn(&self.pool, deadline, |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE ?2 IS NULL
                   OR EXISTS(SELECT 1 FROM post_categories pc
                             WHERE pc.post_id = p.id AND pc.category_id = ?2)
                 ORDER BY p.id DESC",
                POST_SELECT
            ))?;
            let mut posts = stmt
                .query_map(params![viewer, category], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for post in &mut posts {
                post.categories = categories_of(conn, post.id)?;
            }
            Ok(posts)
        })
    }

    pub fn get_post(
        &self,
        id: PostId,
        viewer: Option<UserId>,
        deadline: Deadline,
    ) -> Result<PostSummary, ForumError> {
        store::with_conn(&self.pool, deadline, |conn| {
            let post = conn
                .query_row(
                    &format!("{} WHERE p.id = ?2", POST_SELECT),
                    params![viewer, id],
                    post_from_row,
                )
                .optional()?;
            let mut post = post.ok_or(ForumError::NotFound)?;
            post.categories = categories_of(conn, post.id)?;
            Ok(post)
        })
    }

    pub fn create_comment(
        &self,
        post_id: PostId,
        author: UserId,
        body: &str,
        deadline: Deadline,
    ) -> Result<CommentId, ForumError> {
        let comment_id = store::immediate(&self.pool, deadline, |tx| {
            if !post_exists(tx, post_id)? {
                return Err(ForumError::NotFound);
            }
            tx.execute(
                "INSERT INTO comments (post_id, user_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![post_id, author, body, Utc::now()],
            )?;
            Ok(CommentId(tx.last_insert_rowid()))
        })?;

        tracing::info!(%comment_id, %post_id, user_id = %author, "Comment created");
        Ok(comment_id)
    }

    /// Oldest first.
    pub fn list_comments(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
        deadline: Deadline,
    ) -> Result<Vec<CommentView>, ForumError> {
        store::with_conn(&self.pool, deadline, |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, u.username, c.body, c.created_at,
                        COALESCE((SELECT SUM(r.stance = 'like') FROM reactions r
                                  WHERE r.target_kind = 'comment' AND r.target_id = c.id), 0),
                        COALESCE((SELECT SUM(r.stance = 'dislike') FROM reactions r
                                  WHERE r.target_kind = 'comment' AND r.target_id = c.id), 0),
                        (SELECT r.stance FROM reactions r
                         WHERE r.target_kind = 'comment' AND r.target_id = c.id
                           AND r.actor_id = ?1)
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.post_id = ?2
                 ORDER BY c.id ASC",
            )?;
            let comments = stmt
                .query_map(params![viewer, post_id], |row| {
                    Ok(CommentView {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author: row.get(2)?,
                        body: row.get(3)?,
                        created_at: row.get(4)?,
                        counts: Counts {
                            likes: row.get(5)?,
                            dislikes: row.get(6)?,
                        },
                        viewer_stance: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    /// The post a comment belongs to.
    pub fn comment_post(&self, id: CommentId, deadline: Deadline) -> Result<PostId, ForumError> {
        store::with_conn(&self.pool, deadline, |conn| {
            conn.query_row(
                "SELECT post_id FROM comments WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(ForumError::NotFound)
        })
    }
}

impl TargetDirectory for ForumStore {
    fn target_exists(&self, conn: &Connection, target: ReactionTarget) -> rusqlite::Result<bool> {
        match target {
            ReactionTarget::Post(id) => post_exists(conn, id),
            ReactionTarget::Comment(id) => conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            ),
        }
    }
}

// ?1 is the viewer (may be NULL), ?2 is left for the caller's filter.
const POST_SELECT: &str = "
    SELECT p.id, u.username, p.title, p.body, p.created_at,
           COALESCE((SELECT SUM(r.stance = 'like') FROM reactions r
                     WHERE r.target_kind = 'post' AND r.target_id = p.id), 0),
           COALESCE((SELECT SUM(r.stance = 'dislike') FROM reactions r
                     WHERE r.target_kind = 'post' AND r.target_id = p.id), 0),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
           (SELECT r.stance FROM reactions r
            WHERE r.target_kind = 'post' AND r.target_id = p.id AND r.actor_id = ?1)
    FROM posts p
    JOIN users u ON u.id = p.user_id";

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostSummary> {
    Ok(PostSummary {
        id: row.get(0)?,
        author: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        categories: Vec::new(),
        counts: Counts {
            likes: row.get(5)?,
            dislikes: row.get(6)?,
        },
        comment_count: row.get(7)?,
        viewer_stance: row.get(8)?,
    })
}

fn categories_of(conn: &Connection, post_id: PostId) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.id, c.name FROM categories c
         JOIN post_categories pc ON pc.category_id = c.id
         WHERE pc.post_id = ?1
         ORDER BY c.id",
    )?;
    let rows = stmt.query_map(params![post_id], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn post_exists(conn: &Connection, id: PostId) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
}
