pub mod feed;
pub mod follows;
pub mod groups;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Comment, Post};
use crate::error::{AppError, AppResult, FieldError};

/// Submitted post fields after the upload (if any) has been stored.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<i64>,
    /// Path of a stored upload, relative to the uploads directory.
    pub image: Option<String>,
}

/// Field checks shared by create and edit; callers run it before storing an upload.
pub fn validate(conn: &Connection, input: &PostInput) -> AppResult<()> {
    let mut errors = Vec::new();
    if input.text.trim().is_empty() {
        errors.push(FieldError::new("text", "This field is required."));
    }
    if let Some(group_id) = input.group_id {
        if !groups::exists(conn, group_id)? {
            errors.push(FieldError::new(
                "group",
                "Select a valid choice. That choice is not one of the available choices.",
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub fn create_post(conn: &Connection, author_id: i64, input: &PostInput) -> AppResult<i64> {
    validate(conn, input)?;
    conn.execute(
        "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
        params![input.text.trim(), author_id, input.group_id, input.image],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!("User {} created post {}", author_id, id);
    Ok(id)
}

/// Update text, group and (when a new one was uploaded) image.
/// Returns false without touching anything when `editor_id` is not the author.
pub fn update_post(
    conn: &Connection,
    editor_id: i64,
    post_id: i64,
    input: &PostInput,
) -> AppResult<bool> {
    let post = get_post(conn, post_id)?;
    if post.author_id != editor_id {
        return Ok(false);
    }
    validate(conn, input)?;
    conn.execute(
        "UPDATE posts SET text = ?1, group_id = ?2, image = COALESCE(?3, image) WHERE id = ?4",
        params![input.text.trim(), input.group_id, input.image, post_id],
    )?;
    tracing::info!("User {} edited post {}", editor_id, post_id);
    Ok(true)
}

pub fn get_post(conn: &Connection, post_id: i64) -> AppResult<Post> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", feed::POST_SELECT),
        params![post_id],
        feed::post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn add_comment(conn: &Connection, author_id: i64, post_id: i64, text: &str) -> AppResult<i64> {
    // NotFound wins over a validation failure.
    get_post(conn, post_id)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "text",
            "This field is required.",
        )]));
    }
    conn.execute(
        "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on a post, newest first.
pub fn comments(conn: &Connection, post_id: i64) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at DESC, c.id DESC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author_id: row.get(2)?,
                author_username: row.get(3)?,
                text: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}
