use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Group;
use crate::error::{AppError, AppResult, FieldError};

pub const TITLE_MAX_CHARS: usize = 200;

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> AppResult<Group> {
    conn.query_row(
        "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
        params![slug],
        group_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn exists(conn: &Connection, id: i64) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM post_groups WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

/// All groups by title, for the group picker on the post form.
pub fn list(conn: &Connection) -> AppResult<Vec<Group>> {
    let mut stmt =
        conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title, id")?;
    let groups = stmt
        .query_map([], group_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

pub fn create(
    conn: &Connection,
    slug: &str,
    title: &str,
    description: Option<&str>,
) -> AppResult<Group> {
    let slug = slug.trim();
    let title = title.trim();
    let mut errors = Vec::new();

    if !valid_slug(slug) {
        errors.push(FieldError::new(
            "slug",
            "Use letters, digits, hyphens and underscores.",
        ));
    } else if find_by_slug(conn, slug).is_ok() {
        errors.push(FieldError::new("slug", "A group with this slug already exists."));
    }
    if title.is_empty() {
        errors.push(FieldError::new("title", "This field is required."));
    } else if title.chars().count() > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("Use at most {} characters.", TITLE_MAX_CHARS),
        ));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let description = description.map(str::trim).filter(|d| !d.is_empty());
    conn.execute(
        "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
        params![title, slug, description],
    )?;
    tracing::info!("Created group {}", slug);

    Ok(Group {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        slug: slug.to_string(),
        description: description.map(str::to_string),
    })
}

/// Delete a group. Its posts stay, with no group.
pub fn delete(conn: &Connection, slug: &str) -> AppResult<()> {
    let removed = conn.execute("DELETE FROM post_groups WHERE slug = ?1", params![slug])?;
    if removed == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("Deleted group {}", slug);
    Ok(())
}
