use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{AppError, AppResult, FieldError};

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, is_admin, created_at";

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        params![username],
        user_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

pub fn validate_signup(conn: &Connection, form: &SignupForm) -> AppResult<()> {
    let mut errors = Vec::new();
    let username = form.username.trim();

    if username.is_empty() {
        errors.push(FieldError::new("username", "This field is required."));
    } else if username.chars().count() > USERNAME_MAX_CHARS {
        errors.push(FieldError::new(
            "username",
            format!("Use at most {} characters.", USERNAME_MAX_CHARS),
        ));
    } else if !username.chars().all(valid_username_char) {
        errors.push(FieldError::new(
            "username",
            "Use only letters, digits and @/./+/-/_ characters.",
        ));
    } else {
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        if taken {
            errors.push(FieldError::new(
                "username",
                "A user with that username already exists.",
            ));
        }
    }

    if form.password1.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(FieldError::new(
            "password1",
            format!("Use at least {} characters.", PASSWORD_MIN_CHARS),
        ));
    }
    if form.password1 != form.password2 {
        errors.push(FieldError::new("password2", "The two passwords do not match."));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Validate the form and store a new user with a bcrypt hash. Returns the user id.
pub fn create_user(conn: &Connection, form: &SignupForm, bcrypt_cost: u32) -> AppResult<i64> {
    validate_signup(conn, form)?;

    let hash = bcrypt::hash(&form.password1, bcrypt_cost)?;
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    conn.execute(
        "INSERT INTO users (username, first_name, last_name, email, password_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            form.username.trim(),
            non_empty(&form.first_name),
            non_empty(&form.last_name),
            non_empty(&form.email),
            hash
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!("Created user {} ({})", form.username.trim(), id);
    Ok(id)
}

/// Check a username/password pair. Unknown users and wrong passwords both yield `None`.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> AppResult<Option<User>> {
    let row: Option<(User, String)> = conn
        .query_row(
            &format!(
                "SELECT {}, password_hash FROM users WHERE username = ?1",
                USER_COLUMNS
            ),
            params![username.trim()],
            |row| Ok((user_from_row(row)?, row.get(6)?)),
        )
        .optional()?;

    match row {
        Some((user, hash)) if bcrypt::verify(password, &hash)? => Ok(Some(user)),
        _ => Ok(None),
    }
}

/// Delete a user; posts, comments, follows and sessions go with them.
pub fn delete_user(conn: &Connection, username: &str) -> AppResult<()> {
    let removed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
    if removed == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("Deleted user {}", username);
    Ok(())
}

pub fn promote(conn: &Connection, username: &str) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE users SET is_admin = 1 WHERE username = ?1",
        params![username],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
