use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

impl User {
    /// "First Last" when a name is set, otherwise the username.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// A post joined with its author's username and its group, as feeds show it.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub author_id: i64,
    pub author_username: String,
    pub group: Option<PostGroup>,
    pub image: Option<String>,
}

/// The part of a group a post card links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostGroup {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

impl Post {
    pub const EXCERPT_CHARS: usize = 15;

    /// Leading characters of the text, used as the post's short title.
    pub fn excerpt(&self) -> String {
        self.text.chars().take(Self::EXCERPT_CHARS).collect()
    }

    pub fn pub_date(&self) -> String {
        format_date(&self.created_at)
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.excerpt())
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl Comment {
    pub fn pub_date(&self) -> String {
        format_date(&self.created_at)
    }
}

/// Render a database timestamp as "15 Jan 2025"; unparsable input is returned as is.
pub fn format_date(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%-d %b %Y").to_string())
        .unwrap_or_else(|_| db_time.to_string())
}
