//! Post feeds: every query here returns posts newest first, one page at a time.

use rusqlite::{params_from_iter, Connection};

use crate::auth::accounts;
use crate::db::models::{Group, Post, PostGroup, User};
use crate::error::AppResult;
use crate::pagination::{Page, PageWindow, Paginator};
use crate::posts::{follows, groups};

/// Which posts a feed draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl Scope {
    fn filter(&self) -> (&'static str, Vec<i64>) {
        match *self {
            Scope::All => ("", vec![]),
            Scope::Group(id) => ("WHERE p.group_id = ?", vec![id]),
            Scope::Author(id) => ("WHERE p.author_id = ?", vec![id]),
            Scope::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
                vec![id],
            ),
        }
    }
}

pub(crate) const POST_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.author_id, u.username, \
            g.id, g.slug, g.title, p.image \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

pub(crate) const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

pub(crate) fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(PostGroup {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group,
        image: row.get(8)?,
    })
}

pub fn count(conn: &Connection, scope: Scope) -> AppResult<usize> {
    let (filter, args) = scope.filter();
    let n: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p {}", filter),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

/// Count the scope and clamp the requested page number against it.
pub fn window(
    conn: &Connection,
    scope: Scope,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<PageWindow> {
    Ok(Paginator::new(count(conn, scope)?, per_page).window(requested))
}

/// Fetch the posts inside an already clamped window.
pub fn fetch(conn: &Connection, scope: Scope, window: PageWindow) -> AppResult<Page<Post>> {
    let (filter, mut args) = scope.filter();
    args.push(window.limit as i64);
    args.push(window.offset as i64);

    let mut stmt = conn.prepare(&format!(
        "{} {} {} LIMIT ? OFFSET ?",
        POST_SELECT, filter, NEWEST_FIRST
    ))?;
    let posts = stmt
        .query_map(params_from_iter(args.iter()), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::from_window(window, posts))
}

pub fn page(
    conn: &Connection,
    scope: Scope,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<Page<Post>> {
    let window = window(conn, scope, per_page, requested)?;
    fetch(conn, scope, window)
}

pub fn home(conn: &Connection, per_page: usize, requested: Option<&str>) -> AppResult<Page<Post>> {
    page(conn, Scope::All, per_page, requested)
}

/// Posts of the group with `slug`. NotFound if there is no such group.
pub fn group(
    conn: &Connection,
    slug: &str,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<(Group, Page<Post>)> {
    let group = groups::find_by_slug(conn, slug)?;
    let posts = page(conn, Scope::Group(group.id), per_page, requested)?;
    Ok((group, posts))
}

pub struct Profile {
    pub author: User,
    pub post_count: usize,
    pub follower_count: usize,
    /// Whether the viewer follows this author; false for anonymous viewers.
    pub following: bool,
    pub posts: Page<Post>,
}

/// Posts by `username`. NotFound if there is no such user.
pub fn profile(
    conn: &Connection,
    username: &str,
    viewer: Option<i64>,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<Profile> {
    let author = accounts::find_by_username(conn, username)?;
    let posts = page(conn, Scope::Author(author.id), per_page, requested)?;
    let post_count = count(conn, Scope::Author(author.id))?;
    let follower_count = follows::follower_count(conn, author.id)?;
    let following = match viewer {
        Some(viewer) => follows::is_following(conn, viewer, author.id)?,
        None => false,
    };
    Ok(Profile {
        author,
        post_count,
        follower_count,
        following,
        posts,
    })
}

/// Posts by the authors `user_id` follows; empty when they follow nobody.
pub fn following(
    conn: &Connection,
    user_id: i64,
    per_page: usize,
    requested: Option<&str>,
) -> AppResult<Page<Post>> {
    page(conn, Scope::FollowedBy(user_id), per_page, requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::error::AppError;
    use crate::posts::testing::{insert_post, insert_user};

    #[test]
    fn home_is_newest_first_and_paginated() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_user(&conn, "geralt");
        let ids: Vec<i64> = (0..15)
            .map(|i| insert_post(&conn, author, &format!("post {}", i), None))
            .collect();

        let first = home(&conn, 10, Some("1")).unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items[0].id, ids[14]);
        assert_eq!(first.items[0].author_username, "geralt");

        let second = home(&conn, 10, Some("2")).unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second.items.last().unwrap().id, ids[0]);

        let clamped = home(&conn, 10, Some("42")).unwrap();
        assert_eq!(clamped.number, 2);
    }

    #[test]
    fn ordering_follows_creation_time_before_id() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_user(&conn, "geralt");
        let newer = insert_post(&conn, author, "newer", None);
        let older = insert_post(&conn, author, "older", None);
        conn.execute(
            "UPDATE posts SET created_at = '2020-01-01 00:00:00' WHERE id = ?1",
            [older],
        )
        .unwrap();

        let ids: Vec<i64> = home(&conn, 10, None).unwrap().items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[test]
    fn group_feed_only_has_group_posts() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_user(&conn, "geralt");
        let cats = groups::create(&conn, "cats", "Cats", None).unwrap();
        groups::create(&conn, "dogs", "Dogs", None).unwrap();
        let in_group = insert_post(&conn, author, "meow", Some(cats.id));
        insert_post(&conn, author, "no group", None);

        let (group, posts) = group(&conn, "cats", 10, None).unwrap();
        assert_eq!(group.title, "Cats");
        assert_eq!(posts.items.len(), 1);
        assert_eq!(posts.items[0].id, in_group);
        assert_eq!(posts.items[0].group.as_ref().unwrap().slug, "cats");

        let (_, empty) = super::group(&conn, "dogs", 10, None).unwrap();
        assert!(empty.is_empty());
        assert!(matches!(super::group(&conn, "birds", 10, None), Err(AppError::NotFound)));
    }

    #[test]
    fn profile_feed_only_has_author_posts() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let geralt = insert_user(&conn, "geralt");
        let yen = insert_user(&conn, "yennefer");
        insert_post(&conn, geralt, "hmm", None);
        insert_post(&conn, geralt, "wind's howling", None);
        insert_post(&conn, yen, "lilac and gooseberries", None);

        let p = profile(&conn, "geralt", None, 10, None).unwrap();
        assert_eq!(p.author.id, geralt);
        assert_eq!(p.post_count, 2);
        assert!(p.posts.items.iter().all(|post| post.author_id == geralt));
        assert!(!p.following);

        follows::follow(&conn, yen, geralt).unwrap();
        let p = profile(&conn, "geralt", Some(yen), 10, None).unwrap();
        assert!(p.following);
        assert_eq!(p.follower_count, 1);

        assert!(matches!(
            profile(&conn, "ghost", None, 10, None),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn follow_feed_contains_exactly_followed_authors() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let reader = insert_user(&conn, "reader");
        let followed = insert_user(&conn, "followed");
        let other = insert_user(&conn, "other");
        let followed_post = insert_post(&conn, followed, "from followed", None);
        insert_post(&conn, other, "from other", None);
        insert_post(&conn, reader, "from self", None);

        assert!(following(&conn, reader, 10, None).unwrap().is_empty());

        follows::follow(&conn, reader, followed).unwrap();
        let feed = following(&conn, reader, 10, None).unwrap();
        let ids: Vec<i64> = feed.items.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![followed_post]);

        // The edge is directed: the followed author's feed stays empty.
        assert!(following(&conn, followed, 10, None).unwrap().is_empty());

        follows::unfollow(&conn, reader, followed).unwrap();
        assert!(following(&conn, reader, 10, None).unwrap().is_empty());
    }
}
