use rusqlite::{params, Connection};

use crate::error::AppResult;

/// Create the edge user → author. Self-follows and existing edges are no-ops.
/// Returns whether a new edge was created.
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> AppResult<bool> {
    if user_id == author_id {
        return Ok(false);
    }
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
        params![user_id, author_id],
    )?;
    if inserted > 0 {
        tracing::info!("User {} now follows {}", user_id, author_id);
    }
    Ok(inserted > 0)
}

/// Remove the edge user → author if it exists. Returns whether one was removed.
pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> AppResult<bool> {
    let removed = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(removed > 0)
}

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )?)
}

pub fn follower_count(conn: &Connection, author_id: i64) -> AppResult<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::posts::testing::insert_user;

    fn edge_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn follow_twice_leaves_one_edge() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let u = insert_user(&conn, "u");
        let a = insert_user(&conn, "a");

        assert!(follow(&conn, u, a).unwrap());
        assert!(!follow(&conn, u, a).unwrap());
        assert_eq!(edge_count(&conn), 1);
        assert!(is_following(&conn, u, a).unwrap());
        assert!(!is_following(&conn, a, u).unwrap());
    }

    #[test]
    fn self_follow_creates_nothing() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let u = insert_user(&conn, "u");

        assert!(!follow(&conn, u, u).unwrap());
        assert_eq!(edge_count(&conn), 0);
    }

    #[test]
    fn unfollow_only_touches_its_own_edge() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let u = insert_user(&conn, "u");
        let v = insert_user(&conn, "v");
        let a = insert_user(&conn, "a");
        follow(&conn, u, a).unwrap();
        follow(&conn, v, a).unwrap();
        assert_eq!(follower_count(&conn, a).unwrap(), 2);

        assert!(unfollow(&conn, u, a).unwrap());
        assert!(!unfollow(&conn, u, a).unwrap());
        assert!(is_following(&conn, v, a).unwrap());
        assert_eq!(follower_count(&conn, a).unwrap(), 1);
    }

    #[test]
    fn deleting_a_user_drops_their_edges() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let u = insert_user(&conn, "u");
        let a = insert_user(&conn, "a");
        follow(&conn, u, a).unwrap();
        follow(&conn, a, u).unwrap();

        conn.execute("DELETE FROM users WHERE id = ?1", [a]).unwrap();
        assert_eq!(edge_count(&conn), 0);
    }
}
