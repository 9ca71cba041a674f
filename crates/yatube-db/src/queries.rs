use crate::Database;
use crate::models::{CommentRow, GroupRow, NewPost, PostRow, PostScope, UserRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ToSql, ffi};
use tracing::debug;

const POST_SELECT: &str = "
    SELECT p.id, p.text, p.created_at, p.author_id, u.username, p.image,
           g.id, g.title, g.slug, g.description
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

impl Database {
    // -- Users --

    /// Returns `false` when the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            );

            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    debug!("Username '{}' already taken", username);
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password, created_at FROM users WHERE username = ?1",
                    [username],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Groups --

    /// Returns `None` when the slug is already taken.
    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
                (title, slug, description),
            );

            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_group_by_slug(&self, slug: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                    [slug],
                    map_group,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_group_by_id(&self, id: i64) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, slug, description FROM post_groups WHERE id = ?1",
                    [id],
                    map_group,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title")?;
            let rows = stmt
                .query_map([], map_group)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes a group. Its posts stay, with the group cleared.
    pub fn delete_group(&self, slug: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM post_groups WHERE slug = ?1", [slug])?;
            Ok(n > 0)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (text, created_at, author_id, group_id, image)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    post.text,
                    post.created_at,
                    post.author_id,
                    post.group_id,
                    post.image
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Rewrites the editable fields of a post. Author and timestamp never change.
    pub fn update_post(
        &self,
        id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE posts SET text = ?2, group_id = ?3, image = ?4 WHERE id = ?1",
                rusqlite::params![id, text, group_id, image],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("{POST_SELECT} WHERE p.id = ?1");
            let row = conn.query_row(&sql, [id], map_post).optional()?;
            Ok(row)
        })
    }

    /// Deletes a post together with its comments.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Up to `limit` posts of `scope`, newest first, skipping the first `offset`.
    pub fn list_posts(&self, scope: PostScope<'_>, limit: usize, offset: usize) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{POST_SELECT} {} {NEWEST_FIRST} LIMIT {limit} OFFSET {offset}",
                scope_filter(&scope)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(scope_params(&scope).as_slice(), map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_posts(&self, scope: PostScope<'_>) -> Result<usize> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM posts p {}", scope_filter(&scope));
            let n: i64 = conn.query_row(&sql, scope_params(&scope).as_slice(), |r| r.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        post_id: i64,
        author_id: &str,
        text: &str,
        created_at: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![post_id, author_id, text, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Comments of a post in creation order.
    pub fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at ASC, c.id ASC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_comments(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))?)
        })
    }

    // -- Follows --

    /// Creates the `user_id -> author_id` edge.
    ///
    /// Returns `false` without error when the edge already exists or when
    /// both ids are the same user; the table constraints decide both cases.
    pub fn create_follow(&self, user_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)
                 ON CONFLICT (user_id, author_id) DO NOTHING",
                (user_id, author_id),
            );

            match inserted {
                Ok(n) => Ok(n > 0),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == ffi::SQLITE_CONSTRAINT_CHECK =>
                {
                    debug!("Rejected self-follow for {}", user_id);
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn delete_follow(&self, user_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
                (user_id, author_id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn is_following(&self, user_id: &str, author_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2",
                    (user_id, author_id),
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn count_follows(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM follows", [], |r| r.get(0))?))
    }
}

fn scope_filter(scope: &PostScope<'_>) -> &'static str {
    match scope {
        PostScope::All => "",
        PostScope::Group(_) => "WHERE p.group_id = ?1",
        PostScope::Author(_) => "WHERE p.author_id = ?1",
        PostScope::FollowedBy(_) => {
            "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?1)"
        }
    }
}

fn scope_params<'a>(scope: &'a PostScope<'_>) -> Vec<&'a dyn ToSql> {
    match scope {
        PostScope::All => Vec::new(),
        PostScope::Group(id) => vec![id],
        PostScope::Author(id) | PostScope::FollowedBy(id) => vec![id],
    }
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    let group = match row.get::<_, Option<i64>>(6)? {
        Some(id) => Some(GroupRow {
            id,
            title: row.get(7)?,
            slug: row.get(8)?,
            description: row.get(9)?,
        }),
        None => None,
    };

    Ok(PostRow {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        image: row.get(5)?,
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_timestamp;
    use chrono::{Duration, Utc};

    fn user(db: &Database, name: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_user(&id, name, "hash").unwrap();
        id
    }

    fn post(db: &Database, author: &str, text: &str, group: Option<i64>, age_secs: i64) -> i64 {
        let at = format_timestamp(Utc::now() - Duration::seconds(age_secs));
        db.insert_post(&NewPost {
            text,
            author_id: author,
            group_id: group,
            image: None,
            created_at: &at,
        })
        .unwrap()
    }

    #[test]
    fn posts_are_listed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        post(&db, &alice, "middle", None, 50);
        post(&db, &alice, "newest", None, 1);
        post(&db, &alice, "oldest", None, 100);

        let texts: Vec<_> = db.list_posts(PostScope::All, 100, 0).unwrap().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, ["newest", "middle", "oldest"]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_id() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let first = post(&db, &alice, "a", None, 0);
        let at = db.get_post(first).unwrap().unwrap().created_at;
        let second = db
            .insert_post(&NewPost { text: "b", author_id: &alice, group_id: None, image: None, created_at: &at })
            .unwrap();

        let ids: Vec<_> = db.list_posts(PostScope::All, 100, 0).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, [second, first]);
    }

    #[test]
    fn listing_is_windowed_and_counted_per_scope() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        for i in 0..5 {
            post(&db, &alice, &format!("alice {i}"), None, i);
        }
        post(&db, &bob, "bob 0", None, 0);

        assert_eq!(db.count_posts(PostScope::All).unwrap(), 6);
        assert_eq!(db.count_posts(PostScope::Author(&alice)).unwrap(), 5);

        let texts: Vec<_> = db
            .list_posts(PostScope::Author(&alice), 2, 2)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, ["alice 2", "alice 3"]);
        assert!(db.list_posts(PostScope::Author(&alice), 2, 6).unwrap().is_empty());
    }

    #[test]
    fn usernames_are_unique() {
        let db = Database::open_in_memory().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        assert!(db.create_user(&id, "alice", "hash").unwrap());

        let other = uuid::Uuid::new_v4().to_string();
        assert!(!db.create_user(&other, "alice", "hash").unwrap());
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().id, id);
    }

    #[test]
    fn deleting_group_keeps_posts() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let group = db.create_group("Cats", "cats", "All about cats").unwrap().unwrap();
        let id = post(&db, &alice, "meow", Some(group), 0);

        assert!(db.delete_group("cats").unwrap());
        let row = db.get_post(id).unwrap().unwrap();
        assert!(row.group.is_none());
        assert!(db.list_posts(PostScope::Group(group), 100, 0).unwrap().is_empty());
        assert_eq!(db.count_posts(PostScope::Group(group)).unwrap(), 0);
    }

    #[test]
    fn group_slugs_are_unique() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_group("Cats", "cats", "").unwrap().is_some());
        assert!(db.create_group("More cats", "cats", "").unwrap().is_none());
        assert_eq!(db.list_groups().unwrap().len(), 1);
    }

    #[test]
    fn deleting_post_deletes_comments() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let id = post(&db, &alice, "hello", None, 0);
        db.insert_comment(id, &alice, "first", &format_timestamp(Utc::now())).unwrap();
        assert_eq!(db.count_comments().unwrap(), 1);

        assert!(db.delete_post(id).unwrap());
        assert_eq!(db.count_comments().unwrap(), 0);
    }

    #[test]
    fn comment_length_is_enforced_by_store() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let id = post(&db, &alice, "hello", None, 0);
        let at = format_timestamp(Utc::now());

        assert!(db.insert_comment(id, &alice, &"x".repeat(201), &at).is_err());
        assert!(db.insert_comment(id, &alice, &"x".repeat(200), &at).is_ok());
    }

    #[test]
    fn follow_constraints() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        assert!(!db.create_follow(&alice, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 0);

        assert!(db.create_follow(&bob, &alice).unwrap());
        assert!(!db.create_follow(&bob, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 1);
        assert!(db.is_following(&bob, &alice).unwrap());
        assert!(!db.is_following(&alice, &bob).unwrap());

        assert!(db.delete_follow(&bob, &alice).unwrap());
        assert!(!db.delete_follow(&bob, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 0);
    }

    #[test]
    fn followed_posts_only_include_followed_authors() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        post(&db, &alice, "by alice", None, 0);
        post(&db, &carol, "by carol", None, 0);

        assert!(db.list_posts(PostScope::FollowedBy(&bob), 100, 0).unwrap().is_empty());

        db.create_follow(&bob, &alice).unwrap();
        let texts: Vec<_> = db
            .list_posts(PostScope::FollowedBy(&bob), 100, 0)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, ["by alice"]);
    }

    #[test]
    fn comments_come_back_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let id = post(&db, &alice, "hello", None, 0);
        let now = Utc::now();
        db.insert_comment(id, &alice, "second", &format_timestamp(now)).unwrap();
        db.insert_comment(id, &alice, "first", &format_timestamp(now - Duration::seconds(5)))
            .unwrap();

        let texts: Vec<_> = db.list_comments(id).unwrap().into_iter().map(|c| c.text).collect();
        assert_eq!(texts, ["first", "second"]);
    }
}
