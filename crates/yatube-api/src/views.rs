use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use yatube_db::models::{CommentRow, GroupRow, PostRow};
use yatube_types::models::{Author, Comment, Group, Post};

/// Characters of post text used as the detail page title.
const TITLE_CHARS: usize = 30;

pub fn group(row: GroupRow) -> Group {
    Group {
        id: row.id,
        title: row.title,
        slug: row.slug,
        description: row.description,
    }
}

pub fn author(id: &str, username: String) -> Author {
    Author {
        id: parse_uuid(id),
        username,
    }
}

pub fn post(row: PostRow) -> Post {
    Post {
        created_at: parse_timestamp(&row.created_at),
        author: author(&row.author_id, row.author_username),
        group: row.group.map(group),
        id: row.id,
        text: row.text,
        image: row.image,
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        created_at: parse_timestamp(&row.created_at),
        author: author(&row.author_id, row.author_username),
        id: row.id,
        post_id: row.post_id,
        text: row.text,
    }
}

pub fn post_title(text: &str) -> String {
    text.chars().take(TITLE_CHARS).collect()
}

fn parse_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt user id '{}': {}", raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite defaults have no timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_and_sqlite_timestamps() {
        let stored = parse_timestamp("2024-03-01T10:20:30.123456Z");
        assert_eq!(stored.timestamp_subsec_micros(), 123456);

        let sqlite = parse_timestamp("2024-03-01 10:20:30");
        assert_eq!(sqlite.timestamp(), stored.timestamp());
    }

    #[test]
    fn title_is_cut_on_char_boundary() {
        let text = "ё".repeat(40);
        assert_eq!(post_title(&text).chars().count(), 30);
    }
}
