//! Feed log entries derived from likes and comments.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Author, NewActivity};
use crate::schema::activities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Like,
    Comment,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Like => "LIKE",
            ActivityKind::Comment => "COMMENT",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            ActivityKind::Like => "curtiu a publicação de",
            ActivityKind::Comment => "comentou na publicação de",
        }
    }
}

/// Human readable line shown in the activity feed.
pub fn describe(kind: ActivityKind, actor_name: &str, post_author_name: &str) -> String {
    format!("{} {} {}", actor_name, kind.verb(), post_author_name)
}

pub fn build(
    kind: ActivityKind,
    actor: Author,
    actor_name: &str,
    post_id: Uuid,
    post_author: Author,
    post_author_name: &str,
) -> NewActivity {
    NewActivity {
        kind: kind.as_str().to_string(),
        description: describe(kind, actor_name, post_author_name),
        user_id: actor.user_id(),
        ong_id: actor.ong_id(),
        post_id: Some(post_id),
        target_user_id: post_author.user_id(),
        target_ong_id: post_author.ong_id(),
    }
}

pub fn record(conn: &mut PgConnection, activity: &NewActivity) -> QueryResult<usize> {
    diesel::insert_into(activities::table)
        .values(activity)
        .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(ActivityKind::Like, "Maria", "Instituto Mãos Dadas"),
            "Maria curtiu a publicação de Instituto Mãos Dadas"
        );
        assert_eq!(
            describe(ActivityKind::Comment, "Instituto Mãos Dadas", "João"),
            "Instituto Mãos Dadas comentou na publicação de João"
        );
    }

    #[test]
    fn test_build_maps_authors_to_columns() {
        let user = Uuid::new_v4();
        let ong = Uuid::new_v4();
        let post = Uuid::new_v4();

        let activity = build(
            ActivityKind::Like,
            Author::User(user),
            "Maria",
            post,
            Author::Ong(ong),
            "ONG",
        );

        assert_eq!(activity.kind, "LIKE");
        assert_eq!(activity.user_id, Some(user));
        assert_eq!(activity.ong_id, None);
        assert_eq!(activity.post_id, Some(post));
        assert_eq!(activity.target_user_id, None);
        assert_eq!(activity.target_ong_id, Some(ong));
    }
}
