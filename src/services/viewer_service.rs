use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::topic::Topic;
use crate::database::DatabaseError;
use crate::visibility::{TopicRef, Viewer};

/// Load partner links, group memberships, reachable topics and usernames for `user_id`
pub async fn load_viewer(pool: &PgPool, user_id: Uuid) -> Result<Viewer, DatabaseError> {
    let partners: Vec<Uuid> = sqlx::query_scalar(
        "SELECT CASE WHEN user_a = $1 THEN user_b ELSE user_a END
         FROM partner_links
         WHERE user_a = $1 OR user_b = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let groups: Vec<Uuid> = sqlx::query_scalar("SELECT group_id FROM group_members WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let mut circle = partners.clone();
    circle.push(user_id);

    let usernames: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT id, username FROM profiles WHERE id = ANY($1) AND username IS NOT NULL",
    )
    .bind(&circle)
    .fetch_all(pool)
    .await?;

    let topics: Vec<Topic> = sqlx::query_as(
        "SELECT id, name, created_by, partner_id, group_id, created_at
         FROM topics
         WHERE created_by = ANY($1) OR group_id = ANY($2)",
    )
    .bind(&circle)
    .bind(&groups)
    .fetch_all(pool)
    .await?;

    Ok(Viewer::new(user_id)
        .with_partners(partners)
        .with_groups(groups)
        .with_usernames(usernames)
        .with_topics(topics.iter().map(TopicRef::from)))
}
