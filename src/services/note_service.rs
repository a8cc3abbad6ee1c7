use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::note::{CreateNote, Note, UpdateNote};
use crate::database::DatabaseError;
use crate::visibility::{ShareScope, ViewFilter, Viewer};

use super::{find_visible, load_viewer, requested_scope, required_text, ServiceError, ServiceResult};

const NOTE_COLUMNS: &str = "id, topic_id, title, content, created_by, partner_id, group_id, created_at, updated_at";
const MAX_CONTENT_CHARS: usize = 20_000;

pub struct NoteService {
    pool: PgPool,
}

/// Scope of a new note: the topic decides when there is one, and an explicit scope must agree with it
fn note_scope(viewer: &Viewer, input: &CreateNote) -> Result<ShareScope, ServiceError> {
    let explicit = requested_scope(viewer, input.partner_id, input.group_id)?;
    let Some(topic_id) = input.topic_id else {
        return Ok(explicit);
    };
    let inherited = viewer
        .inherited_scope(topic_id)
        .ok_or_else(|| ServiceError::NotFound("Topic not found".to_string()))?;
    if explicit.is_shared() && explicit != inherited {
        return Err(ServiceError::invalid("topic_id", "topic is shared differently than the note"));
    }
    Ok(inherited)
}

/// Scope a note takes when moved into `topic_id`, written from the note creator's side so
/// the creator keeps seeing it. Moves that would cut the creator out are rejected.
fn moved_scope(viewer: &Viewer, note: &Note, topic_id: Uuid) -> ServiceResult<ShareScope> {
    let inherited = viewer
        .inherited_scope(topic_id)
        .ok_or_else(|| ServiceError::NotFound("Topic not found".to_string()))?;
    if note.created_by == viewer.user_id {
        return Ok(inherited);
    }
    match inherited {
        ShareScope::Group(g) => Ok(ShareScope::Group(g)),
        ShareScope::Partner(p) if p == note.created_by => Ok(ShareScope::Partner(viewer.user_id)),
        _ => Err(ServiceError::invalid(
            "topic_id",
            "topic is not shared with the note's author",
        )),
    }
}

fn check_content(content: &str) -> ServiceResult<()> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ServiceError::invalid(
            "content",
            format!("must be at most {} characters", MAX_CONTENT_CHARS),
        ));
    }
    Ok(())
}

impl NoteService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Visible notes, most recently edited first, optionally within one topic
    pub async fn list(&self, user_id: Uuid, filter: ViewFilter, topic_id: Option<Uuid>) -> ServiceResult<Vec<Note>> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        if topic_id.is_some_and(|t| !viewer.can_use_topic(t)) {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM notes
             WHERE (created_by = ANY($1) OR group_id = ANY($2) OR topic_id = ANY($3))
               AND ($4::uuid IS NULL OR topic_id = $4)
             ORDER BY updated_at DESC",
            NOTE_COLUMNS
        );
        let candidates = sqlx::query_as::<_, Note>(&sql)
            .bind(viewer.circle())
            .bind(viewer.group_ids())
            .bind(viewer.usable_topic_ids())
            .bind(topic_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(viewer.retain(candidates, filter))
    }

    pub async fn get(&self, user_id: Uuid, note_id: Uuid) -> ServiceResult<Note> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, note_id).await
    }

    pub async fn create(&self, user_id: Uuid, input: CreateNote) -> ServiceResult<Note> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let title = required_text("title", &input.title, 200)?;
        check_content(&input.content)?;
        let scope = note_scope(&viewer, &input)?;

        let sql = format!(
            "INSERT INTO notes (id, topic_id, title, content, created_by, partner_id, group_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            NOTE_COLUMNS
        );
        let note = sqlx::query_as::<_, Note>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.topic_id)
            .bind(title)
            .bind(&input.content)
            .bind(user_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(note)
    }

    /// Anyone who can see a note may edit it; moving it requires access to the target topic
    pub async fn update(&self, user_id: Uuid, note_id: Uuid, input: UpdateNote) -> ServiceResult<Note> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let current = self.find(&viewer, note_id).await?;

        let title = input.title.as_deref().map(|t| required_text("title", t, 200)).transpose()?;
        if let Some(content) = input.content.as_deref() {
            check_content(content)?;
        }
        // A moved note takes the sharing of its new topic
        let scope = match input.topic_id {
            Some(topic_id) if current.topic_id != Some(topic_id) => moved_scope(&viewer, &current, topic_id)?,
            _ => ShareScope::from_columns(current.partner_id, current.group_id)?,
        };

        let sql = format!(
            "UPDATE notes
             SET title = COALESCE($2, title),
                 content = COALESCE($3, content),
                 topic_id = COALESCE($4, topic_id),
                 partner_id = $5,
                 group_id = $6,
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            NOTE_COLUMNS
        );
        let note = sqlx::query_as::<_, Note>(&sql)
            .bind(note_id)
            .bind(title)
            .bind(input.content)
            .bind(input.topic_id)
            .bind(scope.partner_id())
            .bind(scope.group_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn delete(&self, user_id: Uuid, note_id: Uuid) -> ServiceResult<()> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        self.find(&viewer, note_id).await?;
        sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(note_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, viewer: &Viewer, note_id: Uuid) -> ServiceResult<Note> {
        let sql = format!("SELECT {} FROM notes WHERE id = $1", NOTE_COLUMNS);
        find_visible(&self.pool, viewer, &sql, note_id, "Note not found").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::TopicRef;

    fn input(topic_id: Option<Uuid>, partner_id: Option<Uuid>) -> CreateNote {
        CreateNote {
            topic_id,
            title: "Groceries".to_string(),
            content: String::new(),
            partner_id,
            group_id: None,
        }
    }

    #[test]
    fn topic_scope_wins_over_private_request() {
        let me = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Holidays".to_string(),
            created_by: me,
            partner_id: Some(partner),
            group_id: None,
        };
        let viewer = Viewer::new(me).with_partners([partner]).with_topics([topic.clone()]);

        assert_eq!(note_scope(&viewer, &input(Some(topic.id), None)).unwrap(), ShareScope::Partner(partner));
        assert_eq!(
            note_scope(&viewer, &input(Some(topic.id), Some(partner))).unwrap(),
            ShareScope::Partner(partner)
        );
    }

    #[test]
    fn unknown_topic_is_not_found() {
        let viewer = Viewer::new(Uuid::new_v4());
        assert!(matches!(
            note_scope(&viewer, &input(Some(Uuid::new_v4()), None)),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn explicit_scope_must_match_topic() {
        let me = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let private_topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Diary".to_string(),
            created_by: me,
            partner_id: None,
            group_id: None,
        };
        let viewer = Viewer::new(me).with_partners([partner, other]).with_topics([private_topic.clone()]);
        assert!(matches!(
            note_scope(&viewer, &input(Some(private_topic.id), Some(other))),
            Err(ServiceError::Invalid { field: "topic_id", .. })
        ));
    }

    fn note(created_by: Uuid, partner_id: Option<Uuid>, topic_id: Option<Uuid>) -> Note {
        Note {
            id: Uuid::new_v4(),
            topic_id,
            title: "Packing list".to_string(),
            content: String::new(),
            created_by,
            partner_id,
            group_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn moved_note_follows_its_new_topic() {
        let me = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let group = Uuid::new_v4();
        let group_topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Book club".to_string(),
            created_by: me,
            partner_id: None,
            group_id: Some(group),
        };
        let viewer = Viewer::new(me)
            .with_partners([partner])
            .with_groups([group])
            .with_topics([group_topic.clone()]);

        let mut moved = note(me, Some(partner), None);
        let scope = moved_scope(&viewer, &moved, group_topic.id).unwrap();
        assert_eq!(scope, ShareScope::Group(group));

        moved.topic_id = Some(group_topic.id);
        moved.partner_id = scope.partner_id();
        moved.group_id = scope.group_id();
        assert!(viewer.retain(vec![moved.clone()], ViewFilter::Partner(partner)).is_empty());
        assert_eq!(viewer.retain(vec![moved], ViewFilter::Group(group)).len(), 1);
    }

    #[test]
    fn partner_moving_a_note_keeps_the_author_in_the_pair() {
        let author = Uuid::new_v4();
        let me = Uuid::new_v4();
        let shared_topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Notes with sam".to_string(),
            created_by: author,
            partner_id: Some(me),
            group_id: None,
        };
        let viewer = Viewer::new(me).with_partners([author]).with_topics([shared_topic.clone()]);

        let scope = moved_scope(&viewer, &note(author, Some(me), None), shared_topic.id).unwrap();
        assert_eq!(scope, ShareScope::Partner(me));
    }

    #[test]
    fn moving_someone_elses_note_into_a_private_topic_is_rejected() {
        let author = Uuid::new_v4();
        let me = Uuid::new_v4();
        let diary = TopicRef {
            id: Uuid::new_v4(),
            name: "Diary".to_string(),
            created_by: me,
            partner_id: None,
            group_id: None,
        };
        let viewer = Viewer::new(me).with_partners([author]).with_topics([diary.clone()]);

        assert!(matches!(
            moved_scope(&viewer, &note(author, Some(me), None), diary.id),
            Err(ServiceError::Invalid { field: "topic_id", .. })
        ));
        assert!(matches!(
            moved_scope(&viewer, &note(author, Some(me), None), Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn content_is_bounded() {
        assert!(check_content("short").is_ok());
        assert!(check_content(&"a".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }
}
