use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::routine::{
    CreateRoutine, Routine, RoutineCompletion, RoutineItem, RoutineWithItems, ToggleRoutineItem, UpdateRoutine,
};
use crate::database::DatabaseError;

use super::{required_text, ServiceError, ServiceResult};

const ROUTINE_COLUMNS: &str = "id, owner_id, name, days_of_week, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, routine_id, label, position";
const MAX_ITEMS: usize = 50;

/// Creates the day's completion row if missing so the locking select always has a row to lock
const SEED_COMPLETION: &str = "INSERT INTO routine_completions (routine_id, completion_date) VALUES ($1, $2)
     ON CONFLICT (routine_id, completion_date) DO NOTHING";
const LOCK_COMPLETION: &str = "SELECT completed_item_ids FROM routine_completions
     WHERE routine_id = $1 AND completion_date = $2 FOR UPDATE";

/// Completion state of one routine on one date
#[derive(Debug, Clone, Serialize)]
pub struct RoutineProgress {
    pub routine_id: Uuid,
    pub date: NaiveDate,
    pub completed_item_ids: Vec<Uuid>,
    pub completed: usize,
    pub total: usize,
}

impl RoutineProgress {
    pub fn new(routine_id: Uuid, date: NaiveDate, items: &[RoutineItem], done: &[Uuid]) -> Self {
        // Ids of items deleted since they were ticked do not count
        let completed_item_ids: Vec<Uuid> = items.iter().map(|i| i.id).filter(|id| done.contains(id)).collect();
        Self {
            routine_id,
            date,
            completed: completed_item_ids.len(),
            total: items.len(),
            completed_item_ids,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// A routine due on some date together with how far along it is
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledRoutine {
    #[serde(flatten)]
    pub routine: RoutineWithItems,
    pub progress: RoutineProgress,
}

/// Weekdays are numbered from Sunday = 0. No days at all means every day.
pub fn is_scheduled_on(days_of_week: &[i32], weekday: Weekday) -> bool {
    days_of_week.is_empty() || days_of_week.contains(&(weekday.num_days_from_sunday() as i32))
}

/// Sorted, deduplicated weekday numbers
pub fn normalize_days(days: &[i32]) -> ServiceResult<Vec<i32>> {
    if days.iter().any(|d| !(0..=6).contains(d)) {
        return Err(ServiceError::invalid("days_of_week", "days must be 0 (Sunday) to 6 (Saturday)"));
    }
    Ok(days.iter().copied().collect::<BTreeSet<_>>().into_iter().collect())
}

fn clean_items(items: &[String]) -> ServiceResult<Vec<String>> {
    if items.len() > MAX_ITEMS {
        return Err(ServiceError::invalid("items", format!("at most {} items", MAX_ITEMS)));
    }
    items.iter().map(|i| required_text("items", i, 120)).collect()
}

/// Add `item` when absent, remove it when present. Returns whether it is now completed.
pub fn toggle_item(completed: &mut Vec<Uuid>, item: Uuid) -> bool {
    match completed.iter().position(|id| *id == item) {
        Some(pos) => {
            completed.remove(pos);
            false
        }
        None => {
            completed.push(item);
            true
        }
    }
}

pub struct RoutineService {
    pool: PgPool,
}

impl RoutineService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<RoutineWithItems>> {
        let sql = format!("SELECT {} FROM routines WHERE owner_id = $1 ORDER BY created_at", ROUTINE_COLUMNS);
        let routines = sqlx::query_as::<_, Routine>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(routines).await
    }

    /// Routines that run on `date`, each with its progress for that date
    pub async fn scheduled_for(&self, user_id: Uuid, date: NaiveDate) -> ServiceResult<Vec<ScheduledRoutine>> {
        let weekday = date.weekday();
        let scheduled = self
            .list(user_id)
            .await?
            .into_iter()
            .filter(|r| is_scheduled_on(&r.routine.days_of_week, weekday));

        let mut out = Vec::new();
        for routine in scheduled {
            let done = self.completed_ids(routine.routine.id, date).await?;
            let progress = RoutineProgress::new(routine.routine.id, date, &routine.items, &done);
            out.push(ScheduledRoutine { routine, progress });
        }
        Ok(out)
    }

    pub async fn create(&self, user_id: Uuid, input: CreateRoutine) -> ServiceResult<RoutineWithItems> {
        let name = required_text("name", &input.name, 100)?;
        let days = normalize_days(&input.days_of_week)?;
        let labels = clean_items(&input.items)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO routines (id, owner_id, name, days_of_week) VALUES ($1, $2, $3, $4) RETURNING {}",
            ROUTINE_COLUMNS
        );
        let routine = sqlx::query_as::<_, Routine>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name)
            .bind(days)
            .fetch_one(&mut *tx)
            .await?;
        let items = insert_items(&mut tx, routine.id, &labels).await?;
        tx.commit().await?;
        Ok(RoutineWithItems { routine, items })
    }

    /// Replacing the items resets completions recorded against the old ones
    pub async fn update(&self, user_id: Uuid, routine_id: Uuid, input: UpdateRoutine) -> ServiceResult<RoutineWithItems> {
        self.owned(user_id, routine_id).await?;
        let name = input.name.as_deref().map(|n| required_text("name", n, 100)).transpose()?;
        let days = input.days_of_week.as_deref().map(normalize_days).transpose()?;
        let labels = input.items.as_deref().map(clean_items).transpose()?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE routines
             SET name = COALESCE($2, name), days_of_week = COALESCE($3, days_of_week), updated_at = now()
             WHERE id = $1
             RETURNING {}",
            ROUTINE_COLUMNS
        );
        let routine = sqlx::query_as::<_, Routine>(&sql)
            .bind(routine_id)
            .bind(name)
            .bind(days)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(labels) = labels {
            sqlx::query("DELETE FROM routine_items WHERE routine_id = $1")
                .bind(routine_id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, routine_id, &labels).await?;
        }
        tx.commit().await?;

        let items = self.items_of(&[routine_id]).await?;
        Ok(RoutineWithItems { routine, items })
    }

    pub async fn delete(&self, user_id: Uuid, routine_id: Uuid) -> ServiceResult<()> {
        self.owned(user_id, routine_id).await?;
        sqlx::query("DELETE FROM routines WHERE id = $1")
            .bind(routine_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn progress(&self, user_id: Uuid, routine_id: Uuid, date: NaiveDate) -> ServiceResult<RoutineProgress> {
        self.owned(user_id, routine_id).await?;
        let items = self.items_of(&[routine_id]).await?;
        let done = self.completed_ids(routine_id, date).await?;
        Ok(RoutineProgress::new(routine_id, date, &items, &done))
    }

    pub async fn toggle_item(&self, user_id: Uuid, routine_id: Uuid, input: ToggleRoutineItem) -> ServiceResult<RoutineProgress> {
        self.owned(user_id, routine_id).await?;
        let items = self.items_of(&[routine_id]).await?;
        if !items.iter().any(|i| i.id == input.item_id) {
            return Err(ServiceError::NotFound("Routine item not found".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(SEED_COMPLETION)
            .bind(routine_id)
            .bind(input.date)
            .execute(&mut *tx)
            .await?;
        let mut done: Vec<Uuid> = sqlx::query_scalar(LOCK_COMPLETION)
            .bind(routine_id)
            .bind(input.date)
            .fetch_one(&mut *tx)
            .await?;
        toggle_item(&mut done, input.item_id);

        sqlx::query(
            "UPDATE routine_completions SET completed_item_ids = $3, updated_at = now()
             WHERE routine_id = $1 AND completion_date = $2",
        )
        .bind(routine_id)
        .bind(input.date)
        .bind(&done)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(RoutineProgress::new(routine_id, input.date, &items, &done))
    }

    async fn completed_ids(&self, routine_id: Uuid, date: NaiveDate) -> ServiceResult<Vec<Uuid>> {
        let row = sqlx::query_as::<_, RoutineCompletion>(
            "SELECT routine_id, completion_date, completed_item_ids, updated_at
             FROM routine_completions WHERE routine_id = $1 AND completion_date = $2",
        )
        .bind(routine_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|c| c.completed_item_ids).unwrap_or_default())
    }

    async fn items_of(&self, routine_ids: &[Uuid]) -> ServiceResult<Vec<RoutineItem>> {
        let sql = format!(
            "SELECT {} FROM routine_items WHERE routine_id = ANY($1) ORDER BY position, label",
            ITEM_COLUMNS
        );
        Ok(sqlx::query_as::<_, RoutineItem>(&sql)
            .bind(routine_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn attach_items(&self, routines: Vec<Routine>) -> ServiceResult<Vec<RoutineWithItems>> {
        let ids: Vec<Uuid> = routines.iter().map(|r| r.id).collect();
        let mut by_routine: HashMap<Uuid, Vec<RoutineItem>> = HashMap::new();
        for item in self.items_of(&ids).await? {
            by_routine.entry(item.routine_id).or_default().push(item);
        }
        Ok(routines
            .into_iter()
            .map(|routine| {
                let items = by_routine.remove(&routine.id).unwrap_or_default();
                RoutineWithItems { routine, items }
            })
            .collect())
    }

    async fn owned(&self, user_id: Uuid, routine_id: Uuid) -> ServiceResult<()> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM routines WHERE id = $1")
            .bind(routine_id)
            .fetch_optional(&self.pool)
            .await?;
        match owner {
            Some(owner) if owner == user_id => Ok(()),
            _ => Err(ServiceError::NotFound("Routine not found".to_string())),
        }
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    routine_id: Uuid,
    labels: &[String],
) -> ServiceResult<Vec<RoutineItem>> {
    let sql = format!(
        "INSERT INTO routine_items (id, routine_id, label, position) VALUES ($1, $2, $3, $4) RETURNING {}",
        ITEM_COLUMNS
    );
    let mut items = Vec::with_capacity(labels.len());
    for (position, label) in labels.iter().enumerate() {
        let item = sqlx::query_as::<_, RoutineItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(routine_id)
            .bind(label)
            .bind(position as i32)
            .fetch_one(&mut **tx)
            .await?;
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(routine_id: Uuid, label: &str, position: i32) -> RoutineItem {
        RoutineItem {
            id: Uuid::new_v4(),
            routine_id,
            label: label.to_string(),
            position,
        }
    }

    #[test]
    fn empty_schedule_means_every_day() {
        for day in [Weekday::Sun, Weekday::Wed, Weekday::Sat] {
            assert!(is_scheduled_on(&[], day));
        }
    }

    #[test]
    fn weekdays_count_from_sunday() {
        let weekends = [0, 6];
        assert!(is_scheduled_on(&weekends, Weekday::Sun));
        assert!(is_scheduled_on(&weekends, Weekday::Sat));
        assert!(!is_scheduled_on(&weekends, Weekday::Mon));

        // 2024-03-04 was a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(is_scheduled_on(&[1], monday.weekday()));
    }

    #[test]
    fn days_are_validated_and_deduplicated() {
        assert_eq!(normalize_days(&[5, 1, 5, 0]).unwrap(), vec![0, 1, 5]);
        assert!(normalize_days(&[7]).is_err());
        assert!(normalize_days(&[-1]).is_err());
    }

    #[test]
    fn toggle_adds_then_removes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut done = vec![a];
        assert!(toggle_item(&mut done, b));
        assert_eq!(done, vec![a, b]);
        assert!(!toggle_item(&mut done, a));
        assert_eq!(done, vec![b]);
    }

    #[test]
    fn first_ticks_of_the_day_lock_a_seeded_row() {
        // Both ticks must read the same locked row, so the seed never overwrites
        assert!(SEED_COMPLETION.contains("ON CONFLICT (routine_id, completion_date) DO NOTHING"));
        assert!(!SEED_COMPLETION.contains("completed_item_ids"));
        assert!(LOCK_COMPLETION.ends_with("FOR UPDATE"));

        // Serialized through the lock, two first ticks keep both items
        let (stretch, journal) = (Uuid::new_v4(), Uuid::new_v4());
        let mut done = Vec::new();
        toggle_item(&mut done, stretch);
        toggle_item(&mut done, journal);
        assert_eq!(done, vec![stretch, journal]);
    }

    #[test]
    fn progress_ignores_deleted_items() {
        let routine = Uuid::new_v4();
        let items = vec![item(routine, "Stretch", 0), item(routine, "Journal", 1)];
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let stale = Uuid::new_v4();
        let progress = RoutineProgress::new(routine, date, &items, &[stale, items[1].id]);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 2);
        assert_eq!(progress.completed_item_ids, vec![items[1].id]);
        assert!(!progress.is_complete());

        let all = RoutineProgress::new(routine, date, &items, &[items[0].id, items[1].id]);
        assert!(all.is_complete());
        assert!(!RoutineProgress::new(routine, date, &[], &[]).is_complete());
    }

    #[test]
    fn item_labels_are_checked() {
        assert_eq!(clean_items(&[" Stretch ".to_string()]).unwrap(), vec!["Stretch"]);
        assert!(clean_items(&["".to_string()]).is_err());
        assert!(clean_items(&vec!["x".to_string(); MAX_ITEMS + 1]).is_err());
    }
}
