use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::dog::{CreateDog, Dog, DogMeal, ToggleMeal, UpdateDog};
use crate::database::DatabaseError;

use super::{load_viewer, required_text, ServiceError, ServiceResult};

pub const MAX_MEALS_PER_DAY: i32 = 6;

const DOG_COLUMNS: &str = "id, owner_id, name, meals_per_day, meal_labels, created_at, updated_at";
const MEAL_COLUMNS: &str = "dog_id, meal_date, meal_index, completed_by, completed_at";

/// One meal of one day as the feeding tile shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealSlot {
    pub index: i32,
    pub label: String,
    pub completed: bool,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealDay {
    pub dog_id: Uuid,
    pub date: NaiveDate,
    pub meals: Vec<MealSlot>,
}

fn check_meals_per_day(meals_per_day: i32) -> ServiceResult<()> {
    if !(1..=MAX_MEALS_PER_DAY).contains(&meals_per_day) {
        return Err(ServiceError::invalid(
            "meals_per_day",
            format!("must be between 1 and {}", MAX_MEALS_PER_DAY),
        ));
    }
    Ok(())
}

fn clean_labels(labels: &[String], meals_per_day: i32) -> ServiceResult<Vec<String>> {
    if labels.len() > meals_per_day as usize {
        return Err(ServiceError::invalid("meal_labels", "more labels than meals per day"));
    }
    labels.iter().map(|l| required_text("meal_labels", l, 40)).collect()
}

pub fn check_meal_index(dog: &Dog, meal_index: i32) -> ServiceResult<()> {
    if meal_index < 0 || meal_index >= dog.meals_per_day {
        return Err(ServiceError::invalid(
            "meal_index",
            format!("must be between 0 and {}", dog.meals_per_day - 1),
        ));
    }
    Ok(())
}

/// Label for meal `index`, "Meal N" when none was configured
fn meal_label(dog: &Dog, index: i32) -> String {
    dog.meal_labels
        .get(index as usize)
        .cloned()
        .unwrap_or_else(|| format!("Meal {}", index + 1))
}

/// Lay out every meal of the day, marking the ones with a completion row.
/// Rows for indices beyond `meals_per_day` (left over after lowering it) are ignored.
pub fn meal_slots(dog: &Dog, done: &[DogMeal]) -> Vec<MealSlot> {
    (0..dog.meals_per_day)
        .map(|index| {
            let row = done.iter().find(|m| m.meal_index == index);
            MealSlot {
                index,
                label: meal_label(dog, index),
                completed: row.is_some(),
                completed_by: row.map(|m| m.completed_by),
                completed_at: row.map(|m| m.completed_at),
            }
        })
        .collect()
}

/// What toggling a meal does given the day's completion rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealToggle {
    Clear,
    Record,
}

pub fn meal_toggle(done: &[DogMeal], meal_index: i32) -> MealToggle {
    if done.iter().any(|m| m.meal_index == meal_index) {
        MealToggle::Clear
    } else {
        MealToggle::Record
    }
}

pub struct DogService {
    pool: PgPool,
}

impl DogService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The user's dogs and their partners' dogs
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Dog>> {
        let viewer = load_viewer(&self.pool, user_id).await?;
        let sql = format!("SELECT {} FROM dogs WHERE owner_id = ANY($1) ORDER BY created_at", DOG_COLUMNS);
        let dogs = sqlx::query_as::<_, Dog>(&sql)
            .bind(viewer.circle())
            .fetch_all(&self.pool)
            .await?;
        Ok(dogs)
    }

    pub async fn create(&self, user_id: Uuid, input: CreateDog) -> ServiceResult<Dog> {
        let name = required_text("name", &input.name, 60)?;
        check_meals_per_day(input.meals_per_day)?;
        let labels = clean_labels(&input.meal_labels, input.meals_per_day)?;

        let sql = format!(
            "INSERT INTO dogs (id, owner_id, name, meals_per_day, meal_labels)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            DOG_COLUMNS
        );
        let dog = sqlx::query_as::<_, Dog>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name)
            .bind(input.meals_per_day)
            .bind(labels)
            .fetch_one(&self.pool)
            .await?;
        Ok(dog)
    }

    pub async fn update(&self, user_id: Uuid, dog_id: Uuid, input: UpdateDog) -> ServiceResult<Dog> {
        let dog = self.owned(user_id, dog_id).await?;
        let name = input.name.as_deref().map(|n| required_text("name", n, 60)).transpose()?;
        let meals_per_day = input.meals_per_day.unwrap_or(dog.meals_per_day);
        check_meals_per_day(meals_per_day)?;
        let labels = clean_labels(input.meal_labels.as_ref().unwrap_or(&dog.meal_labels), meals_per_day)?;

        let sql = format!(
            "UPDATE dogs
             SET name = COALESCE($2, name), meals_per_day = $3, meal_labels = $4, updated_at = now()
             WHERE id = $1
             RETURNING {}",
            DOG_COLUMNS
        );
        let dog = sqlx::query_as::<_, Dog>(&sql)
            .bind(dog_id)
            .bind(name)
            .bind(meals_per_day)
            .bind(labels)
            .fetch_one(&self.pool)
            .await?;
        Ok(dog)
    }

    pub async fn delete(&self, user_id: Uuid, dog_id: Uuid) -> ServiceResult<()> {
        self.owned(user_id, dog_id).await?;
        sqlx::query("DELETE FROM dogs WHERE id = $1")
            .bind(dog_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn meals_for(&self, user_id: Uuid, dog_id: Uuid, date: NaiveDate) -> ServiceResult<MealDay> {
        let dog = self.visible(user_id, dog_id).await?;
        self.meal_day(&dog, date).await
    }

    /// Flip one meal: an existing completion is removed, otherwise one is recorded
    pub async fn toggle_meal(&self, user_id: Uuid, dog_id: Uuid, input: ToggleMeal) -> ServiceResult<MealDay> {
        let dog = self.visible(user_id, dog_id).await?;
        check_meal_index(&dog, input.meal_index)?;

        let mut tx = self.pool.begin().await?;
        // Serialize toggles of the same dog so two taps cannot both record
        sqlx::query("SELECT id FROM dogs WHERE id = $1 FOR UPDATE")
            .bind(dog_id)
            .execute(&mut *tx)
            .await?;
        let sql = format!(
            "SELECT {} FROM dog_meals WHERE dog_id = $1 AND meal_date = $2",
            MEAL_COLUMNS
        );
        let done = sqlx::query_as::<_, DogMeal>(&sql)
            .bind(dog_id)
            .bind(input.date)
            .fetch_all(&mut *tx)
            .await?;

        match meal_toggle(&done, input.meal_index) {
            MealToggle::Clear => {
                sqlx::query("DELETE FROM dog_meals WHERE dog_id = $1 AND meal_date = $2 AND meal_index = $3")
                    .bind(dog_id)
                    .bind(input.date)
                    .bind(input.meal_index)
                    .execute(&mut *tx)
                    .await?;
            }
            MealToggle::Record => {
                sqlx::query(
                    "INSERT INTO dog_meals (dog_id, meal_date, meal_index, completed_by) VALUES ($1, $2, $3, $4)
                     ON CONFLICT (dog_id, meal_date, meal_index) DO NOTHING",
                )
                .bind(dog_id)
                .bind(input.date)
                .bind(input.meal_index)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        debug!("Toggled meal {} of dog {} on {}", input.meal_index, dog_id, input.date);

        self.meal_day(&dog, input.date).await
    }

    async fn meal_day(&self, dog: &Dog, date: NaiveDate) -> ServiceResult<MealDay> {
        let sql = format!(
            "SELECT {} FROM dog_meals WHERE dog_id = $1 AND meal_date = $2 ORDER BY meal_index",
            MEAL_COLUMNS
        );
        let done = sqlx::query_as::<_, DogMeal>(&sql)
            .bind(dog.id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(MealDay {
            dog_id: dog.id,
            date,
            meals: meal_slots(dog, &done),
        })
    }

    async fn fetch(&self, dog_id: Uuid) -> ServiceResult<Dog> {
        let sql = format!("SELECT {} FROM dogs WHERE id = $1", DOG_COLUMNS);
        sqlx::query_as::<_, Dog>(&sql)
            .bind(dog_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Dog not found".to_string()))
    }

    /// Owners and their partners feed the dog
    async fn visible(&self, user_id: Uuid, dog_id: Uuid) -> ServiceResult<Dog> {
        let dog = self.fetch(dog_id).await?;
        if dog.owner_id == user_id || load_viewer(&self.pool, user_id).await?.is_partner(dog.owner_id) {
            Ok(dog)
        } else {
            Err(ServiceError::NotFound("Dog not found".to_string()))
        }
    }

    async fn owned(&self, user_id: Uuid, dog_id: Uuid) -> ServiceResult<Dog> {
        let dog = self.visible(user_id, dog_id).await?;
        if dog.owner_id != user_id {
            return Err(ServiceError::Forbidden("Only the owner can change this dog".to_string()));
        }
        Ok(dog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog(meals_per_day: i32, labels: &[&str]) -> Dog {
        Dog {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Biscuit".to_string(),
            meals_per_day,
            meal_labels: labels.iter().map(|l| l.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn meal(dog: &Dog, index: i32) -> DogMeal {
        DogMeal {
            dog_id: dog.id,
            meal_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            meal_index: index,
            completed_by: dog.owner_id,
            completed_at: Utc::now(),
        }
    }

    /// Apply `meal_toggle`'s decision the way the delete or insert does
    fn toggle(done: &mut Vec<DogMeal>, dog: &Dog, index: i32) {
        match meal_toggle(done, index) {
            MealToggle::Clear => done.retain(|m| m.meal_index != index),
            MealToggle::Record => done.push(meal(dog, index)),
        }
    }

    #[test]
    fn slots_cover_every_meal_with_labels() {
        let d = dog(3, &["Breakfast", "Dinner"]);
        let slots = meal_slots(&d, &[meal(&d, 1)]);
        let labels: Vec<_> = slots.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Breakfast", "Dinner", "Meal 3"]);
        let completed: Vec<_> = slots.iter().map(|s| s.completed).collect();
        assert_eq!(completed, vec![false, true, false]);
        assert_eq!(slots[1].completed_by, Some(d.owner_id));
    }

    #[test]
    fn toggling_twice_restores_state() {
        let d = dog(2, &[]);
        let mut done = vec![meal(&d, 0)];
        let before = meal_slots(&d, &done);

        toggle(&mut done, &d, 1);
        assert!(meal_slots(&d, &done)[1].completed);
        toggle(&mut done, &d, 1);
        assert_eq!(meal_slots(&d, &done), before);

        toggle(&mut done, &d, 0);
        assert!(!meal_slots(&d, &done)[0].completed);
    }

    #[test]
    fn toggle_clears_recorded_meals_and_records_missing_ones() {
        let d = dog(3, &[]);
        let done = vec![meal(&d, 0), meal(&d, 2)];
        assert_eq!(meal_toggle(&done, 0), MealToggle::Clear);
        assert_eq!(meal_toggle(&done, 1), MealToggle::Record);
        assert_eq!(meal_toggle(&done, 2), MealToggle::Clear);
        assert_eq!(meal_toggle(&[], 0), MealToggle::Record);
    }

    #[test]
    fn meal_index_must_be_below_meals_per_day() {
        let d = dog(2, &[]);
        assert!(check_meal_index(&d, 0).is_ok());
        assert!(check_meal_index(&d, 1).is_ok());
        assert!(check_meal_index(&d, 2).is_err());
        assert!(check_meal_index(&d, -1).is_err());
    }

    #[test]
    fn leftover_rows_beyond_meal_count_are_ignored() {
        let d = dog(1, &[]);
        let slots = meal_slots(&d, &[meal(&d, 0), meal(&d, 3)]);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].completed);
    }

    #[test]
    fn meals_per_day_and_labels_are_bounded() {
        assert!(check_meals_per_day(1).is_ok());
        assert!(check_meals_per_day(6).is_ok());
        assert!(check_meals_per_day(0).is_err());
        assert!(check_meals_per_day(7).is_err());

        let labels = vec!["AM".to_string(), "PM".to_string()];
        assert_eq!(clean_labels(&labels, 2).unwrap(), labels);
        assert!(clean_labels(&labels, 1).is_err());
        assert!(clean_labels(&[" ".to_string()], 1).is_err());
    }
}
