use serde::Serialize;
use sqlx::PgPool;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::recipe::{Recipe, RecipeDetail, RecipeIngredient};
use crate::database::DatabaseError;

use super::{ServiceError, ServiceResult};

const RECIPE_COLUMNS: &str = "id, name, description, instructions, image_path, created_at";

/// A recipe ranked against the pantry
#[derive(Debug, Clone, Serialize)]
pub struct RecipeMatch {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    /// Share of the recipe's ingredients already in the pantry, 0.0..=1.0
    pub score: f64,
}

/// Trim, lowercase and collapse inner whitespace
pub fn normalize_ingredient(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Rank recipes sharing at least one ingredient with the pantry: best coverage first,
/// then most matches, then name.
pub fn rank_recipes<'a, I>(recipes: Vec<Recipe>, ingredients: &HashMap<Uuid, Vec<String>>, pantry: I) -> Vec<RecipeMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let pantry: BTreeSet<String> = pantry
        .into_iter()
        .map(normalize_ingredient)
        .filter(|i| !i.is_empty())
        .collect();

    let mut ranked: Vec<RecipeMatch> = recipes
        .into_iter()
        .filter_map(|recipe| {
            let wanted: BTreeSet<String> = ingredients
                .get(&recipe.id)?
                .iter()
                .map(|i| normalize_ingredient(i))
                .filter(|i| !i.is_empty())
                .collect();
            let (matched, missing): (Vec<String>, Vec<String>) =
                wanted.iter().cloned().partition(|i| pantry.contains(i));
            if matched.is_empty() {
                return None;
            }
            let score = matched.len() as f64 / wanted.len() as f64;
            Some(RecipeMatch {
                recipe,
                matched,
                missing,
                score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.matched.len().cmp(&a.matched.len()))
            .then_with(|| a.recipe.name.to_lowercase().cmp(&b.recipe.name.to_lowercase()))
    });
    ranked
}

pub struct RecipeService {
    pool: PgPool,
}

impl RecipeService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self::with_pool(DatabaseManager::pool().await?))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn catalog(&self) -> ServiceResult<Vec<Recipe>> {
        let sql = format!("SELECT {} FROM recipes ORDER BY lower(name)", RECIPE_COLUMNS);
        Ok(sqlx::query_as::<_, Recipe>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn detail(&self, recipe_id: Uuid) -> ServiceResult<RecipeDetail> {
        let sql = format!("SELECT {} FROM recipes WHERE id = $1", RECIPE_COLUMNS);
        let recipe = sqlx::query_as::<_, Recipe>(&sql)
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".to_string()))?;
        let ingredients: Vec<String> =
            sqlx::query_scalar("SELECT ingredient FROM recipe_ingredients WHERE recipe_id = $1 ORDER BY ingredient")
                .bind(recipe_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(RecipeDetail { recipe, ingredients })
    }

    pub async fn pantry(&self, user_id: Uuid) -> ServiceResult<Vec<String>> {
        let items: Vec<String> =
            sqlx::query_scalar("SELECT ingredient FROM user_ingredients WHERE user_id = $1 ORDER BY ingredient")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    /// Adding an ingredient already in the pantry is a no-op
    pub async fn add_to_pantry(&self, user_id: Uuid, ingredient: &str) -> ServiceResult<String> {
        let ingredient = normalize_ingredient(ingredient);
        if ingredient.is_empty() || ingredient.chars().count() > 100 {
            return Err(ServiceError::invalid("ingredient", "must be 1-100 characters"));
        }
        sqlx::query(
            "INSERT INTO user_ingredients (user_id, ingredient) VALUES ($1, $2)
             ON CONFLICT (user_id, ingredient) DO NOTHING",
        )
        .bind(user_id)
        .bind(&ingredient)
        .execute(&self.pool)
        .await?;
        Ok(ingredient)
    }

    pub async fn remove_from_pantry(&self, user_id: Uuid, ingredient: &str) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM user_ingredients WHERE user_id = $1 AND ingredient = $2")
            .bind(user_id)
            .bind(normalize_ingredient(ingredient))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Ingredient not in pantry".to_string()));
        }
        Ok(())
    }

    /// Catalog recipes ranked against the user's pantry
    pub async fn matches(&self, user_id: Uuid) -> ServiceResult<Vec<RecipeMatch>> {
        let pantry = self.pantry(user_id).await?;
        if pantry.is_empty() {
            return Ok(Vec::new());
        }
        let recipes = self.catalog().await?;
        let rows = sqlx::query_as::<_, RecipeIngredient>("SELECT recipe_id, ingredient FROM recipe_ingredients")
            .fetch_all(&self.pool)
            .await?;

        let mut ingredients: HashMap<Uuid, Vec<String>> = HashMap::new();
        for row in rows {
            ingredients.entry(row.recipe_id).or_default().push(row.ingredient);
        }
        Ok(rank_recipes(recipes, &ingredients, pantry.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recipe(name: &str) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            instructions: None,
            image_path: None,
            created_at: Utc::now(),
        }
    }

    fn book(entries: &[(&Recipe, &[&str])]) -> HashMap<Uuid, Vec<String>> {
        entries
            .iter()
            .map(|(r, items)| (r.id, items.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn names(ranked: &[RecipeMatch]) -> Vec<&str> {
        ranked.iter().map(|m| m.recipe.name.as_str()).collect()
    }

    #[test]
    fn normalization_collapses_case_and_spacing() {
        assert_eq!(normalize_ingredient("  Olive   OIL "), "olive oil");
        assert_eq!(normalize_ingredient("   "), "");
    }

    #[test]
    fn ranks_by_coverage_then_matches_then_name() {
        let omelette = recipe("Omelette");
        let pancakes = recipe("Pancakes");
        let salad = recipe("Salad");
        let toast = recipe("Toast");
        let soup = recipe("Soup");
        let ingredients = book(&[
            (&omelette, &["eggs", "butter"]),
            (&pancakes, &["eggs", "flour", "milk", "butter"]),
            (&salad, &["lettuce", "tomato"]),
            (&toast, &["bread", "Butter"]),
            (&soup, &["leek"]),
        ]);
        let recipes = vec![salad, pancakes, toast, omelette, soup];

        let ranked = rank_recipes(recipes, &ingredients, ["Eggs", "butter ", "flour", "bread"]);
        assert_eq!(names(&ranked), vec!["Omelette", "Toast", "Pancakes"]);
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[2].matched, vec!["butter", "eggs", "flour"]);
        assert_eq!(ranked[2].missing, vec!["milk"]);
        assert_eq!(ranked[2].score, 0.75);
    }

    #[test]
    fn equal_coverage_prefers_more_matches() {
        let big = recipe("Big");
        let small = recipe("Small");
        let ingredients = book(&[(&small, &["a", "b"]), (&big, &["a", "b", "c", "d"])]);
        let ranked = rank_recipes(vec![small, big], &ingredients, ["a", "c"]);
        // small: 1/2, big: 2/4
        assert_eq!(names(&ranked), vec!["Big", "Small"]);
    }

    #[test]
    fn recipes_without_overlap_or_ingredients_are_dropped() {
        let bare = recipe("Bare");
        let other = recipe("Other");
        let ingredients = book(&[(&other, &["rice"])]);
        assert!(rank_recipes(vec![bare, other], &ingredients, ["pasta"]).is_empty());
    }
}
