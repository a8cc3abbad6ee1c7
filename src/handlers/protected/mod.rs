// handlers/protected/mod.rs - Handlers behind the bearer-token gate
//
// Route prefixes: /api/*, /functions/*
// Middleware: jwt_auth_middleware -> ensure_profile_middleware
// Every handler receives the caller as `Extension<AuthUser>` and scopes its
// service call to that user.
pub mod dogs;
pub mod events;
pub mod groups;
pub mod notes;
pub mod partners;
pub mod photos;
pub mod profile;
pub mod push;
pub mod recipes;
pub mod routines;
pub mod shopping;
pub mod todos;
pub mod topics;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

/// `?date=YYYY-MM-DD`, defaulting to today (UTC)
#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

impl DayQuery {
    pub fn day(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}
