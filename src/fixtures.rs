//! JSON fixtures.
//!
//! A fixture names its records instead of numbering them: posts point at their author by
//! username, their location by name and their category by slug. Loading resolves those names
//! to the ids the repository assigns.
//!
//! ```json
//! {
//!   "users": [{ "username": "robinson" }],
//!   "categories": [{ "title": "Travel", "description": "Voyages", "slug": "travel" }],
//!   "locations": [{ "name": "Island of Despair" }],
//!   "posts": [{
//!     "title": "Shipwreck", "text": "...", "pub_date": "1659-09-30T00:00:00Z",
//!     "author": "robinson", "location": "Island of Despair", "category": "travel"
//!   }]
//! }
//! ```

use crate::{
    models::{ModelValidationError, NewCategory, NewLocation, NewPost, NewUser, Slug},
    repository::{RepoError, Repository},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Could not read fixture file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Fixture is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Post `{post}` references unknown {kind} `{key}`")]
    UnknownReference {
        post: String,
        kind: &'static str,
        key: String,
    },
    #[error("Fixture declares {kind} `{key}` more than once")]
    Duplicate { kind: &'static str, key: String },
    #[error("Invalid fixture record: {0}")]
    Invalid(#[from] ModelValidationError),
    #[error(transparent)]
    Repository(#[from] RepoError),
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<NewUser>,
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub locations: Vec<NewLocation>,
    #[serde(default)]
    pub posts: Vec<FixturePost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixturePost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<Slug>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

/// How many records of each kind a fixture inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub users: usize,
    pub categories: usize,
    pub locations: usize,
    pub posts: usize,
}

impl Fixture {
    pub async fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// check
    ///
    /// Everything that could make a load fail halfway is checked here, before the first
    /// insert: field rules on every record, names and slugs declared twice, and post
    /// references to names the fixture does not declare.
    pub fn check(&self) -> Result<(), FixtureError> {
        let mut usernames = HashSet::new();
        for user in &self.users {
            user.validate()?;
            if !usernames.insert(user.username.as_str()) {
                return Err(FixtureError::Duplicate {
                    kind: "user",
                    key: user.username.clone(),
                });
            }
        }

        let mut slugs = HashSet::new();
        for category in &self.categories {
            category.validate()?;
            if !slugs.insert(&category.slug) {
                return Err(FixtureError::Duplicate {
                    kind: "category",
                    key: category.slug.to_string(),
                });
            }
        }

        let mut locations = HashSet::new();
        for location in &self.locations {
            location.validate()?;
            if !locations.insert(location.name.as_str()) {
                return Err(FixtureError::Duplicate {
                    kind: "location",
                    key: location.name.clone(),
                });
            }
        }

        for post in &self.posts {
            // Author id is resolved on load; only the text fields are checked here.
            NewPost::new(post.title.as_str(), post.text.as_str(), post.pub_date, 0).validate()?;

            let unknown = |kind: &'static str, key: &str| FixtureError::UnknownReference {
                post: post.title.clone(),
                kind,
                key: key.to_owned(),
            };

            if !usernames.contains(post.author.as_str()) {
                return Err(unknown("user", &post.author));
            }
            if let Some(location) = &post.location
                && !locations.contains(location.as_str())
            {
                return Err(unknown("location", location));
            }
            if let Some(slug) = &post.category
                && !slugs.contains(slug)
            {
                return Err(unknown("category", slug.as_str()));
            }
        }
        Ok(())
    }

    /// load_into
    ///
    /// Inserts users, categories, locations and then posts, in fixture order. A fixture that
    /// fails [`Fixture::check`] inserts nothing; a storage error can still stop the load
    /// partway.
    pub async fn load_into(self, repo: &dyn Repository) -> Result<LoadSummary, FixtureError> {
        self.check()?;
        let mut summary = LoadSummary::default();

        let mut user_ids = HashMap::new();
        for user in self.users {
            let user = repo.create_user(user).await?;
            user_ids.insert(user.username, user.id);
            summary.users += 1;
        }

        let mut category_ids = HashMap::new();
        for category in self.categories {
            let category = repo.create_category(category).await?;
            category_ids.insert(category.slug, category.id);
            summary.categories += 1;
        }

        let mut location_ids = HashMap::new();
        for location in self.locations {
            let location = repo.create_location(location).await?;
            location_ids.insert(location.name, location.id);
            summary.locations += 1;
        }

        for post in self.posts {
            let unknown = |kind: &'static str, key: &str| FixtureError::UnknownReference {
                post: post.title.clone(),
                kind,
                key: key.to_owned(),
            };

            let author_id = *user_ids
                .get(&post.author)
                .ok_or_else(|| unknown("user", &post.author))?;
            let location_id = match &post.location {
                Some(name) => Some(
                    *location_ids
                        .get(name)
                        .ok_or_else(|| unknown("location", name))?,
                ),
                None => None,
            };
            let category_id = match &post.category {
                Some(slug) => Some(
                    *category_ids
                        .get(slug)
                        .ok_or_else(|| unknown("category", slug.as_str()))?,
                ),
                None => None,
            };

            let mut new_post = NewPost::new(post.title, post.text, post.pub_date, author_id)
                .published(post.is_published);
            new_post.location_id = location_id;
            new_post.category_id = category_id;
            repo.create_post(new_post).await?;
            summary.posts += 1;
        }

        info!(?summary, "Fixture loaded");
        Ok(summary)
    }
}
