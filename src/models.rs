use chrono::{DateTime, Utc};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, Unexpected},
};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

pub const TITLE_MAX_LEN: usize = 256;
pub const SLUG_MAX_LEN: usize = 50;
pub const USERNAME_MAX_LEN: usize = 150;

/// ModelValidationError
///
/// Raised when a creation input breaks one of the field rules (length, emptiness, slug charset).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    #[error("Field `{0}` must not be empty")]
    Empty(&'static str),
    #[error("Field `{field}` must be at most {max} characters long")]
    TooLong { field: &'static str, max: usize },
    #[error("Invalid slug {0:?}: only latin letters, digits, hyphens and underscores are allowed")]
    InvalidSlug(String),
}

fn check_text(
    field: &'static str,
    value: &str,
    max: Option<usize>,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::Empty(field));
    }
    match max {
        Some(max) if value.chars().count() > max => {
            Err(ModelValidationError::TooLong { field, max })
        }
        _ => Ok(()),
    }
}

fn default_published() -> bool {
    true
}

// --- Shared Visibility Fields ---

/// Published
///
/// The visibility pair embedded into every content entity. `is_published` is the manual
/// toggle; `created_at` is stamped by the repository on insert and never rewritten.
/// Flattened into the owning entity both in JSON and in database rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Published {
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Published {
    pub fn new(is_published: bool, created_at: DateTime<Utc>) -> Self {
        Self {
            is_published,
            created_at,
        }
    }
}

// --- Slug ---

/// Slug
///
/// URL-safe unique identifier of a category. Construction is validated, so any `Slug`
/// value holds 1 to 50 characters from `[A-Za-z0-9_-]`. Serialized as a plain string; in
/// TypeScript bindings fields of this type are declared `string`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn new(slug: impl Into<String>) -> Result<Self, ModelValidationError> {
        let slug = slug.into();
        let valid_charset = slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if slug.is_empty() || !valid_charset {
            return Err(ModelValidationError::InvalidSlug(slug));
        }
        if slug.chars().count() > SLUG_MAX_LEN {
            return Err(ModelValidationError::TooLong {
                field: "slug",
                max: SLUG_MAX_LEN,
            });
        }
        Ok(Self(slug))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for Slug {
    type Err = ModelValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Slug::new(inner.clone())
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(&inner), &"a slug"))
    }
}

// --- Core Entities (Mapped to Database) ---

/// User
///
/// The author identity. Accounts are managed outside this service; only the fields needed
/// to render a post byline are kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    #[ts(type = "number")]
    pub id: i64,
    pub username: String,
}

/// Category
///
/// Thematic grouping of posts, addressed publicly by its `slug`.
/// An unpublished category hides itself and every post linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Category {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub slug: Slug,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub published: Published,
}

/// Location
///
/// A named place a post can be attached to. Its own `is_published` flag is kept for
/// editors; it does not affect whether the posts pointing at it are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Location {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub published: Published,
}

/// Post
///
/// A blog entry with plain references to its author, location and category.
/// `pub_date` may lie in the future to schedule a delayed publication; whether a post is
/// visible is never stored, it is computed by [`crate::published`] at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Post {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[ts(type = "number")]
    pub author_id: i64,
    #[ts(type = "number | null")]
    pub location_id: Option<i64>,
    #[ts(type = "number | null")]
    pub category_id: Option<i64>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub published: Published,
}

/// PostWithRelated
///
/// A post with its author, location and category resolved into full records.
/// Produced by the eager-loading visibility query; this is what the views render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostWithRelated {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub author: User,
    pub location: Option<Location>,
    pub category: Option<Category>,
    #[serde(flatten)]
    pub published: Published,
}

impl PostWithRelated {
    /// Attaches resolved related records to a post. The caller is responsible for passing
    /// the records the post's references point at.
    pub fn from_parts(
        post: Post,
        author: User,
        location: Option<Location>,
        category: Option<Category>,
    ) -> Self {
        Self {
            id: post.id,
            title: post.title,
            text: post.text,
            pub_date: post.pub_date,
            author,
            location,
            category,
            published: post.published,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl fmt::Display for PostWithRelated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

// --- Creation Inputs ---

/// NewUser
///
/// Insert payload for an author. Only the username is supplied; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_text("username", &self.username, Some(USERNAME_MAX_LEN))
    }
}

/// NewCategory
///
/// Insert payload for a category. `is_published` defaults to `true` when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub title: String,
    pub description: String,
    pub slug: Slug,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl NewCategory {
    pub fn new(title: impl Into<String>, description: impl Into<String>, slug: Slug) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            slug,
            is_published: true,
        }
    }

    #[must_use]
    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_text("title", &self.title, Some(TITLE_MAX_LEN))?;
        check_text("description", &self.description, None)
    }
}

/// Insert payload for a location. `is_published` defaults to `true` when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl NewLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_published: true,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_text("name", &self.name, Some(TITLE_MAX_LEN))
    }
}

/// NewPost
///
/// Insert payload for a post. Location and category are optional references;
/// the builder-style setters keep call sites short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl NewPost {
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        pub_date: DateTime<Utc>,
        author_id: i64,
    ) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            pub_date,
            author_id,
            location_id: None,
            category_id: None,
            is_published: true,
        }
    }

    #[must_use]
    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn location(mut self, location_id: i64) -> Self {
        self.location_id = Some(location_id);
        self
    }

    #[must_use]
    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_text("title", &self.title, Some(TITLE_MAX_LEN))?;
        check_text("text", &self.text, None)
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, Post, PostWithRelated, User};
    use ts_rs::TS;

    #[test]
    fn bindings_declare_json_numbers_and_string_slugs() {
        let category = Category::decl();
        assert!(category.contains("id: number"), "{category}");
        assert!(category.contains("slug: string"), "{category}");

        let post = Post::decl();
        assert!(post.contains("author_id: number"), "{post}");
        assert!(post.contains("location_id: number | null"), "{post}");
        assert!(post.contains("category_id: number | null"), "{post}");

        for decl in [User::decl(), category, post, PostWithRelated::decl()] {
            assert!(!decl.contains("bigint"), "{decl}");
        }
    }
}
