use crate::{
    models::{
        Category, Location, ModelValidationError, NewCategory, NewLocation, NewPost, NewUser,
        Post, PostWithRelated, Slug, User,
    },
    published::PublishedFilter,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

pub type Result<T, E = RepoError> = std::result::Result<T, E>;

/// A stored row could not be turned back into a model.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Error)]
#[error("Database had invalid entry")]
pub struct DbDataError;

/// RepoError
///
/// Failures surfaced by a [`Repository`]. Storage faults (`Sqlx`) are passed through untouched;
/// the remaining variants are integrity rules the repository enforces on writes.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("A category with slug `{0}` already exists")]
    DuplicateSlug(Slug),
    #[error("Referenced record does not exist: {0}")]
    InvalidReference(String),
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Data(#[from] DbDataError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The storage contract the views are written against. Write operations enforce the
/// referential rules of the content model:
///
/// - deleting a user deletes that user's posts,
/// - deleting a location or a category leaves its posts in place with the reference cleared,
/// - category slugs are unique.
///
/// Read operations come in two kinds: plain lookups that ignore visibility (`get_post`,
/// `get_category_by_slug`) and the two visibility queries driven by a [`PublishedFilter`].
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: NewUser) -> Result<User>;
    /// Deletes the user together with every post they authored.
    async fn delete_user(&self, id: i64) -> Result<bool>;

    // --- Categories ---
    /// Fails with [`RepoError::DuplicateSlug`] when the slug is taken.
    async fn create_category(&self, category: NewCategory) -> Result<Category>;
    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>>;
    async fn set_category_published(&self, id: i64, is_published: bool)
    -> Result<Option<Category>>;
    /// Deletes the category; its posts keep existing with `category_id = None`.
    async fn delete_category(&self, id: i64) -> Result<bool>;

    // --- Locations ---
    async fn create_location(&self, location: NewLocation) -> Result<Location>;
    /// Deletes the location; its posts keep existing with `location_id = None`.
    async fn delete_location(&self, id: i64) -> Result<bool>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> Result<Post>;
    /// Any stored post, visible or not.
    async fn get_post(&self, id: i64) -> Result<Option<Post>>;
    async fn set_post_published(&self, id: i64, is_published: bool) -> Result<Option<Post>>;
    async fn delete_post(&self, id: i64) -> Result<bool>;

    // --- Visibility Queries ---
    /// Posts admitted by `filter`, ordered by `pub_date` ascending.
    async fn visible_posts(&self, filter: &PublishedFilter) -> Result<Vec<Post>>;
    /// Same rows as [`Repository::visible_posts`], with author, location and category
    /// resolved in the same round trip.
    async fn visible_posts_with_related(
        &self,
        filter: &PublishedFilter,
    ) -> Result<Vec<PostWithRelated>>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;
