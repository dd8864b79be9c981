use super::{DbDataError, RepoError, Repository, Result};
use crate::{
    models::{
        Category, Location, NewCategory, NewLocation, NewPost, NewUser, Post, PostWithRelated,
        Published, Slug, User,
    },
    published::PublishedFilter,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    posts: BTreeMap<i64, Post>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn visible(&self, filter: &PublishedFilter) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .values()
            .filter(|post| {
                let category = post.category_id.and_then(|id| self.categories.get(&id));
                filter.admits(post, category)
            })
            .cloned()
            .collect();
        filter.arrange(&mut posts);
        posts
    }

    fn resolve(&self, post: Post) -> Result<PostWithRelated> {
        let author = self
            .users
            .get(&post.author_id)
            .cloned()
            .ok_or(DbDataError)?;
        let location = post
            .location_id
            .map(|id| self.locations.get(&id).cloned().ok_or(DbDataError))
            .transpose()?;
        let category = post
            .category_id
            .map(|id| self.categories.get(&id).cloned().ok_or(DbDataError))
            .transpose()?;

        Ok(PostWithRelated::from_parts(post, author, location, category))
    }

    fn check_references(&self, post: &NewPost) -> Result<()> {
        if !self.users.contains_key(&post.author_id) {
            return Err(RepoError::InvalidReference(format!(
                "user {}",
                post.author_id
            )));
        }
        if let Some(id) = post.location_id
            && !self.locations.contains_key(&id)
        {
            return Err(RepoError::InvalidReference(format!("location {id}")));
        }
        if let Some(id) = post.category_id
            && !self.categories.contains_key(&id)
        {
            return Err(RepoError::InvalidReference(format!("category {id}")));
        }
        Ok(())
    }
}

/// InMemoryRepository
///
/// A [`Repository`] kept entirely in process memory behind an async `RwLock`.
/// Used when no `DATABASE_URL` is configured and as the backend of the test suite.
/// Data is lost on restart.
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let user = User {
            id,
            username: user.username,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.posts.retain(|_, post| post.author_id != id);
        Ok(true)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        category.validate()?;
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.slug == category.slug) {
            return Err(RepoError::DuplicateSlug(category.slug));
        }

        let id = tables.next_id();
        let category = Category {
            id,
            title: category.title,
            description: category.description,
            slug: category.slug,
            published: Published::new(category.is_published, Utc::now()),
        };
        tables.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| &c.slug == slug).cloned())
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>> {
        let mut tables = self.tables.write().await;
        Ok(tables.categories.get_mut(&id).map(|category| {
            category.published.is_published = is_published;
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(true)
    }

    async fn create_location(&self, location: NewLocation) -> Result<Location> {
        location.validate()?;
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let location = Location {
            id,
            name: location.name,
            published: Published::new(location.is_published, Utc::now()),
        };
        tables.locations.insert(id, location.clone());
        Ok(location)
    }

    async fn delete_location(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.locations.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(true)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        post.validate()?;
        let mut tables = self.tables.write().await;
        tables.check_references(&post)?;

        let id = tables.next_id();
        let post = Post {
            id,
            title: post.title,
            text: post.text,
            pub_date: post.pub_date,
            author_id: post.author_id,
            location_id: post.location_id,
            category_id: post.category_id,
            published: Published::new(post.is_published, Utc::now()),
        };
        tables.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).cloned())
    }

    async fn set_post_published(&self, id: i64, is_published: bool) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.get_mut(&id).map(|post| {
            post.published.is_published = is_published;
            post.clone()
        }))
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.remove(&id).is_some())
    }

    async fn visible_posts(&self, filter: &PublishedFilter) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.visible(filter))
    }

    async fn visible_posts_with_related(
        &self,
        filter: &PublishedFilter,
    ) -> Result<Vec<PostWithRelated>> {
        // One read guard for both the filter pass and the lookups.
        let tables = self.tables.read().await;
        tables
            .visible(filter)
            .into_iter()
            .map(|post| tables.resolve(post))
            .collect()
    }
}
