//! Postgres-backed repository.
//!
//! Expects the tables `users`, `categories`, `locations` and `posts`, with `BIGSERIAL` ids,
//! a unique index on `categories.slug` and foreign keys from `posts` to the other three.
//! Schema creation is handled outside this crate. The referential rules on delete are applied
//! here inside a transaction, so they hold whether or not the foreign keys declare
//! `ON DELETE` actions.

use super::{DbDataError, RepoError, Repository, Result};
use crate::{
    models::{
        Category, Location, NewCategory, NewLocation, NewPost, NewUser, Post, PostWithRelated,
        Published, Slug, User,
    },
    published::PublishedFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

const POST_FIELDS: &str =
    "id, title, text, pub_date, author_id, location_id, category_id, is_published, created_at";

const CATEGORY_FIELDS: &str = "id, title, description, slug, is_published, created_at";

const VISIBLE_POSTS_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id, p.category_id,
        p.is_published, p.created_at
    FROM posts p"#;

const VISIBLE_POSTS_WITH_RELATED_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id, p.category_id,
        p.is_published, p.created_at,
        a.username AS author_username,
        l.name AS location_name,
        l.is_published AS location_is_published,
        l.created_at AS location_created_at,
        c.title AS category_title,
        c.description AS category_description,
        c.slug AS category_slug,
        c.is_published AS category_is_published,
        c.created_at AS category_created_at
    FROM posts p
    INNER JOIN users a ON a.id = p.author_id
    LEFT JOIN locations l ON l.id = p.location_id"#;

/// One row of the eager-loading query: the post columns plus the prefixed columns of its
/// author, location and category.
#[derive(Debug, FromRow)]
struct PostWithRelatedRecord {
    #[sqlx(flatten)]
    post: Post,
    author_username: String,
    location_name: Option<String>,
    location_is_published: Option<bool>,
    location_created_at: Option<DateTime<Utc>>,
    category_title: Option<String>,
    category_description: Option<String>,
    category_slug: Option<Slug>,
    category_is_published: Option<bool>,
    category_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostWithRelatedRecord> for PostWithRelated {
    type Error = DbDataError;

    fn try_from(record: PostWithRelatedRecord) -> Result<Self, Self::Error> {
        let author = User {
            id: record.post.author_id,
            username: record.author_username,
        };

        let location = match record.post.location_id {
            Some(id) => Some(Location {
                id,
                name: record.location_name.ok_or(DbDataError)?,
                published: Published::new(
                    record.location_is_published.ok_or(DbDataError)?,
                    record.location_created_at.ok_or(DbDataError)?,
                ),
            }),
            None => None,
        };

        let category = match record.post.category_id {
            Some(id) => Some(Category {
                id,
                title: record.category_title.ok_or(DbDataError)?,
                description: record.category_description.ok_or(DbDataError)?,
                slug: record.category_slug.ok_or(DbDataError)?,
                published: Published::new(
                    record.category_is_published.ok_or(DbDataError)?,
                    record.category_created_at.ok_or(DbDataError)?,
                ),
            }),
            None => None,
        };

        Ok(PostWithRelated::from_parts(
            record.post,
            author,
            location,
            category,
        ))
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// The full visibility query for [`Repository::visible_posts`].
fn visible_posts_query(filter: &PublishedFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(VISIBLE_POSTS_SELECT);
    filter.push_sql(&mut builder);
    builder
}

/// The eager-loading variant: users and locations are joined here, the category join is
/// appended by [`PublishedFilter::push_sql`].
fn visible_posts_with_related_query(
    filter: &PublishedFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(VISIBLE_POSTS_WITH_RELATED_SELECT);
    filter.push_sql(&mut builder);
    builder
}

fn reference_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepoError::InvalidReference(db.message().to_owned())
        }
        other => other.into(),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username) VALUES ($1) RETURNING id, username",
        )
        .bind(&user.username)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// delete_user
    ///
    /// Cascades to the user's posts before removing the user row.
    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed_posts = sqlx::query("DELETE FROM posts WHERE author_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;

        tracing::debug!(user_id = id, removed_posts, deleted, "Deleted user");
        Ok(deleted)
    }

    /// create_category
    ///
    /// Relies on the unique index over `slug`; a violation is reported as
    /// [`RepoError::DuplicateSlug`] rather than a raw database error.
    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        category.validate()?;
        let query = format!(
            "INSERT INTO categories (title, description, slug, is_published, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CATEGORY_FIELDS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(&category.title)
            .bind(&category.description)
            .bind(category.slug.as_str())
            .bind(category.is_published)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepoError::DuplicateSlug(category.slug.clone())
                }
                other => other.into(),
            })
    }

    async fn get_category_by_slug(&self, slug: &Slug) -> Result<Option<Category>> {
        let query = format!("SELECT {CATEGORY_FIELDS} FROM categories WHERE slug = $1");
        let category = sqlx::query_as::<_, Category>(&query)
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn set_category_published(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>> {
        let query = format!(
            "UPDATE categories SET is_published = $1 WHERE id = $2 RETURNING {CATEGORY_FIELDS}"
        );
        let category = sqlx::query_as::<_, Category>(&query)
            .bind(is_published)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE posts SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn create_location(&self, location: NewLocation) -> Result<Location> {
        location.validate()?;
        let location = sqlx::query_as::<_, Location>(
            "INSERT INTO locations (name, is_published, created_at) VALUES ($1, $2, $3) \
             RETURNING id, name, is_published, created_at",
        )
        .bind(&location.name)
        .bind(location.is_published)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(location)
    }

    async fn delete_location(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE posts SET location_id = NULL WHERE location_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        post.validate()?;
        let query = format!(
            "INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, \
             is_published, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {POST_FIELDS}"
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(&post.title)
            .bind(&post.text)
            .bind(post.pub_date)
            .bind(post.author_id)
            .bind(post.location_id)
            .bind(post.category_id)
            .bind(post.is_published)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(reference_error)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_FIELDS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn set_post_published(&self, id: i64, is_published: bool) -> Result<Option<Post>> {
        let query =
            format!("UPDATE posts SET is_published = $1 WHERE id = $2 RETURNING {POST_FIELDS}");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(is_published)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// visible_posts
    ///
    /// Composes the visibility conditions with `QueryBuilder` so every value is bound,
    /// never interpolated.
    async fn visible_posts(&self, filter: &PublishedFilter) -> Result<Vec<Post>> {
        let posts = visible_posts_query(filter)
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    /// visible_posts_with_related
    ///
    /// Same conditions as `visible_posts`, with the author, location and category columns
    /// pulled in by joins so no follow-up query per post is needed.
    async fn visible_posts_with_related(
        &self,
        filter: &PublishedFilter,
    ) -> Result<Vec<PostWithRelated>> {
        let records = visible_posts_with_related_query(filter)
            .build_query_as::<PostWithRelatedRecord>()
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(PostWithRelated::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::{PostWithRelatedRecord, visible_posts_query, visible_posts_with_related_query};
    use crate::{
        models::{Post, PostWithRelated, Published, Slug},
        published::PublishedFilter,
        repository::DbDataError,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(location_id: Option<i64>, category_id: Option<i64>) -> PostWithRelatedRecord {
        PostWithRelatedRecord {
            post: Post {
                id: 10,
                title: "Shipwreck".to_string(),
                text: "Cast ashore".to_string(),
                pub_date: now(),
                author_id: 1,
                location_id,
                category_id,
                published: Published::new(true, now()),
            },
            author_username: "robinson".to_string(),
            location_name: location_id.map(|_| "Island".to_string()),
            location_is_published: location_id.map(|_| false),
            location_created_at: location_id.map(|_| now()),
            category_title: category_id.map(|_| "Travel".to_string()),
            category_description: category_id.map(|_| "Voyages".to_string()),
            category_slug: category_id.map(|_| Slug::new("travel").unwrap()),
            category_is_published: category_id.map(|_| true),
            category_created_at: category_id.map(|_| now()),
        }
    }

    #[test]
    fn record_maps_to_post_with_related() {
        let post = PostWithRelated::try_from(record(Some(3), Some(2))).unwrap();

        assert_eq!(post.id, 10);
        assert_eq!(post.author.id, 1);
        assert_eq!(post.author.username, "robinson");

        let location = post.location.unwrap();
        assert_eq!((location.id, location.name.as_str()), (3, "Island"));
        assert!(!location.published.is_published);

        let category = post.category.unwrap();
        assert_eq!(category.id, 2);
        assert_eq!(category.slug.as_str(), "travel");
        assert!(category.published.is_published);
    }

    #[test]
    fn absent_references_map_to_none() {
        let post = PostWithRelated::try_from(record(None, Some(2))).unwrap();
        assert_eq!(post.location, None);
        assert!(post.category.is_some());
    }

    #[test]
    fn null_columns_behind_a_reference_are_rejected() {
        let mut missing_location = record(Some(3), Some(2));
        missing_location.location_name = None;
        assert_eq!(PostWithRelated::try_from(missing_location), Err(DbDataError));

        let mut missing_category = record(None, Some(2));
        missing_category.category_created_at = None;
        assert_eq!(PostWithRelated::try_from(missing_category), Err(DbDataError));
    }

    #[test]
    fn with_related_query_joins_in_order() {
        let filter = PublishedFilter::at(now()).in_category(2).limit(5);
        let builder = visible_posts_with_related_query(&filter);
        let sql = builder.sql();

        let users = sql.find("INNER JOIN users a ON a.id = p.author_id").unwrap();
        let locations = sql.find("LEFT JOIN locations l ON l.id = p.location_id").unwrap();
        let categories = sql
            .find("INNER JOIN categories c ON c.id = p.category_id")
            .unwrap();
        let filter_start = sql.find(" WHERE ").unwrap();

        assert!(users < locations);
        assert!(locations < categories);
        assert!(categories < filter_start);
        assert!(sql.contains("c.slug AS category_slug"));
        assert!(sql.ends_with("AND p.category_id = $2 ORDER BY p.pub_date ASC, p.id ASC LIMIT $3"));
    }

    #[test]
    fn both_queries_share_the_visibility_tail() {
        let filter = PublishedFilter::at(now()).with_id(7);
        let plain = visible_posts_query(&filter);
        let related = visible_posts_with_related_query(&filter);

        let tail = |sql: &str| sql[sql.find(" WHERE ").unwrap()..].to_string();
        assert_eq!(tail(plain.sql()), tail(related.sql()));
        assert!(!plain.sql().contains("JOIN users"));
    }
}
