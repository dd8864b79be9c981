//! Visibility rules for posts.
//!
//! A post is publicly visible when all of the following hold at the moment of the query:
//! its own `is_published` flag is set, its `pub_date` is not in the future, and it is linked
//! to a category whose `is_published` flag is set. A post without a category is never
//! visible. Visibility is evaluated on read; nothing about it is stored.
//!
//! [`PublishedFilter`] describes one visibility query. Both repository backends consume it:
//! the in-memory store through [`PublishedFilter::admits`] and [`PublishedFilter::arrange`],
//! the Postgres store through [`PublishedFilter::push_sql`].

use crate::models::{Category, Post};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// is_visible
///
/// The bare visibility predicate. `category` must be the category `post.category_id`
/// points at, or `None` when the post has no category.
pub fn is_visible(post: &Post, category: Option<&Category>, now: DateTime<Utc>) -> bool {
    post.published.is_published
        && post.pub_date <= now
        && category.is_some_and(|category| category.published.is_published)
}

/// PublishedFilter
///
/// The visibility query evaluated at `now`, optionally narrowed to one category or one post
/// and truncated to the first `limit` rows of the `pub_date` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedFilter {
    pub now: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub post_id: Option<i64>,
    pub limit: Option<usize>,
}

impl PublishedFilter {
    /// All posts visible at `now`.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            category_id: None,
            post_id: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn with_id(mut self, post_id: i64) -> Self {
        self.post_id = Some(post_id);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `post` (with its linked `category`) belongs to the result set, ignoring `limit`.
    pub fn admits(&self, post: &Post, category: Option<&Category>) -> bool {
        is_visible(post, category, self.now)
            && self
                .category_id
                .is_none_or(|id| post.category_id == Some(id))
            && self.post_id.is_none_or(|id| post.id == id)
    }

    /// Sorts admitted posts by `pub_date` then id, and applies `limit`.
    pub fn arrange(&self, posts: &mut Vec<Post>) {
        posts.sort_by(|a, b| a.pub_date.cmp(&b.pub_date).then(a.id.cmp(&b.id)));
        if let Some(limit) = self.limit {
            posts.truncate(limit);
        }
    }

    /// push_sql
    ///
    /// Appends the category join, the visibility conditions, the optional narrowing
    /// conditions, the ordering and the limit to a query selecting from `posts p`.
    /// The joined category is aliased `c`, so callers may select `c.*` columns.
    pub fn push_sql<'args>(&self, builder: &mut QueryBuilder<'args, Postgres>) {
        // Inner join: a post without a category drops out here.
        builder.push(" INNER JOIN categories c ON c.id = p.category_id");
        builder.push(" WHERE p.is_published = TRUE AND p.pub_date <= ");
        builder.push_bind(self.now);
        builder.push(" AND c.is_published = TRUE");

        if let Some(category_id) = self.category_id {
            builder.push(" AND p.category_id = ");
            builder.push_bind(category_id);
        }
        if let Some(post_id) = self.post_id {
            builder.push(" AND p.id = ");
            builder.push_bind(post_id);
        }

        builder.push(" ORDER BY p.pub_date ASC, p.id ASC");

        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
    }
}
