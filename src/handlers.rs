use crate::{
    AppState,
    error::ViewError,
    models::{Category, PostWithRelated, Slug},
    published::PublishedFilter,
};
use axum::{
    Json,
    extract::{FromRequestParts, Path, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

/// Number of posts shown on the front page.
pub const INDEX_POSTS_COUNT: usize = 5;

// --- Path Extractors ---

/// CategoryPath
///
/// `/category/{category_slug}`. The slug is kept raw here; a value that is not a valid slug
/// is answered the same way as an unknown one.
#[derive(Debug, Clone, Deserialize, FromRequestParts, IntoParams)]
#[from_request(via(Path), rejection(ViewError))]
#[into_params(parameter_in = Path)]
pub struct CategoryPath {
    pub category_slug: String,
}

/// PostPath
///
/// `/posts/{id}`. A non-numeric id is rejected as not found.
#[derive(Debug, Clone, Copy, Deserialize, FromRequestParts, IntoParams)]
#[from_request(via(Path), rejection(ViewError))]
#[into_params(parameter_in = Path)]
pub struct PostPath {
    pub id: i64,
}

// --- Template Contexts ---

/// IndexContext
///
/// What the front page renders: the first posts of the visible feed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexContext {
    pub post_list: Vec<PostWithRelated>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryContext {
    pub category: Category,
    pub posts: Vec<PostWithRelated>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostContext {
    pub post: PostWithRelated,
}

// --- Views ---

/// index
///
/// [Public Route] The latest feed: visible posts in `pub_date` order, cut to
/// [`INDEX_POSTS_COUNT`].
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "First visible posts", body = IndexContext))
)]
pub async fn index(State(state): State<AppState>) -> Result<Json<IndexContext>, ViewError> {
    let filter = PublishedFilter::at(Utc::now()).limit(INDEX_POSTS_COUNT);
    let post_list = state.repo.visible_posts_with_related(&filter).await?;

    debug!(count = post_list.len(), "Rendering index");
    Ok(Json(IndexContext { post_list }))
}

/// category_posts
///
/// [Public Route] A category page with all its visible posts.
///
/// An unpublished category answers exactly like a missing one: it is treated as
/// nonexistent, not as an empty page.
#[utoipa::path(
    get,
    path = "/category/{category_slug}",
    params(CategoryPath),
    responses(
        (status = 200, description = "Category and its visible posts", body = CategoryContext),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn category_posts(
    State(state): State<AppState>,
    CategoryPath { category_slug }: CategoryPath,
) -> Result<Json<CategoryContext>, ViewError> {
    let Ok(slug) = category_slug.parse::<Slug>() else {
        return Err(ViewError::CategoryNotFound(category_slug));
    };

    let category = state
        .repo
        .get_category_by_slug(&slug)
        .await?
        .filter(|category| category.published.is_published)
        .ok_or(ViewError::CategoryNotFound(category_slug))?;

    let filter = PublishedFilter::at(Utc::now()).in_category(category.id);
    let posts = state.repo.visible_posts_with_related(&filter).await?;

    debug!(slug = %category.slug, count = posts.len(), "Rendering category");
    Ok(Json(CategoryContext { category, posts }))
}

/// post_detail
///
/// [Public Route] A single post.
///
/// The id is resolved twice: once as a plain lookup, then again through the visibility
/// query. A post that exists but is unpublished, scheduled for later or filed under a
/// hidden category gets the same 404 as a missing one. There is no privileged bypass.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(PostPath),
    responses(
        (status = 200, description = "The visible post", body = PostContext),
        (status = 404, description = "Unknown or hidden post")
    )
)]
pub async fn post_detail(
    State(state): State<AppState>,
    PostPath { id }: PostPath,
) -> Result<Json<PostContext>, ViewError> {
    state
        .repo
        .get_post(id)
        .await?
        .ok_or(ViewError::PostNotFound(id))?;

    let filter = PublishedFilter::at(Utc::now()).with_id(id);
    let post = state
        .repo
        .visible_posts_with_related(&filter)
        .await?
        .into_iter()
        .next()
        .ok_or(ViewError::PostNotFound(id))?;

    Ok(Json(PostContext { post }))
}
