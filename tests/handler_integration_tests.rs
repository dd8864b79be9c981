use axum::{extract::State, http::StatusCode};
use blogicum::{
    AppConfig, AppState,
    handlers::{self, CategoryPath, INDEX_POSTS_COUNT, PostPath},
    models::{NewCategory, NewPost, NewUser, Post, Slug},
    published::PublishedFilter,
    repository::{InMemoryRepository, Repository},
};
use chrono::{Duration, Utc};
use std::sync::Arc;

// --- Seeded State ---

struct Seeded {
    state: AppState,
    repo: Arc<InMemoryRepository>,
    visible: Vec<Post>,
    draft: Post,
    scheduled: Post,
    in_drafts_category: Post,
}

/// Two categories ("travel" published, "drafts" not) and a mix of visible and hidden posts.
async fn seeded() -> Seeded {
    let repo = Arc::new(InMemoryRepository::new());
    let user = repo.create_user(NewUser::new("robinson")).await.unwrap();
    let travel = repo
        .create_category(NewCategory::new("Travel", "Voyages", Slug::new("travel").unwrap()))
        .await
        .unwrap();
    let drafts = repo
        .create_category(
            NewCategory::new("Drafts", "Not yet", Slug::new("drafts").unwrap()).published(false),
        )
        .await
        .unwrap();

    let mut visible = Vec::new();
    for day in 1..=7 {
        let pub_date = Utc::now() - Duration::days(30 - day);
        let post =
            NewPost::new(format!("Day {day}"), "text", pub_date, user.id).category(travel.id);
        visible.push(repo.create_post(post).await.unwrap());
    }

    let draft = repo
        .create_post(
            NewPost::new("Draft", "text", Utc::now() - Duration::days(1), user.id)
                .category(travel.id)
                .published(false),
        )
        .await
        .unwrap();
    let scheduled = repo
        .create_post(
            NewPost::new("Tomorrow", "text", Utc::now() + Duration::days(1), user.id)
                .category(travel.id),
        )
        .await
        .unwrap();
    let in_drafts_category = repo
        .create_post(
            NewPost::new("Hidden", "text", Utc::now() - Duration::days(1), user.id)
                .category(drafts.id),
        )
        .await
        .unwrap();

    let state = AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    };

    Seeded {
        state,
        repo,
        visible,
        draft,
        scheduled,
        in_drafts_category,
    }
}

fn category_path(slug: &str) -> CategoryPath {
    CategoryPath {
        category_slug: slug.to_string(),
    }
}

// --- Index ---

#[tokio::test]
async fn test_index_shows_first_visible_posts() {
    let seeded = seeded().await;

    let ctx = handlers::index(State(seeded.state.clone())).await.unwrap().0;

    assert_eq!(ctx.post_list.len(), INDEX_POSTS_COUNT);
    let expected: Vec<i64> = seeded.visible[..INDEX_POSTS_COUNT]
        .iter()
        .map(|p| p.id)
        .collect();
    let shown: Vec<i64> = ctx.post_list.iter().map(|p| p.id).collect();
    assert_eq!(shown, expected);
    assert!(ctx.post_list.iter().all(|p| p.author.username == "robinson"));
}

#[tokio::test]
async fn test_index_is_prefix_of_visible_feed() {
    let seeded = seeded().await;

    let all = seeded
        .repo
        .visible_posts(&PublishedFilter::at(Utc::now()))
        .await
        .unwrap();
    let ctx = handlers::index(State(seeded.state.clone())).await.unwrap().0;

    let shown: Vec<i64> = ctx.post_list.iter().map(|p| p.id).collect();
    let prefix: Vec<i64> = all.iter().take(INDEX_POSTS_COUNT).map(|p| p.id).collect();
    assert_eq!(shown, prefix);
}

#[tokio::test]
async fn test_index_on_empty_store() {
    let ctx = handlers::index(State(AppState::in_memory())).await.unwrap().0;
    assert!(ctx.post_list.is_empty());
}

// --- Category ---

#[tokio::test]
async fn test_category_lists_all_its_visible_posts() {
    let seeded = seeded().await;

    let ctx = handlers::category_posts(State(seeded.state.clone()), category_path("travel"))
        .await
        .unwrap()
        .0;

    assert_eq!(ctx.category.slug.as_str(), "travel");
    let shown: Vec<i64> = ctx.posts.iter().map(|p| p.id).collect();
    let expected: Vec<i64> = seeded.visible.iter().map(|p| p.id).collect();
    assert_eq!(shown, expected);
    assert!(!shown.contains(&seeded.draft.id));
    assert!(!shown.contains(&seeded.scheduled.id));
}

#[tokio::test]
async fn test_unpublished_category_is_not_found() {
    let seeded = seeded().await;

    let err = handlers::category_posts(State(seeded.state.clone()), category_path("drafts"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_or_malformed_category_is_not_found() {
    let seeded = seeded().await;

    for slug in ["nonexistent", "not a slug", ""] {
        let err = handlers::category_posts(State(seeded.state.clone()), category_path(slug))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{slug:?} should be not found");
    }
}

// --- Post Detail ---

#[tokio::test]
async fn test_post_detail_of_visible_post() {
    let seeded = seeded().await;
    let target = &seeded.visible[2];

    let ctx = handlers::post_detail(State(seeded.state.clone()), PostPath { id: target.id })
        .await
        .unwrap()
        .0;

    assert_eq!(ctx.post.id, target.id);
    assert_eq!(ctx.post.title, target.title);
    assert_eq!(
        ctx.post.category.map(|c| c.slug.into_inner()),
        Some("travel".to_string())
    );
}

#[tokio::test]
async fn test_hidden_posts_are_not_found() {
    let seeded = seeded().await;

    for id in [
        seeded.draft.id,
        seeded.scheduled.id,
        seeded.in_drafts_category.id,
        999_999,
    ] {
        let err = handlers::post_detail(State(seeded.state.clone()), PostPath { id })
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "post {id} should be not found");
    }
}

#[tokio::test]
async fn test_post_hidden_after_unpublishing() {
    let seeded = seeded().await;
    let id = seeded.visible[0].id;

    assert!(
        handlers::post_detail(State(seeded.state.clone()), PostPath { id })
            .await
            .is_ok()
    );

    seeded.repo.set_post_published(id, false).await.unwrap();

    let err = handlers::post_detail(State(seeded.state.clone()), PostPath { id })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
