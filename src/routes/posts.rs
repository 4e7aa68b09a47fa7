use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::models::{Category, CategoryId, CommentId, PostId};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forum::{CommentView, ForumError, PostSummary};
use crate::reactions::{ReactionTarget, Stance};
use crate::routes::home::{html_with_status, CategoryOption, Html};
use crate::routes::local_path;
use crate::state::AppState;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 10_000;
pub const MAX_COMMENT_LEN: usize = 2_000;

// --- View structs ---

pub struct PostCard {
    pub id: PostId,
    pub author: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub categories: Vec<Category>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
    pub user_liked: bool,
    pub user_disliked: bool,
}

impl From<PostSummary> for PostCard {
    fn from(post: PostSummary) -> Self {
        Self {
            id: post.id,
            author: post.author,
            title: post.title,
            body: post.body,
            created_at: format_relative_time(&post.created_at),
            categories: post.categories,
            like_count: post.counts.likes,
            dislike_count: post.counts.dislikes,
            comment_count: post.comment_count,
            user_liked: post.viewer_stance == Some(Stance::Like),
            user_disliked: post.viewer_stance == Some(Stance::Dislike),
        }
    }
}

pub struct CommentCard {
    pub id: CommentId,
    pub author: String,
    pub body: String,
    pub created_at: String,
    pub like_count: i64,
    pub dislike_count: i64,
    pub user_liked: bool,
    pub user_disliked: bool,
}

impl From<CommentView> for CommentCard {
    fn from(comment: CommentView) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            body: comment.body,
            created_at: format_relative_time(&comment.created_at),
            like_count: comment.counts.likes,
            dislike_count: comment.counts.dislikes,
            user_liked: comment.viewer_stance == Some(Stance::Like),
            user_disliked: comment.viewer_stance == Some(Stance::Dislike),
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer: Option<String>,
    pub post: PostCard,
    pub comments: Vec<CommentCard>,
}

#[derive(Template)]
#[template(path = "pages/new_post.html")]
pub struct NewPostTemplate {
    pub viewer: Option<String>,
    pub categories: Vec<CategoryOption>,
    pub title: String,
    pub body: String,
    pub error: String,
}

// --- Forms ---

/// Fields of the new-post form. `category` repeats once per checked box.
#[derive(Default)]
pub struct NewPostForm {
    pub title: String,
    pub body: String,
    pub categories: Vec<CategoryId>,
}

impl NewPostForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, AppError> {
        let mut form = NewPostForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "title" => form.title = value.trim().to_string(),
                "body" => form.body = value.trim().to_string(),
                "category" => {
                    let id = value
                        .parse()
                        .map_err(|_| AppError::BadRequest("Invalid category".into()))?;
                    form.categories.push(CategoryId(id));
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn validate(&self) -> Result<(), String> {
        if self.title.is_empty() || self.body.is_empty() {
            return Err("Title and body are required".into());
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(format!(
                "Title must be {} characters or less",
                MAX_TITLE_LEN
            ));
        }
        if self.body.chars().count() > MAX_BODY_LEN {
            return Err(format!("Post must be {} characters or less", MAX_BODY_LEN));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct CreateCommentForm {
    #[serde(default)]
    pub body: String,
}

#[derive(Deserialize)]
pub struct ReactionForm {
    pub stance: String,
    pub return_to: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/new", get(new_post_page).post(create_post))
        .route("/post/{id}", get(show_post))
        .route("/post/{id}/comment", post(create_comment))
        .route("/post/{id}/react", post(react_to_post))
        .route("/comment/{id}/react", post(react_to_comment))
}

fn see_other(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location.to_string())]).into_response()
}

// --- Handlers ---

async fn show_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Html<PostTemplate>> {
    let viewer_id = user.as_ref().map(|u| u.id);
    let post = state.forum.get_post(PostId(id), viewer_id, state.deadline())?;
    let comments = state
        .forum
        .list_comments(post.id, viewer_id, state.deadline())?
        .into_iter()
        .map(CommentCard::from)
        .collect();

    Ok(Html(PostTemplate {
        viewer: user.map(|u| u.username),
        post: post.into(),
        comments,
    }))
}

async fn new_post_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Html<NewPostTemplate>> {
    let categories = state.forum.list_categories(state.deadline())?;
    Ok(Html(NewPostTemplate {
        viewer: Some(user.username),
        categories: CategoryOption::list(categories, &[]),
        title: String::new(),
        body: String::new(),
        error: String::new(),
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let form = NewPostForm::from_pairs(pairs)?;

    if let Err(error) = form.validate() {
        let categories = state.forum.list_categories(state.deadline())?;
        return Ok(html_with_status(
            StatusCode::BAD_REQUEST,
            NewPostTemplate {
                viewer: Some(user.username),
                categories: CategoryOption::list(categories, &form.categories),
                title: form.title,
                body: form.body,
                error,
            },
        ));
    }

    let post_id = state.forum.create_post(
        user.id,
        &form.title,
        &form.body,
        &form.categories,
        state.deadline(),
    )?;

    Ok(see_other(&format!("/post/{}", post_id)))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CreateCommentForm>,
) -> AppResult<Response> {
    let body = form.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_LEN
        )));
    }

    let post_id = PostId(post_id);
    let comment_id = state
        .forum
        .create_comment(post_id, user.id, body, state.deadline())?;

    Ok(see_other(&format!("/post/{}#comment-{}", post_id, comment_id)))
}

async fn react_to_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ReactionForm>,
) -> AppResult<Response> {
    let post_id = PostId(id);
    react(&state, &user, ReactionTarget::Post(post_id), &form)?;

    let fallback = format!("/post/{}", post_id);
    Ok(see_other(
        local_path(form.return_to.as_deref()).unwrap_or(&fallback),
    ))
}

async fn react_to_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ReactionForm>,
) -> AppResult<Response> {
    let comment_id = CommentId(id);
    react(&state, &user, ReactionTarget::Comment(comment_id), &form)?;

    let fallback = comment_anchor(
        comment_id,
        state.forum.comment_post(comment_id, state.deadline()),
    );
    Ok(see_other(
        local_path(form.return_to.as_deref()).unwrap_or(&fallback),
    ))
}

/// Where to land after reacting to a comment. The reaction is already
/// committed, so a failed post lookup falls back to the index.
fn comment_anchor(comment_id: CommentId, post: Result<PostId, ForumError>) -> String {
    match post {
        Ok(post_id) => format!("/post/{}#comment-{}", post_id, comment_id),
        Err(e) => {
            tracing::warn!(
                error = %e,
                comment_id = %comment_id,
                "Comment post lookup failed after reaction"
            );
            "/".to_string()
        }
    }
}

fn react(
    state: &AppState,
    user: &CurrentUser,
    target: ReactionTarget,
    form: &ReactionForm,
) -> AppResult<()> {
    let pressed: Stance = form
        .stance
        .trim()
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{}", e)))?;

    state
        .reactions
        .set_reaction(user.id, target, pressed, state.deadline())?;
    Ok(())
}

// --- Time formatting ---

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---
