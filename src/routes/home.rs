use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::models::{Category, CategoryId};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::posts::PostCard;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub viewer: Option<String>,
    pub categories: Vec<CategoryOption>,
    pub filtered: bool,
    pub posts: Vec<PostCard>,
}

/// A category as a filter link or a checkbox.
pub struct CategoryOption {
    pub id: CategoryId,
    pub name: String,
    pub selected: bool,
}

impl CategoryOption {
    pub fn list(categories: Vec<Category>, selected: &[CategoryId]) -> Vec<Self> {
        categories
            .into_iter()
            .map(|c| CategoryOption {
                selected: selected.contains(&c.id),
                id: c.id,
                name: c.name,
            })
            .collect()
    }
}

#[derive(Deserialize)]
pub struct IndexQuery {
    pub category: Option<i64>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render with a status other than 200, e.g. a form re-rendered on error.
pub fn html_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    let mut response = Html(template).into_response();
    if response.status() == StatusCode::OK {
        *response.status_mut() = status;
    }
    response
}

pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<IndexQuery>,
) -> AppResult<Html<IndexTemplate>> {
    let filter = query.category.map(CategoryId);
    let viewer_id = user.as_ref().map(|u| u.id);

    let categories = state.forum.list_categories(state.deadline())?;
    let posts = state
        .forum
        .list_posts(filter, viewer_id, state.deadline())?
        .into_iter()
        .map(PostCard::from)
        .collect();

    Ok(Html(IndexTemplate {
        viewer: user.map(|u| u.username),
        categories: CategoryOption::list(categories, filter.as_slice()),
        filtered: filter.is_some(),
        posts,
    }))
}
