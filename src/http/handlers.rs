//! Route handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::server::AppState;
use crate::data::{MovieUpdate, NewMovie, NewUser};
use crate::error::{MarqueeError, Result};
use crate::query::Filters;
use crate::validator::Validator;

/// Unwrap a JSON body, reporting a malformed one as a bad request.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| MarqueeError::BadRequest(rejection.body_text()))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| MarqueeError::BadRequest("invalid id parameter".into()))
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "healthy",
        "environment": state.config.server.env,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let limiter = state.limiter.settings();
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.server.env,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "limiter": {
            "enabled": limiter.enabled,
            "requests_per_second": limiter.requests_per_second,
            "burst_capacity": limiter.burst_capacity,
            "tracked_clients": state.limiter.bucket_count(),
        },
    }))
}

pub async fn create_movie(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewMovie>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let movie = state.models.movies.insert(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(json!({ "movie": movie }))))
}

pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let movie = state.models.movies.get(parse_id(&id)?).await?;
    Ok(Json(json!({ "movie": movie })))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<MovieUpdate>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id)?;
    let movie = state.models.movies.update(id, body(payload)?).await?;
    Ok(Json(json!({ "movie": movie })))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.models.movies.delete(parse_id(&id)?).await?;
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}

/// Query string of a movie listing. Numbers arrive as text so that a
/// non-numeric value is reported against its field.
#[derive(Debug, Default, Deserialize)]
pub struct ListMoviesParams {
    title: Option<String>,
    /// Comma-separated
    genres: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
    sort: Option<String>,
}

impl ListMoviesParams {
    fn into_parts(self) -> Result<(String, Vec<String>, Filters)> {
        let defaults = Filters::default();
        let mut v = Validator::new();
        let page = read_int(&mut v, "page", self.page.as_deref(), defaults.page);
        let page_size = read_int(&mut v, "page_size", self.page_size.as_deref(), defaults.page_size);
        v.into_result()?;

        let genres = self
            .genres
            .map(|csv| {
                csv.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let filters = Filters {
            page,
            page_size,
            sort: self.sort.unwrap_or(defaults.sort),
        };
        Ok((self.title.unwrap_or_default(), genres, filters))
    }
}

fn read_int(v: &mut Validator, field: &str, raw: Option<&str>, default: i64) -> i64 {
    match raw.filter(|s| !s.is_empty()) {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(field, "must be an integer value");
            default
        }),
    }
}

pub async fn list_movies(
    State(state): State<AppState>,
    params: std::result::Result<Query<ListMoviesParams>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(params) = params.map_err(|rejection| MarqueeError::BadRequest(rejection.body_text()))?;
    let (title, genres, filters) = params.into_parts()?;

    let page = state.models.movies.list(&title, &genres, &filters).await?;
    Ok(Json(json!({
        "movies": page.records,
        "metadata": page.metadata,
    })))
}

pub async fn register_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let user = state.models.users.register(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>, genres: Option<&str>) -> ListMoviesParams {
        ListMoviesParams {
            page: page.map(String::from),
            page_size: page_size.map(String::from),
            genres: genres.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let (title, genres, filters) = ListMoviesParams::default().into_parts().unwrap();
        assert_eq!(title, "");
        assert!(genres.is_empty());
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn test_genres_split_on_commas() {
        let (_, genres, _) = params(None, None, Some("drama, crime,,"))
            .into_parts()
            .unwrap();
        assert_eq!(genres, vec!["drama", "crime"]);
    }

    #[test]
    fn test_non_numeric_paging() {
        match params(Some("two"), Some("x"), None).into_parts() {
            Err(MarqueeError::Validation(errors)) => {
                assert_eq!(errors.get("page"), Some("must be an integer value"));
                assert_eq!(errors.get("page_size"), Some("must be an integer value"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_bad_id() {
        assert!(matches!(parse_id("not-a-uuid"), Err(MarqueeError::BadRequest(_))));
        assert!(parse_id("936da01f-9abd-4d9d-80c7-02af85c822a8").is_ok());
    }
}
