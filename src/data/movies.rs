//! Movie records and their catalogue operations.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::runtime::Runtime;
use crate::config::StorageConfig;
use crate::error::{MarqueeError, Result};
use crate::query::{Filters, ListQueryEngine, Listable, Page, SortDirection, SortTable, SortValue};
use crate::store::{OptimisticConcurrencyController, SharedStore, VersionedRecord};
use crate::validator::{self, Validator};

/// Earliest year a film could have been released.
const FIRST_FILM_YEAR: i32 = 1888;
const MAX_TITLE_BYTES: usize = 500;
const MAX_GENRES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: Uuid,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

impl VersionedRecord for Movie {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

impl Listable for Movie {
    fn search_text(&self) -> &str {
        &self.title
    }

    fn tags(&self) -> &[String] {
        &self.genres
    }

    fn sort_value(&self, field: &str) -> SortValue<'_> {
        match field {
            "id" => SortValue::Bytes(self.id.as_bytes()),
            "title" => SortValue::Text(&self.title),
            "year" => SortValue::Int(i64::from(self.year)),
            "runtime" => SortValue::Int(i64::from(self.runtime.minutes())),
            _ => SortValue::Missing,
        }
    }
}

/// Body of a create request. Missing fields are left empty and caught by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// Body of a partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
    /// Version the client last saw. Defaults to the version read by the handler.
    pub version: Option<i32>,
}

impl MovieUpdate {
    fn apply(&self, movie: &mut Movie) {
        if let Some(title) = &self.title {
            movie.title = title.clone();
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = &self.genres {
            movie.genres = genres.clone();
        }
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= FIRST_FILM_YEAR, "year", "must be greater than 1888");
    v.check(movie.year <= Utc::now().year(), "year", "must not be in the future");

    v.check(movie.runtime.minutes() != 0, "runtime", "must be provided");
    v.check(movie.runtime.minutes() > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(validator::unique(&movie.genres), "genres", "must not contain duplicate values");
}

/// Sort keys accepted by movie listings.
pub fn movie_sort_table() -> SortTable {
    use SortDirection::*;
    SortTable::with_reversals(&[
        ("id", "id", Ascending),
        ("title", "title", Ascending),
        ("year", "year", Descending),
        ("runtime", "runtime", Descending),
    ])
}

/// Catalogue operations over a movie store.
pub struct Movies {
    controller: OptimisticConcurrencyController<Movie>,
    engine: ListQueryEngine<Movie>,
    sort_table: SortTable,
}

impl Movies {
    pub fn new(store: SharedStore<Movie>, storage: &StorageConfig) -> Self {
        Self {
            controller: OptimisticConcurrencyController::new(store.clone(), storage.write_timeout()),
            engine: ListQueryEngine::new(store, storage.query_timeout()),
            sort_table: movie_sort_table(),
        }
    }

    pub async fn insert(&self, input: NewMovie) -> Result<Movie> {
        let movie = Movie {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: input.title,
            year: input.year,
            runtime: input.runtime,
            genres: input.genres,
            version: 0,
        };

        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        v.into_result()?;

        let movie = self.controller.insert(movie).await?;
        info!(id = %movie.id, title = %movie.title, "Movie created");
        Ok(movie)
    }

    pub async fn get(&self, id: Uuid) -> Result<Movie> {
        self.controller.fetch(id).await
    }

    /// Apply a partial update, guarded by the version the client saw.
    ///
    /// Returns the movie as stored after the update. A pinned version that
    /// differs from the stored one is an `EditConflict` before anything is written.
    pub async fn update(&self, id: Uuid, changes: MovieUpdate) -> Result<Movie> {
        let mut movie = self.controller.fetch(id).await?;
        if changes.version.is_some_and(|pinned| pinned != movie.version) {
            return Err(MarqueeError::EditConflict);
        }

        changes.apply(&mut movie);
        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        v.into_result()?;

        // Only the patched fields are written; the store re-checks the version read above
        movie.version = self
            .controller
            .update(id, movie.version, move |stored| changes.apply(stored))
            .await?;
        Ok(movie)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.controller.delete(id).await
    }

    /// List movies whose title contains `title` and that carry every genre in `genres`.
    pub async fn list(&self, title: &str, genres: &[String], filters: &Filters) -> Result<Page<Movie>> {
        self.engine.list(title, genres, filters, &self.sort_table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn movies() -> Movies {
        Movies::new(Arc::new(MemoryStore::<Movie>::new()), &StorageConfig::default())
    }

    fn new_movie(title: &str, year: i32, minutes: i32, genres: &[&str]) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            year,
            runtime: Runtime(minutes),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn errors_of(result: Result<Movie>) -> Vec<String> {
        match result {
            Err(MarqueeError::Validation(errors)) => errors.fields().map(String::from).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_version() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama", "romance"]))
            .await
            .unwrap();
        assert_eq!(movie.version, 1);
        assert_eq!(movies.get(movie.id).await.unwrap(), movie);
    }

    #[tokio::test]
    async fn test_insert_validates() {
        let movies = movies();
        let fields = errors_of(movies.insert(NewMovie::default()).await);
        assert_eq!(fields, vec!["genres", "runtime", "title", "year"]);

        let fields = errors_of(
            movies
                .insert(new_movie("Too Early", 1850, 10, &["drama", "drama"]))
                .await,
        );
        assert_eq!(fields, vec!["genres", "year"]);

        let fields = errors_of(
            movies
                .insert(new_movie(&"x".repeat(501), 2000, -5, &["a", "b", "c", "d", "e", "f"]))
                .await,
        );
        assert_eq!(fields, vec!["genres", "runtime", "title"]);
    }

    #[tokio::test]
    async fn test_future_year_rejected() {
        let movies = movies();
        let next_year = Utc::now().year() + 1;
        let fields = errors_of(movies.insert(new_movie("Soon", next_year, 90, &["drama"])).await);
        assert_eq!(fields, vec!["year"]);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama"]))
            .await
            .unwrap();

        let updated = movies
            .update(
                movie.id,
                MovieUpdate {
                    runtime: Some(Runtime(103)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.runtime, Runtime(103));
        assert_eq!(updated.title, "Casablanca");
        assert_eq!(movies.get(movie.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_with_stale_version() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama"]))
            .await
            .unwrap();
        movies
            .update(movie.id, MovieUpdate { year: Some(1943), ..Default::default() })
            .await
            .unwrap();

        let err = movies
            .update(
                movie.id,
                MovieUpdate {
                    title: Some("Casablanca (Restored)".into()),
                    version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarqueeError::EditConflict));
        assert_eq!(movies.get(movie.id).await.unwrap().title, "Casablanca");
    }

    #[tokio::test]
    async fn test_update_with_unknown_version() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama"]))
            .await
            .unwrap();

        let err = movies
            .update(
                movie.id,
                MovieUpdate {
                    year: Some(1943),
                    version: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarqueeError::EditConflict));

        // A mismatched version wins over invalid changes
        let err = movies
            .update(
                movie.id,
                MovieUpdate {
                    title: Some(String::new()),
                    version: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MarqueeError::EditConflict));

        assert_eq!(movies.get(movie.id).await.unwrap(), movie);
    }

    #[tokio::test]
    async fn test_update_with_current_version() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama"]))
            .await
            .unwrap();

        let updated = movies
            .update(
                movie.id,
                MovieUpdate {
                    genres: Some(vec!["drama".into(), "romance".into()]),
                    version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.genres, vec!["drama", "romance"]);
        assert_eq!(updated.title, "Casablanca");
        assert_eq!(movies.get(movie.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_record() {
        let movies = movies();
        let movie = movies
            .insert(new_movie("Casablanca", 1942, 102, &["drama"]))
            .await
            .unwrap();
        let err = movies
            .update(movie.id, MovieUpdate { genres: Some(vec![]), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, MarqueeError::Validation(_)));
        assert_eq!(movies.get(movie.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_missing_movie() {
        let movies = movies();
        let id = Uuid::new_v4();
        assert!(matches!(movies.get(id).await, Err(MarqueeError::NotFound)));
        assert!(matches!(
            movies.update(id, MovieUpdate::default()).await,
            Err(MarqueeError::NotFound)
        ));
        assert!(matches!(movies.delete(id).await, Err(MarqueeError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_by_genre_and_year() {
        let movies = movies();
        for (title, year, genres) in [
            ("Alien", 1979, &["horror", "scifi"][..]),
            ("Aliens", 1986, &["action", "scifi"][..]),
            ("Heat", 1995, &["crime"][..]),
        ] {
            movies.insert(new_movie(title, year, 100, genres)).await.unwrap();
        }

        let filters = Filters {
            sort: "-year".into(),
            ..Default::default()
        };
        let page = movies.list("alien", &["scifi".into()], &filters).await.unwrap();
        let titles: Vec<_> = page.records.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Alien", "Aliens"]);

        let filters = Filters {
            sort: "year".into(),
            ..Default::default()
        };
        let page = movies.list("", &[], &filters).await.unwrap();
        let titles: Vec<_> = page.records.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Heat", "Aliens", "Alien"]);
    }

    #[test]
    fn test_sort_table_safelist() {
        let table = movie_sort_table();
        assert_eq!(
            table.safelist().collect::<Vec<_>>(),
            vec!["id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime"]
        );
    }

    #[test]
    fn test_created_at_not_serialized() {
        let movie = Movie {
            id: Uuid::nil(),
            created_at: Utc::now(),
            title: "Heat".into(),
            year: 1995,
            runtime: Runtime(170),
            genres: vec!["crime".into()],
            version: 1,
        };
        let json = serde_json::to_value(&movie).unwrap();
        assert!(json.get("created_at").is_none());
        assert_eq!(json["runtime"], "170 mins");
    }
}
