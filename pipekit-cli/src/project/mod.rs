//! The demonstration recommender-prep project.
//!
//! Mirrors a two-layer layout: a `raw` pipeline that ingests and
//! normalizes source data, and a `data_processing` pipeline that joins,
//! explodes and summarizes it. The `__default__` pipeline is the union
//! of both.

pub mod nodes;

use pipekit::prelude::*;
use serde_json::{json, Map, Value};

/// Name of the composed default pipeline.
pub const DEFAULT_PIPELINE: &str = "__default__";

/// Raw layer: extraction and normalization, preserving source data as
/// immutable as possible.
fn create_raw_pipeline() -> Result<Pipeline, PipelineBuildError> {
    Pipeline::new(
        "raw",
        vec![
            Node::from_fn(
                "normalize_ratings",
                ["params:movie_lens.seed_ratings"],
                ["ratings"],
                nodes::normalize_ratings,
            )
            .with_tag("raw"),
            Node::from_fn(
                "normalize_movies",
                ["params:movie_lens.seed_movies"],
                ["movies"],
                nodes::normalize_movies,
            )
            .with_tag("raw"),
        ],
    )
}

/// Data-processing layer: join ratings with movies, explode genres and
/// aggregate per-genre statistics.
fn create_processing_pipeline() -> Result<Pipeline, PipelineBuildError> {
    Pipeline::new(
        "data_processing",
        vec![
            Node::from_fn(
                "merge_ratings_with_movies",
                ["ratings", "movies"],
                ["ratings_with_titles"],
                nodes::merge_ratings_with_movies,
            )
            .with_tag("recsys"),
            Node::from_fn(
                "explode_genres",
                ["ratings_with_titles"],
                ["ratings_by_genre"],
                nodes::explode_genres,
            )
            .with_tag("recsys"),
            Node::from_fn(
                "summarize_genres",
                ["ratings_by_genre", "params:min_ratings_per_genre"],
                ["genre_summary"],
                nodes::summarize_genres,
            )
            .with_tag("recsys"),
        ],
    )
}

/// Builds the project registry: `raw`, `data_processing` and their
/// composition under [`DEFAULT_PIPELINE`].
pub fn build_registry() -> Result<PipelineRegistry, PipekitError> {
    let mut registry = PipelineRegistry::new();
    registry.register("raw", create_raw_pipeline()?)?;
    registry.register("data_processing", create_processing_pipeline()?)?;
    registry.compose(DEFAULT_PIPELINE, &["raw", "data_processing"])?;
    Ok(registry)
}

/// Built-in parameters so the demo runs without any configuration;
/// values loaded from `conf/` override these key-by-key.
#[must_use]
pub fn default_parameters() -> Map<String, Value> {
    let params = json!({
        "movie_lens": {
            "seed_ratings": [
                {"userId": 1, "movieId": 10, "rating": 4.0},
                {"userId": 1, "movieId": 20, "rating": 5.0},
                {"userId": 2, "movieId": 10, "rating": 2.5},
                {"userId": 2, "movieId": 30, "rating": 3.5},
                {"userId": 3, "movieId": 20, "rating": 4.5},
            ],
            "seed_movies": [
                {"movieId": 10, "title": "Heat", "genres": "Action|Crime"},
                {"movieId": 20, "title": "Toy Story", "genres": "Animation|Comedy"},
                {"movieId": 30, "title": "Se7en", "genres": "Crime|Thriller"},
            ],
        },
        "min_ratings_per_genre": 1,
    });

    match params {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
