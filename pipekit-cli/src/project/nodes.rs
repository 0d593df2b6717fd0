//! Node computations for the demonstration recommender-prep project.
//!
//! All values are JSON: datasets are arrays of row objects, parameters
//! come in through the `params:` namespace.

use anyhow::{bail, Context};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn rows(value: &Value, dataset: &str) -> anyhow::Result<Vec<Map<String, Value>>> {
    value
        .as_array()
        .with_context(|| format!("dataset '{dataset}' must be an array of rows"))?
        .iter()
        .map(|row| {
            row.as_object()
                .cloned()
                .with_context(|| format!("dataset '{dataset}' contains a non-object row"))
        })
        .collect()
}

/// Normalizes raw rating rows: renames `userId`/`movieId` to
/// snake_case and keeps only the columns downstream nodes need.
pub fn normalize_ratings(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let raw = rows(&inputs[0], "raw ratings")?;

    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        let user_id = row
            .get("userId")
            .or_else(|| row.get("user_id"))
            .and_then(Value::as_i64)
            .context("rating row is missing a user id")?;
        let movie_id = row
            .get("movieId")
            .or_else(|| row.get("movie_id"))
            .and_then(Value::as_i64)
            .context("rating row is missing a movie id")?;
        let rating = row
            .get("rating")
            .and_then(Value::as_f64)
            .context("rating row is missing a rating")?;

        out.push(json!({
            "user_id": user_id,
            "movie_id": movie_id,
            "rating": rating,
        }));
    }

    Ok(vec![Value::Array(out)])
}

/// Passes movie rows through, validating the columns the join needs.
pub fn normalize_movies(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let raw = rows(&inputs[0], "raw movies")?;

    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        let movie_id = row
            .get("movieId")
            .or_else(|| row.get("movie_id"))
            .and_then(Value::as_i64)
            .context("movie row is missing a movie id")?;
        let title = row
            .get("title")
            .and_then(Value::as_str)
            .context("movie row is missing a title")?;
        let genres = row
            .get("genres")
            .and_then(Value::as_str)
            .unwrap_or_default();

        out.push(json!({
            "movie_id": movie_id,
            "title": title,
            "genres": genres,
        }));
    }

    Ok(vec![Value::Array(out)])
}

/// Left-joins ratings with movie titles and genres on `movie_id`.
pub fn merge_ratings_with_movies(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let ratings = rows(&inputs[0], "ratings")?;
    let movies = rows(&inputs[1], "movies")?;

    let by_id: BTreeMap<i64, &Map<String, Value>> = movies
        .iter()
        .filter_map(|m| m.get("movie_id").and_then(Value::as_i64).map(|id| (id, m)))
        .collect();

    let mut out = Vec::with_capacity(ratings.len());
    for row in ratings {
        let movie_id = row
            .get("movie_id")
            .and_then(Value::as_i64)
            .context("rating row is missing a movie id")?;
        let Some(movie) = by_id.get(&movie_id) else {
            bail!("rating references unknown movie id {movie_id}");
        };

        let mut merged = row.clone();
        merged.insert("title".to_string(), movie["title"].clone());
        merged.insert("genres".to_string(), movie["genres"].clone());
        out.push(Value::Object(merged));
    }

    Ok(vec![Value::Array(out)])
}

/// Explodes the pipe-separated `genres` column into one row per genre.
pub fn explode_genres(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let merged = rows(&inputs[0], "ratings with titles")?;

    let mut out = Vec::new();
    for row in merged {
        let genres = row
            .get("genres")
            .and_then(Value::as_str)
            .unwrap_or_default();
        for genre in genres.split('|').filter(|g| !g.is_empty()) {
            let mut exploded = row.clone();
            exploded.insert("genre".to_string(), json!(genre));
            exploded.remove("genres");
            out.push(Value::Object(exploded));
        }
    }

    Ok(vec![Value::Array(out)])
}

/// Aggregates mean rating and rating count per genre, keeping genres
/// with at least `params:min_ratings_per_genre` ratings.
pub fn summarize_genres(inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let exploded = rows(&inputs[0], "ratings by genre")?;
    let min_count = inputs[1]
        .as_u64()
        .context("params:min_ratings_per_genre must be a non-negative integer")?;

    let mut sums: BTreeMap<String, (f64, u64)> = BTreeMap::new();
    for row in exploded {
        let genre = row
            .get("genre")
            .and_then(Value::as_str)
            .context("exploded row is missing a genre")?;
        let rating = row
            .get("rating")
            .and_then(Value::as_f64)
            .context("exploded row is missing a rating")?;
        let entry = sums.entry(genre.to_string()).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }

    let out: Vec<Value> = sums
        .into_iter()
        .filter(|(_, (_, count))| *count >= min_count)
        .map(|(genre, (sum, count))| {
            #[allow(clippy::cast_precision_loss)]
            let mean = sum / count as f64;
            json!({"genre": genre, "mean_rating": mean, "count": count})
        })
        .collect();

    Ok(vec![Value::Array(out)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seed_ratings() -> Value {
        json!([
            {"userId": 1, "movieId": 10, "rating": 4.0},
            {"userId": 2, "movieId": 10, "rating": 2.0},
            {"userId": 1, "movieId": 20, "rating": 5.0},
        ])
    }

    fn seed_movies() -> Value {
        json!([
            {"movieId": 10, "title": "Heat", "genres": "Action|Crime"},
            {"movieId": 20, "title": "Toy Story", "genres": "Animation"},
        ])
    }

    #[test]
    fn test_normalize_ratings_renames_columns() {
        let out = normalize_ratings(vec![seed_ratings()]).unwrap();
        let first = &out[0][0];
        assert_eq!(first["user_id"], json!(1));
        assert_eq!(first["movie_id"], json!(10));
        assert!(first.get("userId").is_none());
    }

    #[test]
    fn test_normalize_ratings_rejects_bad_rows() {
        let err = normalize_ratings(vec![json!([{"userId": 1}])]).unwrap_err();
        assert!(err.to_string().contains("movie id"));
    }

    #[test]
    fn test_merge_attaches_title_and_genres() {
        let ratings = normalize_ratings(vec![seed_ratings()]).unwrap();
        let movies = normalize_movies(vec![seed_movies()]).unwrap();

        let out =
            merge_ratings_with_movies(vec![ratings[0].clone(), movies[0].clone()]).unwrap();
        assert_eq!(out[0][0]["title"], json!("Heat"));
        assert_eq!(out[0][2]["title"], json!("Toy Story"));
    }

    #[test]
    fn test_merge_rejects_unknown_movie() {
        let ratings = json!([{"movie_id": 99, "user_id": 1, "rating": 3.0}]);
        let movies = normalize_movies(vec![seed_movies()]).unwrap();

        let err = merge_ratings_with_movies(vec![ratings, movies[0].clone()]).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_explode_genres_one_row_per_genre() {
        let merged = json!([
            {"user_id": 1, "rating": 4.0, "title": "Heat", "genres": "Action|Crime"}
        ]);
        let out = explode_genres(vec![merged]).unwrap();
        let exploded = out[0].as_array().unwrap();

        assert_eq!(exploded.len(), 2);
        assert_eq!(exploded[0]["genre"], json!("Action"));
        assert_eq!(exploded[1]["genre"], json!("Crime"));
        assert!(exploded[0].get("genres").is_none());
    }

    #[test]
    fn test_summarize_genres_means_and_threshold() {
        let exploded = json!([
            {"genre": "Action", "rating": 4.0},
            {"genre": "Action", "rating": 2.0},
            {"genre": "Animation", "rating": 5.0},
        ]);

        let out = summarize_genres(vec![exploded, json!(2)]).unwrap();
        let summary = out[0].as_array().unwrap();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0]["genre"], json!("Action"));
        assert_eq!(summary[0]["mean_rating"], json!(3.0));
        assert_eq!(summary[0]["count"], json!(2));
    }
}
