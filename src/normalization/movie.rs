use crate::dataset::EnrichmentFields;
use crate::tmdb::TmdbMovie;

/// Only strictly positive values are observations.
fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Currency amounts and counts are stored whole, rounded to the nearest unit.
fn positive_whole(value: Option<f64>) -> Option<i64> {
    positive(value).map(|v| v.round() as i64)
}

/// Map a TMDB movie document onto the enrichment columns.
///
/// Zero, negative, null, and absent numbers become the missing sentinel, as do
/// blank poster paths. List order follows the document.
pub fn normalize_movie(movie: &TmdbMovie) -> EnrichmentFields {
    EnrichmentFields {
        budget: positive_whole(movie.budget),
        revenue: positive_whole(movie.revenue),
        vote_average: positive(movie.vote_average),
        vote_count: positive_whole(movie.vote_count),
        production_companies: movie
            .production_companies
            .iter()
            .map(|c| c.name.clone())
            .collect(),
        production_countries: movie
            .production_countries
            .iter()
            .map(|c| c.iso_3166_1.clone())
            .collect(),
        poster_path: movie
            .poster_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    }
}
