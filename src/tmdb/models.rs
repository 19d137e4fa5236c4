use serde::Deserialize;

// ---------- TMDB /movie/{id} shape (minimal) ----------
// Only the fields the enrichment pass reads are modeled; everything else is ignored.
// Numbers are nullable upstream and sometimes omitted on sparse records, so they
// stay optional here and normalization decides what counts as an observation.
// The two lists are required: a document without them is treated as malformed.

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TmdbMovie {
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<f64>,
    pub production_companies: Vec<ProductionCompany>,
    pub production_countries: Vec<ProductionCountry>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProductionCompany {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
}
