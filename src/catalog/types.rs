use serde::{Deserialize, Serialize};

/// Catalog movie identifier
pub type MovieId = u64;

/// Movie snapshot as returned by the catalog.
///
/// Field names follow the catalog's JSON so snapshots round-trip through
/// device storage and account documents unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
  pub id: MovieId,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub poster_path: Option<String>,
  #[serde(default)]
  pub backdrop_path: Option<String>,
  #[serde(default)]
  pub overview: String,
  #[serde(default)]
  pub release_date: String,
  /// Average rating, 0.0 to 10.0
  #[serde(default)]
  pub vote_average: f64,
  #[serde(default)]
  pub vote_count: u64,
  #[serde(default)]
  pub popularity: f64,
  #[serde(default)]
  pub original_language: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub genre_ids: Option<Vec<u64>>,
}

impl Movie {
  /// Minimal snapshot with just an id and title
  pub fn new(id: MovieId, title: impl Into<String>) -> Self {
    Self {
      id,
      title: title.into(),
      poster_path: None,
      backdrop_path: None,
      overview: String::new(),
      release_date: String::new(),
      vote_average: 0.0,
      vote_count: 0,
      popularity: 0.0,
      original_language: String::new(),
      genre_ids: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
  pub id: u64,
  pub name: String,
}

/// Full movie details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
  #[serde(flatten)]
  pub movie: Movie,
  #[serde(default)]
  pub genres: Vec<Genre>,
  #[serde(default)]
  pub runtime: Option<u32>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub tagline: String,
  #[serde(default)]
  pub budget: u64,
  #[serde(default)]
  pub revenue: u64,
}

/// One page of catalog results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
  pub results: Vec<Movie>,
  #[serde(default)]
  pub total_pages: u32,
}

/// Sort orders accepted by the discover endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
  #[default]
  #[serde(rename = "popularity.desc")]
  Popularity,
  #[serde(rename = "vote_average.desc")]
  Rating,
  #[serde(rename = "release_date.desc")]
  ReleaseDate,
}

impl SortBy {
  pub fn as_param(self) -> &'static str {
    match self {
      Self::Popularity => "popularity.desc",
      Self::Rating => "vote_average.desc",
      Self::ReleaseDate => "release_date.desc",
    }
  }
}
