//! Movie catalog types and a thin client over the resource cache.

mod client;
mod types;

pub use client::{catalog_language, CatalogClient};
pub use types::{Genre, Movie, MovieDetails, MovieId, MoviePage, SortBy};
