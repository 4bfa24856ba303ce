//! Ordered, id-unique list of saved movies.

use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::{Movie, MovieId};

/// Saved movies in insertion order, unique by id.
///
/// Entries are snapshots taken when the movie was favorited; they are never
/// refreshed from the catalog. Stored lists are decoded as `Vec<Movie>` and
/// go through [`FavoritesCollection::from_movies`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FavoritesCollection {
  movies: Vec<Movie>,
}

impl FavoritesCollection {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from a stored list, keeping the first entry for duplicate ids.
  pub fn from_movies(movies: Vec<Movie>) -> Self {
    let mut collection = Self::new();
    for movie in movies {
      if !collection.contains(movie.id) {
        collection.movies.push(movie);
      }
    }
    collection
  }

  pub fn contains(&self, id: MovieId) -> bool {
    self.movies.iter().any(|m| m.id == id)
  }

  pub fn get(&self, id: MovieId) -> Option<&Movie> {
    self.movies.iter().find(|m| m.id == id)
  }

  pub fn len(&self) -> usize {
    self.movies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.movies.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Movie> {
    self.movies.iter()
  }

  /// Copy with the movie appended, or `None` when its id is already present.
  pub fn with_added(&self, movie: Movie) -> Option<Self> {
    if self.contains(movie.id) {
      return None;
    }
    let mut movies = self.movies.clone();
    movies.push(movie);
    Some(Self { movies })
  }

  /// Copy without the given id. Removing a non-member yields an equal copy.
  pub fn without(&self, id: MovieId) -> Self {
    Self {
      movies: self.movies.iter().filter(|m| m.id != id).cloned().collect(),
    }
  }

  /// Union of both collections; on id collision `preferred`'s snapshot wins.
  ///
  /// Order follows first appearance: every id of `self`, then the ids only
  /// `preferred` has, in its order.
  pub fn merged_with(&self, preferred: &Self) -> Self {
    let mut movies: Vec<Movie> = Vec::with_capacity(self.len() + preferred.len());
    let mut positions: HashMap<MovieId, usize> = HashMap::new();

    for movie in self.movies.iter().chain(preferred.movies.iter()) {
      match positions.get(&movie.id) {
        Some(&pos) => movies[pos] = movie.clone(),
        None => {
          positions.insert(movie.id, movies.len());
          movies.push(movie.clone());
        }
      }
    }

    Self { movies }
  }
}

impl<'a> IntoIterator for &'a FavoritesCollection {
  type Item = &'a Movie;
  type IntoIter = std::slice::Iter<'a, Movie>;

  fn into_iter(self) -> Self::IntoIter {
    self.movies.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn collection(entries: &[(MovieId, &str)]) -> FavoritesCollection {
    FavoritesCollection::from_movies(entries.iter().map(|(id, t)| Movie::new(*id, *t)).collect())
  }

  fn titles(c: &FavoritesCollection) -> Vec<(MovieId, String)> {
    c.iter().map(|m| (m.id, m.title.clone())).collect()
  }

  #[test]
  fn test_with_added_rejects_duplicate_id() {
    let c = collection(&[(1, "A")]);
    assert!(c.with_added(Movie::new(1, "A again")).is_none());

    let added = c.with_added(Movie::new(2, "B")).unwrap();
    assert_eq!(titles(&added), vec![(1, "A".into()), (2, "B".into())]);
    // Original untouched
    assert_eq!(c.len(), 1);
  }

  #[test]
  fn test_without_non_member_is_equal() {
    let c = collection(&[(1, "A"), (2, "B")]);
    assert_eq!(c.without(99), c);
    assert_eq!(titles(&c.without(1)), vec![(2, "B".into())]);
  }

  #[test]
  fn test_merge_preferred_wins_on_collision() {
    let local = collection(&[(1, "A")]);
    let remote = collection(&[(1, "B"), (2, "C")]);

    let merged = local.merged_with(&remote);
    assert_eq!(titles(&merged), vec![(1, "B".into()), (2, "C".into())]);
  }

  #[test]
  fn test_merge_keeps_local_only_entries_first() {
    let local = collection(&[(3, "local"), (1, "A")]);
    let remote = collection(&[(2, "C"), (1, "B")]);

    let merged = local.merged_with(&remote);
    assert_eq!(
      titles(&merged),
      vec![(3, "local".into()), (1, "B".into()), (2, "C".into())]
    );
  }

  #[test]
  fn test_from_movies_dedupes() {
    let c = collection(&[(1, "A"), (1, "dup"), (2, "B")]);
    assert_eq!(titles(&c), vec![(1, "A".into()), (2, "B".into())]);
  }

  #[test]
  fn test_serializes_as_flat_list() {
    let c = collection(&[(7, "Se7en")]);
    let json = serde_json::to_value(&c).unwrap();
    assert!(json.is_array());
    assert_eq!(json[0]["id"], 7);
  }
}
