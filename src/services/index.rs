//! Exact nearest-neighbor index over fixed-dimension vectors.
//!
//! Vectors are stored back to back in one contiguous buffer. The position of
//! a vector in insertion order is its id.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// A search hit: insertion position and squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Append-only flat index with squared Euclidean distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the buffer holds a whole number of vectors of a non-zero width.
    pub fn is_consistent(&self) -> bool {
        self.dimension > 0 && self.data.len() % self.dimension == 0
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Verify every vector has the index dimension without modifying anything.
    pub fn check(&self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        match vectors.iter().find(|v| v.len() != self.dimension) {
            Some(bad) => Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            }),
            None => Ok(()),
        }
    }

    /// Append vectors. Either all of them are added or none are.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        self.check(vectors)?;
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// The `min(k, len)` nearest vectors, closest first. Ties resolve to the
    /// earlier insertion position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_neighbors);
            hits.truncate(k);
        }
        hits.sort_by(compare_neighbors);
        Ok(hits)
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}

/// Squared Euclidean distance. Both slices must have the same length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(vectors: &[Vec<f32>]) -> FlatL2Index {
        let mut index = FlatL2Index::new(vectors[0].len()).unwrap();
        index.add(vectors).unwrap();
        index
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert_eq!(FlatL2Index::new(0), Err(IndexError::ZeroDimension));
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_add_is_all_or_nothing() {
        let mut index = index_with(&[vec![1.0, 0.0, 0.0]]);
        let err = index
            .add(&[vec![0.0, 1.0, 0.0], vec![0.0, 1.0]])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = index_with(&[
            vec![10.0, 0.0],
            vec![1.0, 0.0],
            vec![5.0, 0.0],
        ]);
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[2].distance, 100.0);
    }

    #[test]
    fn test_search_clamps_k() {
        let index = index_with(&[vec![1.0], vec![2.0]]);
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0], 1).unwrap().len(), 1);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_partial_selection_matches_full_sort() {
        let vectors: Vec<Vec<f32>> = (0..50).map(|i| vec![((i * 37) % 50) as f32]).collect();
        let index = index_with(&vectors);
        let top = index.search(&[0.0], 5).unwrap();
        let distances: Vec<f32> = top.iter().map(|h| h.distance).collect();
        assert_eq!(distances, vec![0.0, 1.0, 4.0, 9.0, 16.0]);
    }

    #[test]
    fn test_ties_prefer_earlier_position() {
        let index = index_with(&[vec![1.0], vec![-1.0], vec![1.0]]);
        let order: Vec<usize> = index
            .search(&[0.0], 3)
            .unwrap()
            .iter()
            .map(|h| h.position)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = index_with(&[vec![1.0, 2.0]]);
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(IndexError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_vector_lookup() {
        let index = index_with(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.vector(2), None);
        assert!(index.is_consistent());
    }
}
