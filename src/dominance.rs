//! North-east dominance queries
//!
//! Points are sorted by x, largest first, and inserted one per version as
//! `(y, x)` keys. Version `k` therefore holds exactly the `k + 1` points with
//! the largest x, ordered by y. A query for everything north-east of
//! `(qx, qy)` picks the version holding all points with `x >= qx`, seeks to
//! the first key with `y >= qy`, and walks forward: `O(log n + k)`.

use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::Time;
use crate::config::SkipListConfig;
use crate::error::Error;
use crate::skiplist::SkipList;

/// A point in the plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Point<C> {
    /// Horizontal coordinate
    pub x: C,
    /// Vertical coordinate
    pub y: C,
}

impl<C> Point<C> {
    /// Create a point
    pub fn new(x: C, y: C) -> Self {
        Self { x, y }
    }
}

impl<C: Ord> Point<C> {
    /// Whether this point lies north-east of `(qx, qy)`, boundaries included
    pub fn dominates(&self, qx: &C, qy: &C) -> bool {
        self.x >= *qx && self.y >= *qy
    }
}

/// Static point set answering north-east queries
#[derive(Debug)]
pub struct DominanceIndex<C> {
    list: SkipList<(C, C)>,
    /// x of the point inserted at each version, descending
    xs: Vec<C>,
}

impl<C: Ord + Copy> DominanceIndex<C> {
    /// Index `points`; repeated points are kept once
    pub fn build<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point<C>>,
    {
        Self::build_into(SkipList::new(), points)
    }

    /// Index `points` with a custom skip list configuration
    pub fn build_with_config<I>(points: I, config: SkipListConfig) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Point<C>>,
    {
        Ok(Self::build_into(SkipList::with_config(config)?, points))
    }

    fn build_into<I>(mut list: SkipList<(C, C)>, points: I) -> Self
    where
        I: IntoIterator<Item = Point<C>>,
    {
        let mut points: Vec<Point<C>> = points.into_iter().collect();
        points.sort_unstable_by(|a, b| b.x.cmp(&a.x).then(b.y.cmp(&a.y)));
        points.dedup();

        let mut xs = Vec::with_capacity(points.len());
        for (rank, point) in points.iter().enumerate() {
            if rank > 0 {
                list.advance_time();
            }
            if let Err(err) = list.insert((point.y, point.x)) {
                debug!("dominance index: point at rank {} not inserted: {}", rank, err);
            }
            xs.push(point.x);
        }
        debug!(
            "built dominance index over {} point(s), {} version(s)",
            xs.len(),
            list.versions()
        );
        Self { list, xs }
    }

    /// Number of distinct points
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the index holds no point
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// The underlying skip list, keyed by `(y, x)`
    pub fn list(&self) -> &SkipList<(C, C)> {
        &self.list
    }

    /// Version holding exactly the points with `x >= qx`
    pub fn version_for(&self, qx: C) -> Option<Time> {
        let count = self.xs.partition_point(|x| *x >= qx);
        (count as Time).checked_sub(1)
    }

    fn north_east_iter(&self, qx: C, qy: C) -> impl Iterator<Item = Point<C>> + '_ {
        self.version_for(qx)
            .and_then(|t| self.list.seek_at(t, |&(y, _)| y < qy))
            .into_iter()
            .flat_map(|cursor| cursor.iter())
            .map(|&(y, x)| Point { x, y })
    }

    /// Every point with `x >= qx` and `y >= qy`, ascending by y: `O(log n + k)`
    pub fn north_east(&self, qx: C, qy: C) -> Vec<Point<C>> {
        self.north_east_iter(qx, qy).collect()
    }

    /// Number of points north-east of `(qx, qy)`, counted by walking them
    pub fn count_north_east(&self, qx: C, qy: C) -> usize {
        self.north_east_iter(qx, qy).count()
    }

    /// The north-east point with the largest y, in `O(log n)`
    pub fn highest_north_east(&self, qx: C, qy: C) -> Option<Point<C>> {
        let t = self.version_for(qx)?;
        let &(y, x) = self.list.last_at(t)?.get();
        (y >= qy).then_some(Point { x, y })
    }

    /// The north-east point with the smallest x, lowest y on ties.
    ///
    /// Keys are ordered by y, so this scans every north-east point:
    /// `O(log n + k)`, unlike [`highest_north_east`](Self::highest_north_east).
    pub fn leftmost_north_east(&self, qx: C, qy: C) -> Option<Point<C>> {
        self.north_east_iter(qx, qy)
            .min_by(|a, b| a.x.cmp(&b.x).then(a.y.cmp(&b.y)))
    }
}

#[cfg(not(feature = "parallel"))]
impl<C: Ord + Copy> DominanceIndex<C> {
    /// Answer many north-east queries
    pub fn query_batch(&self, queries: &[(C, C)]) -> Vec<Vec<Point<C>>> {
        queries
            .iter()
            .map(|&(qx, qy)| self.north_east(qx, qy))
            .collect()
    }
}

#[cfg(feature = "parallel")]
impl<C: Ord + Copy + Send + Sync> DominanceIndex<C> {
    /// Answer many north-east queries in parallel
    pub fn query_batch(&self, queries: &[(C, C)]) -> Vec<Vec<Point<C>>> {
        queries
            .par_iter()
            .map(|&(qx, qy)| self.north_east(qx, qy))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DominanceIndex<i32> {
        DominanceIndex::build([
            Point::new(1, 5),
            Point::new(2, 1),
            Point::new(3, 4),
            Point::new(4, 2),
            Point::new(5, 3),
        ])
    }

    #[test]
    fn test_versions_follow_x_rank() {
        let index = sample();
        assert_eq!(index.len(), 5);
        assert_eq!(index.version_for(6), None);
        assert_eq!(index.version_for(5), Some(0));
        assert_eq!(index.version_for(4), Some(1));
        assert_eq!(index.version_for(0), Some(4));
        assert_eq!(index.list().present(), 4);
    }

    #[test]
    fn test_north_east() {
        let index = sample();
        assert_eq!(
            index.north_east(3, 3),
            vec![Point::new(5, 3), Point::new(3, 4)]
        );
        assert_eq!(index.north_east(1, 5), vec![Point::new(1, 5)]);
        assert_eq!(index.north_east(0, 0).len(), 5);
        assert!(index.north_east(6, 0).is_empty());
        assert!(index.north_east(0, 6).is_empty());
        assert_eq!(index.count_north_east(2, 2), 3);
    }

    #[test]
    fn test_highest_and_leftmost() {
        let index = sample();
        assert_eq!(index.highest_north_east(2, 0), Some(Point::new(3, 4)));
        assert_eq!(index.highest_north_east(4, 4), None);
        assert_eq!(index.leftmost_north_east(2, 2), Some(Point::new(3, 4)));
        assert_eq!(index.leftmost_north_east(0, 0), Some(Point::new(1, 5)));
        assert_eq!(index.leftmost_north_east(6, 0), None);
    }

    #[test]
    fn test_ties_and_repeats() {
        let index = DominanceIndex::build([
            Point::new(2, 2),
            Point::new(2, 7),
            Point::new(2, 2),
            Point::new(9, 2),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.north_east(2, 2),
            vec![Point::new(2, 2), Point::new(9, 2), Point::new(2, 7)]
        );
        assert_eq!(index.north_east(3, 0), vec![Point::new(9, 2)]);
        assert_eq!(index.leftmost_north_east(0, 2), Some(Point::new(2, 2)));
        index.list().validate().unwrap();
    }

    #[test]
    fn test_empty_index() {
        let index: DominanceIndex<i64> = DominanceIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.north_east(0, 0).is_empty());
        assert_eq!(index.highest_north_east(0, 0), None);
    }

    #[test]
    fn test_query_batch_matches_single_queries() {
        let index = sample();
        let queries = [(0, 0), (3, 3), (6, 6), (2, 4)];
        let batch = index.query_batch(&queries);
        for (answer, &(qx, qy)) in batch.iter().zip(queries.iter()) {
            assert_eq!(answer, &index.north_east(qx, qy));
        }
    }

    #[test]
    fn test_build_with_config() {
        let config = SkipListConfig::default().with_seed(3).with_max_height(4);
        let index = DominanceIndex::build_with_config([Point::new(0u8, 0u8)], config).unwrap();
        assert_eq!(index.north_east(0, 0), vec![Point::new(0, 0)]);

        let bad = SkipListConfig::default().with_max_height(0);
        assert!(DominanceIndex::<u8>::build_with_config(Vec::new(), bad).is_err());
    }

    #[test]
    fn test_dominates() {
        let p = Point::new(3, 4);
        assert!(p.dominates(&3, &4));
        assert!(!p.dominates(&4, &0));
    }
}
