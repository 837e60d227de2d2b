//! Ranking items by how well their key approximates a reference string.

use crate::matcher::{ApproximateStringMatcher, WeightedLevenshteinMatcher};

#[derive(Debug, Clone, Default)]
pub struct BestStringApproximationDeterminer<M = WeightedLevenshteinMatcher> {
    matcher: M,
}

impl<M: ApproximateStringMatcher> BestStringApproximationDeterminer<M> {
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    /// Items ordered best match first.
    ///
    /// Items the matcher rejects are dropped. Equal scores keep their input
    /// order. With `limit`, at most that many items are returned.
    pub fn determine<T, F>(
        &self,
        items: impl IntoIterator<Item = T>,
        reference: &str,
        key: F,
        limit: Option<usize>,
    ) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let mut scored: Vec<(f64, T)> = items
            .into_iter()
            .filter_map(|item| {
                let score = self.matcher.score(key(&item), reference)?;
                Some((score, item))
            })
            .collect();

        // `sort_by` is stable.
        scored.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        if let Some(limit) = limit {
            scored.truncate(limit);
        }
        scored.into_iter().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn determiner() -> BestStringApproximationDeterminer {
        BestStringApproximationDeterminer::default()
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<String> = Vec::new();
        assert!(determiner()
            .determine(items, "foo", |s| s.as_str(), Some(5))
            .is_empty());
    }

    #[test]
    fn test_orders_by_score_and_drops_rejected() {
        let items = vec!["fooBarBaz", "test", "foo", "fooBar"];
        let ranked = determiner().determine(items, "foo", |s| *s, None);
        assert_eq!(ranked, vec!["foo", "fooBar", "fooBarBaz"]);
    }

    #[test]
    fn test_limit_truncates() {
        let items = vec!["foo", "fooBar", "fooBarBaz"];
        let ranked = determiner().determine(items, "foo", |s| *s, Some(2));
        assert_eq!(ranked, vec!["foo", "fooBar"]);
        let none = determiner().determine(vec!["foo"], "foo", |s| *s, Some(0));
        assert!(none.is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        #[derive(Debug, PartialEq)]
        struct Item(&'static str, u32);

        let items = vec![Item("Y\\X", 1), Item("X\\X", 2), Item("Z\\X", 3)];
        let ranked = determiner().determine(items, "X", |item| item.0, None);
        let ids: Vec<u32> = ranked.iter().map(|item| item.1).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_output_is_sorted_ascending() {
        let matcher = WeightedLevenshteinMatcher;
        let items = vec!["getter", "get", "budget", "target", "gadget", "forget"];
        let ranked = determiner().determine(items, "get", |s| *s, None);
        let scores: Vec<f64> = ranked
            .iter()
            .map(|s| matcher.score(s, "get").unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ranked[0], "get");
    }

    #[test]
    fn test_keyed_map_entries() {
        let mut map = BTreeMap::new();
        map.insert("alpha", 1);
        map.insert("alphabet", 2);
        map.insert("beta", 3);
        let ranked = determiner().determine(map.iter(), "alpha", |(key, _)| **key, None);
        let values: Vec<i32> = ranked.into_iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_borrowed_items() {
        let owned = vec!["abc".to_string(), "abcd".to_string()];
        let ranked = determiner().determine(&owned, "abcd", |s| s.as_str(), None);
        assert_eq!(ranked, vec![&owned[1], &owned[0]]);
    }
}
