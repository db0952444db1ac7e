//! Ad-hoc predicate queries over one entity set.
//!
//! A query carries a human-readable description next to its predicates so a
//! failed lookup can say *which* query produced nothing.

use std::cmp::Ordering;
use std::fmt;

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type Comparator<E> = Box<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

pub struct Query<E> {
    filters: Vec<(String, Predicate<E>)>,
    order: Option<(String, Comparator<E>)>,
    limit: Option<usize>,
}

impl<E> Query<E> {
    /// Every row of the set, in key order.
    pub fn all() -> Self {
        Self {
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Keep rows matching `predicate`. Filters are combined with "and".
    pub fn filter<F>(mut self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filters.push((description.into(), Box::new(predicate)));
        self
    }

    /// Sort by `key` (stable, ties keep key order). Replaces an earlier ordering.
    pub fn order_by<K, F>(mut self, description: impl Into<String>, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.order = Some((
            description.into(),
            Box::new(move |a: &E, b: &E| key(a).cmp(&key(b))),
        ));
        self
    }

    pub fn take(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entity: &E) -> bool {
        self.filters.iter().all(|(_, predicate)| predicate(entity))
    }

    /// Evaluate against `rows` (already in key order).
    pub fn apply(&self, rows: impl IntoIterator<Item = E>) -> Vec<E> {
        let mut matched: Vec<E> = rows.into_iter().filter(|e| self.matches(e)).collect();
        if let Some((_, compare)) = &self.order {
            matched.sort_by(|a, b| compare(a, b));
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Self::all()
    }
}

impl<E> fmt::Display for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("all")?;
        for (i, (description, _)) in self.filters.iter().enumerate() {
            let joiner = if i == 0 { " where " } else { " and " };
            write!(f, "{joiner}{description}")?;
        }
        if let Some((description, _)) = &self.order {
            write!(f, " order by {description}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " take {limit}")?;
        }
        Ok(())
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Query").field(&self.to_string()).finish()
    }
}
