//! Per-entity time series with a strict ordering invariant.
//!
//! A `Series<T>` is always sorted ascending by date with no duplicate dates.
//! Duplicates are resolved keep-latest: among records sharing a date, the one
//! that appeared last in the input wins.

use chrono::NaiveDate;

/// Anything observed on a calendar date.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    items: Vec<T>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Dated> Series<T> {
    /// Build from records in arbitrary order: stable sort, then keep the last
    /// record of each run of equal dates.
    pub fn from_unsorted(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.date());
        Self {
            items: dedup_keep_last(items),
        }
    }

    /// Build from records that must already be non-decreasing by date.
    ///
    /// Returns the index of the first record whose date is earlier than its
    /// predecessor's. Equal dates are allowed and resolved keep-latest.
    pub fn from_sorted(items: Vec<T>) -> Result<Self, usize> {
        if let Some(index) = first_unsorted_index(&items) {
            return Err(index);
        }
        Ok(Self {
            items: dedup_keep_last(items),
        })
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.items.iter().map(Dated::date).collect()
    }
}

impl<T> Series<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Index of the first record dated before the record preceding it.
pub fn first_unsorted_index<T: Dated>(items: &[T]) -> Option<usize> {
    items
        .windows(2)
        .position(|pair| pair[1].date() < pair[0].date())
        .map(|i| i + 1)
}

fn dedup_keep_last<T: Dated>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match out.last_mut() {
            Some(last) if last.date() == item.date() => *last = item,
            _ => out.push(item),
        }
    }
    out
}
