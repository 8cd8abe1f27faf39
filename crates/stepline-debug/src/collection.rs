//! Observable ordered collections of breakpoints and watch expressions.
//! - ObservableList: insertion-ordered list that reports every structural change
//! - CollectionObserver: callbacks fired around each change
//! - BreakpointCollection / WatchCollection: key lookups and persistence

use std::ops::Range;
use std::path::Path;

use crate::breakpoint::{Breakpoint, BreakpointRecord};
use crate::project::ProjectRoot;
use crate::watch::{WatchExpression, WatchSpecial};

/// Receives change notifications from an [`ObservableList`].
///
/// Removal and change callbacks fire in pairs: the `about_to` half sees the
/// entries as they are before the edit.
pub trait CollectionObserver<T> {
    fn on_inserted(&mut self, _range: Range<usize>, _items: &[T]) {}
    fn on_about_to_remove(&mut self, _range: Range<usize>, _items: &[T]) {}
    fn on_removed(&mut self, _range: Range<usize>) {}
    fn on_about_to_change(&mut self, _index: usize, _old: &T) {}
    fn on_changed(&mut self, _index: usize, _new: &T) {}
}

/// Entries that can be switched on and off.
pub trait Toggle {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
}

impl Toggle for Breakpoint {
    fn is_enabled(&self) -> bool {
        Breakpoint::is_enabled(self)
    }

    fn set_enabled(&mut self, enabled: bool) {
        Breakpoint::set_enabled(self, enabled);
    }
}

impl Toggle for WatchExpression {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

pub struct ObservableList<T> {
    items: Vec<T>,
    observers: Vec<Box<dyn CollectionObserver<T>>>,
}

pub type BreakpointCollection = ObservableList<Breakpoint>;
pub type WatchCollection = ObservableList<WatchExpression>;

impl<T> Default for ObservableList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            observers: Vec::new(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableList")
            .field("items", &self.items)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<T> ObservableList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn CollectionObserver<T>>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert `entries` before `at`; `at` past the end appends.
    pub fn insert(&mut self, entries: Vec<T>, at: usize) {
        if entries.is_empty() {
            return;
        }
        let at = at.min(self.items.len());
        let count = entries.len();
        self.items.splice(at..at, entries);
        let range = at..at + count;
        for observer in &mut self.observers {
            observer.on_inserted(range.clone(), &self.items[range.clone()]);
        }
    }

    pub fn append(&mut self, entry: T) {
        let at = self.items.len();
        self.insert(vec![entry], at);
    }

    /// Remove the half-open `range`, clamped to the list.
    pub fn remove_range(&mut self, range: Range<usize>) -> Vec<T> {
        let end = range.end.min(self.items.len());
        let range = range.start.min(end)..end;
        if range.is_empty() {
            return Vec::new();
        }
        for observer in &mut self.observers {
            observer.on_about_to_remove(range.clone(), &self.items[range.clone()]);
        }
        let removed: Vec<T> = self.items.drain(range.clone()).collect();
        for observer in &mut self.observers {
            observer.on_removed(range.clone());
        }
        removed
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        self.remove_range(index..index + 1).into_iter().next()
    }

    /// Remove several entries by index, highest first.
    pub fn remove_many(&mut self, indices: &[usize]) -> usize {
        let mut indices = indices.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        indices
            .into_iter()
            .filter(|&index| self.remove_at(index).is_some())
            .count()
    }

    pub fn delete_all(&mut self) -> Vec<T> {
        self.remove_range(0..self.items.len())
    }

    /// Replace the entry at `index`, returning the old one.
    pub fn update_at(&mut self, index: usize, new: T) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        for observer in &mut self.observers {
            observer.on_about_to_change(index, &self.items[index]);
        }
        let old = std::mem::replace(&mut self.items[index], new);
        for observer in &mut self.observers {
            observer.on_changed(index, &self.items[index]);
        }
        Some(old)
    }

    /// Edit the entry at `index` in place, with change notifications.
    pub fn modify_at(&mut self, index: usize, edit: impl FnOnce(&mut T)) -> bool {
        if index >= self.items.len() {
            return false;
        }
        for observer in &mut self.observers {
            observer.on_about_to_change(index, &self.items[index]);
        }
        edit(&mut self.items[index]);
        for observer in &mut self.observers {
            observer.on_changed(index, &self.items[index]);
        }
        true
    }
}

impl<T: Toggle> ObservableList<T> {
    pub fn set_enabled_at(&mut self, index: usize, enabled: bool) -> bool {
        self.modify_at(index, |entry| entry.set_enabled(enabled))
    }

    /// `(enabled, disabled)` entry counts.
    #[must_use]
    pub fn enabled_disabled_counts(&self) -> (usize, usize) {
        let enabled = self.items.iter().filter(|entry| entry.is_enabled()).count();
        (enabled, self.items.len() - enabled)
    }
}

impl<'a, T> IntoIterator for &'a ObservableList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl ObservableList<Breakpoint> {
    /// Index of the breakpoint at absolute `file` and `line`.
    #[must_use]
    pub fn index_of(&self, project: &dyn ProjectRoot, file: &Path, line: u32) -> Option<usize> {
        self.items.iter().position(|bp| {
            bp.line() == line && bp.absolute_path(project).as_deref() == Some(file)
        })
    }

    pub fn update_line_at(&mut self, index: usize, line: u32) -> bool {
        self.modify_at(index, |bp| bp.update_line_number(line))
    }

    /// Append the valid breakpoints among `records`. Returns how many were
    /// kept.
    pub fn restore(&mut self, records: &[BreakpointRecord], project: &dyn ProjectRoot) -> usize {
        let restored: Vec<Breakpoint> = records
            .iter()
            .filter_map(|record| {
                let mut bp = Breakpoint::default();
                if bp.deserialize(record, project) {
                    Some(bp)
                } else {
                    tracing::warn!(
                        "dropping persisted breakpoint {}",
                        bp.location(project, true)
                    );
                    None
                }
            })
            .collect();
        let kept = restored.len();
        let at = self.items.len();
        self.insert(restored, at);
        kept
    }

    #[must_use]
    pub fn records(&self) -> Vec<BreakpointRecord> {
        self.items.iter().map(Breakpoint::serialize).collect()
    }
}

impl ObservableList<WatchExpression> {
    #[must_use]
    pub fn index_of(&self, condition: &str, special: Option<WatchSpecial>) -> Option<usize> {
        self.items
            .iter()
            .position(|watch| watch.matches(condition, special))
    }
}
