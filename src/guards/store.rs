//! Session-scoped guard list keyed by group label
//!
//! Readers take a lock-free snapshot. Every write clones the list, changes
//! exactly one label's entry and swaps the new list in with `rcu`, so
//! concurrent flows for different groups never see each other's partial
//! updates.

use super::eligibility::normalize;
use crate::types::EligibilityResult;
use arc_swap::ArcSwap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEntry {
    pub result: EligibilityResult,
    /// A mint attempt for this group is in flight
    pub minting: bool,
    pub loading_text: Option<String>,
    /// Quantity selected for the next mint, within 1..=max(1, max_amount)
    pub quantity: u64,
}

impl GuardEntry {
    fn new(result: EligibilityResult) -> Self {
        Self {
            result,
            minting: false,
            loading_text: None,
            quantity: 1,
        }
    }

    fn clamp(&self, quantity: u64) -> u64 {
        quantity.clamp(1, self.result.max_amount.max(1))
    }
}

#[derive(Debug)]
pub struct GuardStore {
    entries: ArcSwap<Vec<GuardEntry>>,
}

impl Default for GuardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardStore {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<GuardEntry>> {
        self.entries.load_full()
    }

    pub fn get(&self, label: &str) -> Option<GuardEntry> {
        self.entries
            .load()
            .iter()
            .find(|e| e.result.label == label)
            .cloned()
    }

    /// Replace the eligibility results. Labels are deduplicated (first wins)
    /// and `default` is dropped when other groups exist. Per-label UI state
    /// of surviving labels is kept.
    pub fn ingest(&self, results: Vec<EligibilityResult>) {
        let results = normalize(results);
        self.entries.rcu(|current| {
            results
                .iter()
                .map(|result| {
                    let mut entry = match current.iter().find(|e| e.result.label == result.label) {
                        Some(existing) => GuardEntry {
                            result: result.clone(),
                            ..existing.clone()
                        },
                        None => GuardEntry::new(result.clone()),
                    };
                    entry.quantity = entry.clamp(entry.quantity);
                    entry
                })
                .collect::<Vec<_>>()
        });
    }

    /// Copy-on-write update of one label's entry; other labels are untouched
    pub fn update<F>(&self, label: &str, f: F)
    where
        F: Fn(&mut GuardEntry),
    {
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            if let Some(entry) = next.iter_mut().find(|e| e.result.label == label) {
                f(entry);
            }
            next
        });
    }

    pub fn set_minting(&self, label: &str, minting: bool) {
        self.update(label, |e| e.minting = minting);
    }

    pub fn set_loading_text(&self, label: &str, text: Option<&str>) {
        self.update(label, |e| e.loading_text = text.map(str::to_string));
    }

    pub fn set_quantity(&self, label: &str, quantity: u64) {
        self.update(label, |e| e.quantity = e.clamp(quantity));
    }

    pub fn increment(&self, label: &str) {
        self.update(label, |e| e.quantity = e.clamp(e.quantity.saturating_add(1)));
    }

    pub fn decrement(&self, label: &str) {
        self.update(label, |e| e.quantity = e.clamp(e.quantity.saturating_sub(1)));
    }

    pub fn is_minting(&self) -> bool {
        self.entries.load().iter().any(|e| e.minting)
    }
}
