//! Saved-state badges on a page, reconciled from catalog lookups.
//!
//! Every pass over the page bumps the epoch and re-registers each slot with
//! a fresh instance token. A lookup result only lands if both still match,
//! so answers from an earlier pass cannot paint a badge that has since
//! been replaced.

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::db::IsNew;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AffordanceState {
    #[default]
    Unsaved,
    SavedNew,
    SavedWatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffordanceKey {
    Id(String),
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied(AffordanceState),
    Unchanged,
    /// Watched back to new; never taken.
    Refused,
}

impl AffordanceState {
    /// Next state given a lookup result (`None` = not in the catalog).
    pub fn on_lookup(self, lookup: Option<IsNew>) -> Transition {
        use AffordanceState::*;
        match (self, lookup) {
            (_, None) => Transition::Unchanged,
            (Unsaved, Some(IsNew::Yes)) => Transition::Applied(SavedNew),
            (Unsaved, Some(IsNew::No)) => Transition::Applied(SavedWatched),
            (SavedNew, Some(IsNew::No)) => Transition::Applied(SavedWatched),
            (SavedNew, Some(IsNew::Yes)) | (SavedWatched, Some(IsNew::No)) => {
                Transition::Unchanged
            }
            (SavedWatched, Some(IsNew::Yes)) => Transition::Refused,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Affordance {
    pub key: AffordanceKey,
    pub instance: Uuid,
    pub state: AffordanceState,
}

/// One slot to resolve during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassEntry {
    pub slot: String,
    pub instance: Uuid,
    pub key: AffordanceKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTicket {
    pub epoch: u64,
    pub entries: Vec<PassEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(AffordanceState),
    Unchanged,
    Refused,
    Stale,
}

#[derive(Debug, Default)]
pub struct AffordanceBoard {
    epoch: u64,
    slots: HashMap<String, Affordance>,
}

impl AffordanceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replace the board with freshly discovered affordances, all Unsaved.
    pub fn begin_pass(&mut self, targets: Vec<(String, AffordanceKey)>) -> PassTicket {
        self.epoch += 1;
        self.slots.clear();

        let entries = targets
            .into_iter()
            .map(|(slot, key)| {
                let instance = Uuid::new_v4();
                self.slots.insert(
                    slot.clone(),
                    Affordance {
                        key: key.clone(),
                        instance,
                        state: AffordanceState::Unsaved,
                    },
                );
                PassEntry {
                    slot,
                    instance,
                    key,
                }
            })
            .collect();

        PassTicket {
            epoch: self.epoch,
            entries,
        }
    }

    pub fn apply(&mut self, epoch: u64, entry: &PassEntry, lookup: Option<IsNew>) -> ApplyOutcome {
        if epoch != self.epoch {
            debug!(
                "dropping stale lookup for {} (epoch {epoch}, current {})",
                entry.slot, self.epoch
            );
            return ApplyOutcome::Stale;
        }
        let Some(affordance) = self.slots.get_mut(&entry.slot) else {
            return ApplyOutcome::Stale;
        };
        if affordance.instance != entry.instance {
            debug!("dropping lookup for replaced affordance {}", entry.slot);
            return ApplyOutcome::Stale;
        }

        match affordance.state.on_lookup(lookup) {
            Transition::Applied(next) => {
                affordance.state = next;
                ApplyOutcome::Applied(next)
            }
            Transition::Unchanged => ApplyOutcome::Unchanged,
            Transition::Refused => {
                warn!(
                    "refusing to mark watched affordance {} as new again",
                    entry.slot
                );
                ApplyOutcome::Refused
            }
        }
    }

    pub fn state(&self, slot: &str) -> Option<AffordanceState> {
        self.slots.get(slot).map(|affordance| affordance.state)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(slot: &str) -> (String, AffordanceKey) {
        (
            slot.to_string(),
            AffordanceKey::Url(format!("https://x/{slot}")),
        )
    }

    #[test]
    fn transitions_follow_lookup() {
        use AffordanceState::*;
        assert_eq!(
            Unsaved.on_lookup(Some(IsNew::Yes)),
            Transition::Applied(SavedNew)
        );
        assert_eq!(
            Unsaved.on_lookup(Some(IsNew::No)),
            Transition::Applied(SavedWatched)
        );
        assert_eq!(
            SavedNew.on_lookup(Some(IsNew::No)),
            Transition::Applied(SavedWatched)
        );
        assert_eq!(SavedNew.on_lookup(None), Transition::Unchanged);
        assert_eq!(Unsaved.on_lookup(None), Transition::Unchanged);
        assert_eq!(SavedWatched.on_lookup(Some(IsNew::Yes)), Transition::Refused);
    }

    #[test]
    fn current_pass_results_apply() {
        let mut board = AffordanceBoard::new();
        let ticket = board.begin_pass(vec![url("a"), url("b")]);
        assert_eq!(board.len(), 2);

        let a = &ticket.entries[0];
        assert_eq!(
            board.apply(ticket.epoch, a, Some(IsNew::Yes)),
            ApplyOutcome::Applied(AffordanceState::SavedNew)
        );
        assert_eq!(
            board.apply(ticket.epoch, a, Some(IsNew::No)),
            ApplyOutcome::Applied(AffordanceState::SavedWatched)
        );
        assert_eq!(
            board.apply(ticket.epoch, a, Some(IsNew::Yes)),
            ApplyOutcome::Refused
        );
        assert_eq!(board.state("a"), Some(AffordanceState::SavedWatched));
        assert_eq!(board.state("b"), Some(AffordanceState::Unsaved));
    }

    #[test]
    fn results_from_an_old_pass_are_discarded() {
        let mut board = AffordanceBoard::new();
        let first = board.begin_pass(vec![url("a")]);
        let second = board.begin_pass(vec![url("a")]);
        assert!(second.epoch > first.epoch);

        assert_eq!(
            board.apply(first.epoch, &first.entries[0], Some(IsNew::Yes)),
            ApplyOutcome::Stale
        );
        assert_eq!(board.state("a"), Some(AffordanceState::Unsaved));

        assert_eq!(
            board.apply(second.epoch, &second.entries[0], Some(IsNew::Yes)),
            ApplyOutcome::Applied(AffordanceState::SavedNew)
        );
    }

    #[test]
    fn replaced_instance_is_discarded_even_with_current_epoch() {
        let mut board = AffordanceBoard::new();
        let ticket = board.begin_pass(vec![url("a")]);
        let forged = PassEntry {
            instance: Uuid::new_v4(),
            ..ticket.entries[0].clone()
        };
        assert_eq!(
            board.apply(ticket.epoch, &forged, Some(IsNew::Yes)),
            ApplyOutcome::Stale
        );

        let gone = PassEntry {
            slot: "removed".into(),
            ..ticket.entries[0].clone()
        };
        assert_eq!(board.apply(ticket.epoch, &gone, None), ApplyOutcome::Stale);
    }

    #[test]
    fn new_pass_drops_slots_no_longer_on_page() {
        let mut board = AffordanceBoard::new();
        assert!(board.is_empty());
        board.begin_pass(vec![url("a"), url("b")]);
        let ticket = board.begin_pass(vec![url("b")]);
        assert_eq!(board.epoch(), ticket.epoch);
        assert!(board.state("a").is_none());
        assert_eq!(board.len(), 1);
    }
}
