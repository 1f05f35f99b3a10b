use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Dataset, DatasetId};

/// How completions of overlapping refreshes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Whichever refresh completes last replaces the list.
    #[default]
    LastWriteWins,
    /// A completion older than the last applied one is discarded.
    DropStale,
}

/// Handed out by [`DatasetRegistry::begin_refresh`]; must be given back exactly once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a refresh ticket must be completed or abandoned"]
pub struct RefreshTicket {
    sequence: u64,
}

impl RefreshTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Client-held list of known datasets plus the current selection.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: Vec<Dataset>,
    selected_id: Option<DatasetId>,
    policy: RefreshPolicy,
    issued: u64,
    applied: u64,
    in_flight: usize,
}

impl DatasetRegistry {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn current_selection(&self) -> Option<&DatasetId> {
        self.selected_id.as_ref()
    }

    /// Replaces the list. Selects the newest dataset only if nothing was ever selected;
    /// an existing selection is kept even when the new list no longer contains it.
    pub fn replace_all(&mut self, datasets: Vec<Dataset>) {
        if self.selected_id.is_none()
            && let Some(newest) = datasets.last()
        {
            debug!(dataset_id = %newest.id, "defaulting selection to newest dataset");
            self.selected_id = Some(newest.id.clone());
        }
        self.datasets = datasets;
    }

    /// No existence check: the id may belong to a dataset a pending refresh has not shown yet.
    pub fn select(&mut self, id: DatasetId) {
        self.selected_id = Some(id);
    }

    /// The selected dataset if it is in the current list; a dangling selection yields `None`.
    pub fn selected_dataset(&self) -> Option<&Dataset> {
        let selected = self.selected_id.as_ref()?;
        self.datasets.iter().find(|dataset| &dataset.id == selected)
    }

    pub fn is_selected(&self, id: &DatasetId) -> bool {
        self.selected_id.as_ref() == Some(id)
    }

    pub fn total_rows(&self) -> u64 {
        self.datasets.iter().map(|dataset| dataset.row_count).sum()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        self.in_flight += 1;
        RefreshTicket {
            sequence: self.issued,
        }
    }

    /// Applies a fetched list per the refresh policy; returns whether it was applied.
    pub fn complete_refresh(&mut self, ticket: RefreshTicket, datasets: Vec<Dataset>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.policy == RefreshPolicy::DropStale && ticket.sequence < self.applied {
            debug!(
                sequence = ticket.sequence,
                applied = self.applied,
                "discarding stale refresh"
            );
            return false;
        }
        self.applied = self.applied.max(ticket.sequence);
        self.replace_all(datasets);
        true
    }

    /// Ends a refresh that produced nothing; the list is left untouched.
    pub fn abandon_refresh(&mut self, _ticket: RefreshTicket) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}
