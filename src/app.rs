use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::DataPilotClient;
use crate::domain::{Dataset, TabularFileName, UploadReceipt};
use crate::error::DataPilotError;
use crate::registry::{DatasetRegistry, RefreshTicket};
use crate::session::QuerySession;

/// Shown when a failed question carries no message of its own.
pub const ANSWER_FALLBACK: &str = "Failed to get answer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    /// False when the result was discarded as stale.
    pub applied: bool,
    pub dataset_count: usize,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub receipt: UploadReceipt,
    /// The follow-up refresh; the upload itself succeeded either way.
    pub refresh: Result<RefreshOutcome, DataPilotError>,
}

#[derive(Debug)]
pub enum QuestionOutcome {
    /// Blank question or one already in flight; nothing was sent.
    Rejected(DataPilotError),
    Answered,
    /// Recorded on the session; the transport error is handed back as well.
    Failed(DataPilotError),
}

/// Sequences client calls against the stores it is handed. Holds no dataset or
/// session state of its own.
#[derive(Clone)]
pub struct App<C: DataPilotClient> {
    client: C,
}

impl<C: DataPilotClient> App<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches the registry and replaces the list on success. On failure the list is
    /// left as it was and the error is returned.
    pub fn refresh_datasets(
        &self,
        registry: &mut DatasetRegistry,
    ) -> Result<RefreshOutcome, DataPilotError> {
        let ticket = registry.begin_refresh();
        let fetched = self.fetch_registry();
        self.apply_refresh(registry, ticket, fetched)
    }

    /// The network half of a refresh. Callers that overlap refreshes take a ticket
    /// first, run this off the loop, and hand the result to [`App::apply_refresh`].
    pub fn fetch_registry(&self) -> Result<Vec<Dataset>, DataPilotError> {
        self.client.fetch_registry()
    }

    /// Ends the refresh `ticket` was issued for. The registry's policy decides whether
    /// a late completion still replaces the list.
    pub fn apply_refresh(
        &self,
        registry: &mut DatasetRegistry,
        ticket: RefreshTicket,
        fetched: Result<Vec<Dataset>, DataPilotError>,
    ) -> Result<RefreshOutcome, DataPilotError> {
        let sequence = ticket.sequence();
        match fetched {
            Ok(datasets) => {
                let dataset_count = datasets.len();
                let applied = registry.complete_refresh(ticket, datasets);
                info!(sequence, dataset_count, applied, "registry refreshed");
                Ok(RefreshOutcome {
                    applied,
                    dataset_count,
                })
            }
            Err(err) => {
                registry.abandon_refresh(ticket);
                warn!(sequence, error = %err, "registry refresh failed");
                Err(err)
            }
        }
    }

    /// Checks the extension locally, uploads, then refreshes the registry. The new
    /// dataset is never inserted locally; it shows up through the refresh.
    pub fn submit_upload(
        &self,
        registry: &mut DatasetRegistry,
        file_bytes: &[u8],
        file_name: &str,
    ) -> Result<UploadOutcome, DataPilotError> {
        let file_name: TabularFileName = file_name.parse()?;
        let receipt = self.client.upload_dataset(file_bytes, &file_name)?;
        info!(
            name = %receipt.name,
            rows = receipt.rows,
            columns = receipt.columns,
            "dataset uploaded"
        );
        let refresh = self.refresh_datasets(registry);
        Ok(UploadOutcome { receipt, refresh })
    }

    /// Asks about the currently selected dataset, or lets the backend pick when
    /// nothing is selected. The outcome is recorded on `session`.
    pub fn submit_question(
        &self,
        registry: &DatasetRegistry,
        session: &mut QuerySession,
        question_text: &str,
    ) -> QuestionOutcome {
        let selected = registry.current_selection().cloned();
        if let Err(err) = session.begin(question_text) {
            debug!(reason = %err, "question not submitted");
            return QuestionOutcome::Rejected(err);
        }
        let question = session.question_text().unwrap_or_default().to_string();

        match self.client.ask_question(&question, selected.as_ref()) {
            Ok(answer) => {
                if let Err(err) = session.succeed(answer) {
                    warn!(error = %err, "answer could not be recorded");
                }
                QuestionOutcome::Answered
            }
            Err(err) => {
                let message = err.to_string();
                let message = if message.trim().is_empty() {
                    ANSWER_FALLBACK.to_string()
                } else {
                    message
                };
                if let Err(state) = session.fail(message) {
                    warn!(error = %state, "failure could not be recorded");
                }
                QuestionOutcome::Failed(err)
            }
        }
    }
}
