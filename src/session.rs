use serde::Serialize;

use crate::domain::Answer;
use crate::error::DataPilotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Idle,
    Pending,
    Answered,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum QueryState {
    #[default]
    Idle,
    Pending,
    Answered(Answer),
    Failed(String),
}

/// The single live question/answer exchange of a session.
///
/// `idle -> pending -> answered | failed`; a terminal state lasts until the next
/// [`begin`](Self::begin). At most one exchange is pending at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySession {
    state: QueryState,
    question_text: Option<String>,
    detail_visible: bool,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> QueryStatus {
        match self.state {
            QueryState::Idle => QueryStatus::Idle,
            QueryState::Pending => QueryStatus::Pending,
            QueryState::Answered(_) => QueryStatus::Answered,
            QueryState::Failed(_) => QueryStatus::Failed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == QueryState::Pending
    }

    pub fn question_text(&self) -> Option<&str> {
        self.question_text.as_deref()
    }

    pub fn answer(&self) -> Option<&Answer> {
        match &self.state {
            QueryState::Answered(answer) => Some(answer),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            QueryState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn detail_visible(&self) -> bool {
        self.detail_visible
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Enters `pending` with the trimmed question. Rejected without any change when the
    /// question is blank or another exchange is still pending.
    pub fn begin(&mut self, question_text: &str) -> Result<(), DataPilotError> {
        let trimmed = question_text.trim();
        if trimmed.is_empty() {
            return Err(DataPilotError::EmptyQuestion);
        }
        if self.is_pending() {
            return Err(DataPilotError::QuestionPending);
        }
        self.state = QueryState::Pending;
        self.question_text = Some(trimmed.to_string());
        self.detail_visible = false;
        Ok(())
    }

    pub fn succeed(&mut self, answer: Answer) -> Result<(), DataPilotError> {
        if !self.is_pending() {
            return Err(DataPilotError::NoPendingQuestion);
        }
        self.state = QueryState::Answered(answer);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), DataPilotError> {
        if !self.is_pending() {
            return Err(DataPilotError::NoPendingQuestion);
        }
        self.state = QueryState::Failed(message.into());
        Ok(())
    }

    /// Flips detail visibility regardless of status; returns the new value.
    pub fn toggle_detail(&mut self) -> bool {
        self.detail_visible = !self.detail_visible;
        self.detail_visible
    }
}
