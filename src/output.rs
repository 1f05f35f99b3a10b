use std::fmt::Write as _;
use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{Answer, Dataset, DatasetId, UploadReceipt};
use crate::registry::DatasetRegistry;
use crate::session::{QuerySession, QueryStatus};

pub const NO_SELECTION_NOTICE: &str = "No dataset selected. The AI will use the latest dataset.";
pub const EMPTY_REGISTRY: &str = "No datasets uploaded yet";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Serialize)]
pub struct RegistryView<'a> {
    pub datasets: &'a [Dataset],
    pub selected_id: Option<&'a DatasetId>,
    pub total_rows: u64,
}

impl<'a> From<&'a DatasetRegistry> for RegistryView<'a> {
    fn from(registry: &'a DatasetRegistry) -> Self {
        Self {
            datasets: registry.datasets(),
            selected_id: registry.current_selection(),
            total_rows: registry.total_rows(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub status: QueryStatus,
    pub question: Option<&'a str>,
    pub answer: Option<&'a Answer>,
    pub error: Option<&'a str>,
}

impl<'a> From<&'a QuerySession> for SessionView<'a> {
    fn from(session: &'a QuerySession) -> Self {
        Self {
            status: session.status(),
            question: session.question_text(),
            answer: session.answer(),
            error: session.error_message(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_registry(registry: &DatasetRegistry) -> io::Result<()> {
        Self::print_json(&RegistryView::from(registry))
    }

    pub fn print_session(session: &QuerySession) -> io::Result<()> {
        Self::print_json(&SessionView::from(session))
    }

    pub fn print_upload(receipt: &UploadReceipt) -> io::Result<()> {
        Self::print_json(receipt)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// `1234567` -> `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_registry(registry: &DatasetRegistry) -> String {
    if registry.is_loading() {
        return "Loading datasets...\n".to_string();
    }
    if registry.is_empty() {
        return format!("{EMPTY_REGISTRY}\n");
    }
    let mut out = String::new();
    for dataset in registry.datasets() {
        let marker = if registry.is_selected(&dataset.id) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{marker} {}  {} rows × {} columns  [{}]",
            dataset.name,
            format_count(dataset.row_count),
            dataset.column_count,
            dataset.id
        );
    }
    match (registry.current_selection(), registry.selected_dataset()) {
        (None, _) => {
            let _ = writeln!(out, "{NO_SELECTION_NOTICE}");
        }
        (Some(id), None) => {
            let _ = writeln!(out, "Selected dataset {id} is no longer listed.");
        }
        (Some(_), Some(_)) => {}
    }
    out
}

pub fn render_session(session: &QuerySession) -> String {
    let mut out = String::new();
    match session.status() {
        QueryStatus::Idle => {}
        QueryStatus::Pending => out.push_str("Processing...\n"),
        QueryStatus::Failed => {
            let _ = writeln!(out, "Error: {}", session.error_message().unwrap_or_default());
        }
        QueryStatus::Answered => {
            if let Some(answer) = session.answer() {
                render_answer(&mut out, answer, session.detail_visible());
            }
        }
    }
    out
}

fn render_answer(out: &mut String, answer: &Answer, detail_visible: bool) {
    let _ = writeln!(out, "Answer [{}]", answer.provider_label);
    let _ = writeln!(out, "{}", answer.text);
    if answer.has_detail() {
        if detail_visible {
            if let Some(reasoning) = answer.reasoning.as_deref().filter(|text| !text.is_empty()) {
                let _ = writeln!(out, "\nReasoning:\n{reasoning}");
            }
            if let Some(code) = answer.code.as_deref().filter(|text| !text.is_empty()) {
                let _ = writeln!(out, "\nCode:\n{code}");
            }
        } else {
            out.push_str("(reasoning & code hidden; toggle with :details)\n");
        }
    }
    if let Some(dataset_id) = &answer.dataset_id {
        let _ = writeln!(out, "\nDataset ID: {dataset_id}");
    }
}
