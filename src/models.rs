//! Data models for the research crew.
//!
//! This module contains the records passed between the crew, the
//! execution wrapper and the notifier. None of them are mutated after
//! construction.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single source surfaced by the search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSource {
    /// Title of the page or paper.
    pub title: String,
    /// Link to the source.
    pub url: String,
    /// Publication date as reported by the search provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    /// Author list, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    /// Ordered key findings.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Optional category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ResearchSource {
    /// Creates a source with only the required fields set.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            publication_date: None,
            authors: None,
            key_findings: Vec::new(),
            category: None,
        }
    }
}

/// Output of the research step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub timestamp: DateTime<Local>,
    pub sources: Vec<ResearchSource>,
    pub summary: String,
}

impl ResearchResult {
    pub fn new(summary: impl Into<String>, sources: Vec<ResearchSource>) -> Self {
        Self {
            timestamp: Local::now(),
            sources,
            summary: summary.into(),
        }
    }
}

/// Output of the analysis step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub timestamp: DateTime<Local>,
    pub executive_summary: String,
    pub trends: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Which list a bullet item belongs to while parsing analysis text.
#[derive(Clone, Copy, PartialEq, Eq)]
enum AnalysisSection {
    Summary,
    Trends,
    Recommendations,
    Other,
}

impl AnalysisResult {
    /// Builds an analysis record from the analyst's free-text answer.
    ///
    /// Bullet items under a heading mentioning "trend" become trends, items
    /// under a heading mentioning "recommend" become recommendations. Text
    /// before the first recognised heading is the executive summary; if no
    /// heading is recognised the whole text is.
    pub fn from_text(text: &str) -> Self {
        let mut section = AnalysisSection::Summary;
        let mut summary_lines = Vec::new();
        let mut trends = Vec::new();
        let mut recommendations = Vec::new();
        let mut saw_heading = false;

        for line in text.lines() {
            let trimmed = line.trim();

            if is_heading(trimmed) {
                let lower = trimmed.to_lowercase();
                if lower.contains("trend") {
                    section = AnalysisSection::Trends;
                    saw_heading = true;
                    continue;
                }
                if lower.contains("recommend") {
                    section = AnalysisSection::Recommendations;
                    saw_heading = true;
                    continue;
                }
                if saw_heading {
                    section = AnalysisSection::Other;
                    continue;
                }
            }

            match section {
                AnalysisSection::Summary => summary_lines.push(line),
                AnalysisSection::Trends => {
                    if let Some(item) = bullet_item(trimmed) {
                        trends.push(item.to_string());
                    }
                }
                AnalysisSection::Recommendations => {
                    if let Some(item) = bullet_item(trimmed) {
                        recommendations.push(item.to_string());
                    }
                }
                AnalysisSection::Other => {}
            }
        }

        Self {
            timestamp: Local::now(),
            executive_summary: summary_lines.join("\n").trim().to_string(),
            trends,
            recommendations,
        }
    }
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
        || (line.starts_with("**") && line.ends_with("**") && line.len() > 4)
        || (line.ends_with(':') && !line.starts_with(['-', '*', '•']))
}

/// Strips a list marker (`-`, `*`, `•`, `1.`, `2)`) from a line.
fn bullet_item(line: &str) -> Option<&str> {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(rest);
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            let rest = rest.trim();
            return (!rest.is_empty()).then_some(rest);
        }
    }

    None
}

/// Status of a crew execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Partial,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failure => write!(f, "failure"),
            ExecutionStatus::Partial => write!(f, "partial"),
        }
    }
}

/// How a crew execution ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    /// The crew produced a report.
    Success { report: String },
    /// The crew finished but the result is incomplete.
    Partial { report: String, warning: String },
    /// The crew failed.
    Failure { error: String },
}

/// Normalized record produced by the execution wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewExecutionResult {
    /// Identifier of the form `exec_<unix seconds>`.
    pub execution_id: String,
    /// When the result was recorded.
    pub timestamp: DateTime<Local>,
    /// Outcome of the run.
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    /// Wall-clock duration of the run.
    pub execution_time_seconds: f64,
}

impl CrewExecutionResult {
    pub fn success(execution_id: String, report: String, seconds: f64) -> Self {
        Self::with_outcome(execution_id, ExecutionOutcome::Success { report }, seconds)
    }

    pub fn partial(execution_id: String, report: String, warning: String, seconds: f64) -> Self {
        Self::with_outcome(
            execution_id,
            ExecutionOutcome::Partial { report, warning },
            seconds,
        )
    }

    pub fn failure(execution_id: String, error: String, seconds: f64) -> Self {
        Self::with_outcome(execution_id, ExecutionOutcome::Failure { error }, seconds)
    }

    fn with_outcome(execution_id: String, outcome: ExecutionOutcome, seconds: f64) -> Self {
        Self {
            execution_id,
            timestamp: Local::now(),
            outcome,
            execution_time_seconds: seconds.max(0.0),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self.outcome {
            ExecutionOutcome::Success { .. } => ExecutionStatus::Success,
            ExecutionOutcome::Partial { .. } => ExecutionStatus::Partial,
            ExecutionOutcome::Failure { .. } => ExecutionStatus::Failure,
        }
    }

    /// Report text; empty for failures.
    pub fn report(&self) -> &str {
        match &self.outcome {
            ExecutionOutcome::Success { report } | ExecutionOutcome::Partial { report, .. } => {
                report
            }
            ExecutionOutcome::Failure { .. } => "",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Failure { error } => Some(error),
            _ => None,
        }
    }
}
