//! The staged progress contract emitted by the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stages in run order. `Failed` is terminal and replaces `Done` when a run
/// surfaces an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStage {
    Discovering,
    Estimating,
    CheckingCache,
    Extracting,
    Integrating,
    DetectingCycles,
    Assembling,
    Caching,
    Done,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Discovering => "discovering",
            AnalysisStage::Estimating => "estimating",
            AnalysisStage::CheckingCache => "checking-cache",
            AnalysisStage::Extracting => "extracting",
            AnalysisStage::Integrating => "integrating",
            AnalysisStage::DetectingCycles => "detecting-cycles",
            AnalysisStage::Assembling => "assembling",
            AnalysisStage::Caching => "caching",
            AnalysisStage::Done => "done",
            AnalysisStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One progress record. `progress` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: AnalysisStage,
    pub progress: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: AnalysisStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            current_file: None,
            files_processed: None,
            total_files: None,
        }
    }

    pub fn with_file(mut self, current_file: impl Into<String>) -> Self {
        self.current_file = Some(current_file.into());
        self
    }

    pub fn with_counts(mut self, processed: usize, total: usize) -> Self {
        self.files_processed = Some(processed);
        self.total_files = Some(total);
        self
    }
}

/// Receives progress updates from the orchestrator's thread.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: &ProgressUpdate);
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _update: &ProgressUpdate) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn update(&self, update: &ProgressUpdate) {
        self(update)
    }
}
