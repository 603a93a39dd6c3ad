//! Session recorder: an append-only Markdown log, one file per session.
//!
//! Every step is written as its own append so a later failure can never
//! clobber steps already on disk. `seal` writes the closing summary once
//! and is the session's only guaranteed cleanup action.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::errors::RecorderError;
use crate::llm::schema::{UiAction, UxAudit, UxStatus};

/// Seam over the session log so the loop can run against a fake.
pub trait Recorder: Send {
    /// Append one step block. A failure here is isolated and surfaced,
    /// never retried, and never damages prior content.
    fn record_step(
        &mut self,
        index: u32,
        action: &UiAction,
        reasoning: &str,
        ux: &UxAudit,
    ) -> Result<(), RecorderError>;

    /// Write the closing summary and flush. Called exactly once per
    /// session, whatever terminal state was reached.
    fn seal(&mut self, termination_reason: &str) -> Result<(), RecorderError>;
}

/// Markdown session log under a reports directory, named by start time.
pub struct MarkdownRecorder {
    path: PathBuf,
    goal: String,
    step_count: u32,
    ux_failures: Vec<(u32, String)>,
}

impl MarkdownRecorder {
    pub fn create(reports_dir: &Path, goal: &str) -> Result<Self, RecorderError> {
        fs::create_dir_all(reports_dir).map_err(|source| RecorderError::Create {
            path: reports_dir.display().to_string(),
            source,
        })?;

        let started = Local::now();
        let path = reports_dir.join(format!("{}_session.md", started.format("%Y%m%d_%H%M%S")));

        let header = format!(
            "# UXPilot Session Report\n\n**Date:** {}\n**Goal:** {}\n\n---\n\n",
            started.format("%Y-%m-%d %H:%M:%S"),
            goal
        );
        fs::write(&path, header).map_err(|source| RecorderError::Create {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            path,
            goal: goal.to_string(),
            step_count: 0,
            ux_failures: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, block: &str) -> Result<(), std::io::Error> {
        // A fresh append-only handle per write: no seeking, no rewrite of
        // earlier content.
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(block.as_bytes())?;
        file.flush()
    }
}

impl Recorder for MarkdownRecorder {
    fn record_step(
        &mut self,
        index: u32,
        action: &UiAction,
        reasoning: &str,
        ux: &UxAudit,
    ) -> Result<(), RecorderError> {
        let ux_line = match (&ux.status, ux.issue.as_deref()) {
            (UxStatus::Fail, Some(issue)) => format!("FAIL - {issue}"),
            (UxStatus::Fail, None) => "FAIL".to_string(),
            (UxStatus::Pass, _) => "PASS".to_string(),
        };

        let block = format!(
            "## Step {index}\n\n**Action:** {}\n**Reasoning:** {reasoning}\n**UX Status:** {ux_line}\n\n---\n\n",
            action.summary()
        );
        self.append(&block)
            .map_err(|source| RecorderError::Append { index, source })?;

        self.step_count = self.step_count.max(index);
        if ux.status == UxStatus::Fail {
            self.ux_failures.push((
                index,
                ux.issue
                    .clone()
                    .unwrap_or_else(|| "unspecified issue".to_string()),
            ));
        }
        Ok(())
    }

    fn seal(&mut self, termination_reason: &str) -> Result<(), RecorderError> {
        let mut summary = format!(
            "## Session Summary\n\n**Goal:** {}\n**Total Steps:** {}\n**Termination:** {}\n**Sealed:** {}\n",
            self.goal,
            self.step_count,
            termination_reason,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        if !self.ux_failures.is_empty() {
            summary.push_str(&format!(
                "\n### UX Issues Found ({})\n\n",
                self.ux_failures.len()
            ));
            for (step, issue) in &self.ux_failures {
                summary.push_str(&format!("- **Step {step}**: {issue}\n"));
            }
        }

        self.append(&summary)
            .map_err(|source| RecorderError::Seal { source })?;
        info!(path = %self.path.display(), "session report sealed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pass() -> UxAudit {
        UxAudit {
            status: UxStatus::Pass,
            issue: None,
        }
    }

    #[test]
    fn writes_header_steps_and_summary() {
        let dir = tempdir().unwrap();
        let mut recorder = MarkdownRecorder::create(dir.path(), "tap Login").unwrap();

        recorder
            .record_step(
                1,
                &UiAction::Tap {
                    text: "Login".into(),
                },
                "Login button is visible",
                &pass(),
            )
            .unwrap();
        recorder
            .record_step(
                2,
                &UiAction::GoBack,
                "Dead end, backing out",
                &UxAudit {
                    status: UxStatus::Fail,
                    issue: Some("Overlapping labels on the form".into()),
                },
            )
            .unwrap();
        recorder.seal("goal achieved after 2 steps").unwrap();

        let content = fs::read_to_string(recorder.path()).unwrap();
        assert!(content.starts_with("# UXPilot Session Report"));
        assert!(content.contains("**Goal:** tap Login"));
        assert!(content.contains("## Step 1"));
        assert!(content.contains("**Action:** Tapped 'Login'"));
        assert!(content.contains("**Reasoning:** Login button is visible"));
        assert!(content.contains("**UX Status:** PASS"));
        assert!(content.contains("**UX Status:** FAIL - Overlapping labels on the form"));
        assert!(content.contains("**Total Steps:** 2"));
        assert!(content.contains("**Termination:** goal achieved after 2 steps"));
        assert!(content.contains("### UX Issues Found (1)"));
        assert!(content.contains("- **Step 2**: Overlapping labels on the form"));
    }

    #[test]
    fn step_blocks_match_expected_format() {
        let dir = tempdir().unwrap();
        let mut recorder = MarkdownRecorder::create(dir.path(), "g").unwrap();
        recorder
            .record_step(1, &UiAction::TapPoint { x: 10, y: 20 }, "why", &pass())
            .unwrap();
        let content = fs::read_to_string(recorder.path()).unwrap();
        assert!(content
            .contains("## Step 1\n\n**Action:** Tapped point (10, 20)\n**Reasoning:** why\n**UX Status:** PASS"));
    }

    #[test]
    fn appends_never_rewrite_prior_steps() {
        let dir = tempdir().unwrap();
        let mut recorder = MarkdownRecorder::create(dir.path(), "g").unwrap();
        recorder
            .record_step(1, &UiAction::GoBack, "first", &pass())
            .unwrap();
        let before = fs::read_to_string(recorder.path()).unwrap();
        recorder
            .record_step(2, &UiAction::GoBack, "second", &pass())
            .unwrap();
        let after = fs::read_to_string(recorder.path()).unwrap();
        assert!(after.starts_with(&before));
    }
}
