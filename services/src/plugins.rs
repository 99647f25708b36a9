//! The closed set of submission plugins.
//!
//! Plugins are compile-time variants behind one small capability surface,
//! not runtime-discovered components. Each plugin owns a file area in the
//! blob store; the document pipeline enumerates those areas when combining.

use db::models::{subject, submission};

/// Every submission plugin this module ships with.
pub const SUBMISSION_PLUGINS: &[SubmissionPlugin] =
    &[SubmissionPlugin::File, SubmissionPlugin::OnlineText];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPlugin {
    /// Uploaded files, stored as-is in the plugin's file area.
    File,
    /// Free text edited online; exported to an HTML file for the document
    /// pipeline.
    OnlineText,
}

impl SubmissionPlugin {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionPlugin::File => "file",
            SubmissionPlugin::OnlineText => "onlinetext",
        }
    }

    /// The blob-store area holding this plugin's files, keyed by submission
    /// id.
    pub fn file_area(&self) -> &'static str {
        match self {
            SubmissionPlugin::File => "submission_files",
            SubmissionPlugin::OnlineText => "submission_onlinetext",
        }
    }

    pub fn is_enabled(&self, subject: &subject::Model) -> bool {
        match self {
            SubmissionPlugin::File => subject.file_submission_enabled,
            SubmissionPlugin::OnlineText => subject.online_text_enabled,
        }
    }

    /// One-line summary for grading tables.
    pub fn summary(&self, submission: &submission::Model, file_count: usize) -> String {
        match self {
            SubmissionPlugin::File => match file_count {
                0 => "No files".to_string(),
                1 => "1 file".to_string(),
                n => format!("{} files", n),
            },
            SubmissionPlugin::OnlineText => match &submission.online_text {
                Some(text) => format!("{} characters", text.chars().count()),
                None => "No text".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::subject_with;
    use db::models::submission::{Model as Submission, Submitter};
    use db::test_utils::setup_test_db;
    use sea_orm::Set;

    #[tokio::test]
    async fn test_enabled_set_follows_subject_config() {
        let db = setup_test_db().await;
        let subject = subject_with(&db, |s| {
            s.online_text_enabled = Set(true);
            s.file_submission_enabled = Set(false);
        })
        .await;

        let enabled: Vec<_> = SUBMISSION_PLUGINS
            .iter()
            .filter(|p| p.is_enabled(&subject))
            .collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name(), "onlinetext");
    }

    #[tokio::test]
    async fn test_summaries() {
        let db = setup_test_db().await;
        let subject = subject_with(&db, |_| {}).await;
        let mut submission = Submission::create(
            &db,
            subject.id,
            Submitter::User(1),
            0,
            chrono::Utc::now(),
        )
        .await
        .unwrap();
        submission.online_text = Some("hello".into());

        assert_eq!(
            SubmissionPlugin::File.summary(&submission, 2),
            "2 files"
        );
        assert_eq!(
            SubmissionPlugin::OnlineText.summary(&submission, 0),
            "5 characters"
        );
    }
}
