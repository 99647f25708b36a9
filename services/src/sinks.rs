//! Fire-and-forget collaborators. The core pushes into these and never
//! reads anything back; real implementations live outside this crate.

/// External gradebook. Only `released` grades (or grades on subjects without
/// marking workflow) are ever pushed; pushes are never retracted.
pub trait GradebookSink: Send + Sync {
    fn push_grade(&self, subject_id: i64, user_id: i64, grade: f64);
}

/// Student/grader notification channel.
pub trait NotificationSink: Send + Sync {
    fn submission_received(&self, subject_id: i64, user_id: i64);
    fn feedback_released(&self, subject_id: i64, user_id: i64);
}

/// Discards everything.
pub struct NullGradebook;

impl GradebookSink for NullGradebook {
    fn push_grade(&self, _subject_id: i64, _user_id: i64, _grade: f64) {}
}

/// Discards everything.
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn submission_received(&self, _subject_id: i64, _user_id: i64) {}
    fn feedback_released(&self, _subject_id: i64, _user_id: i64) {}
}
