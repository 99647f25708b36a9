use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Policy controlling whether and how a submitter may be given another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attempt_reopen_enum")]
pub enum AttemptReopenMethod {
    /// Attempts are never reopened.
    #[sea_orm(string_value = "none")]
    None,
    /// A grader reopens attempts explicitly.
    #[sea_orm(string_value = "manual")]
    Manual,
    /// Saving a grade below the pass mark reopens automatically.
    #[sea_orm(string_value = "untilpass")]
    UntilPass,
}

impl Default for AttemptReopenMethod {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for AttemptReopenMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptReopenMethod::None => "none",
            AttemptReopenMethod::Manual => "manual",
            AttemptReopenMethod::UntilPass => "untilpass",
        };
        write!(f, "{}", s)
    }
}

/// The assignment/activity configuration instance that submissions belong to.
///
/// Dates are `None` when unbounded. `max_attempts` is `None` for unlimited
/// attempts. Sentinel encodings (`0` dates, `-1` attempts) stop at this
/// boundary; callers only ever see options.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "subjects")]
pub struct Model {
    /// Primary key of the subject.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Earliest time submissions are accepted.
    pub allow_submissions_from: Option<DateTime<Utc>>,
    /// Soft deadline; late submissions are still accepted until the cutoff.
    pub due_date: Option<DateTime<Utc>>,
    /// Hard deadline; no submissions accepted after this (extensions aside).
    pub cutoff_date: Option<DateTime<Utc>>,
    /// When grading is expected to be finished.
    pub grading_due_date: Option<DateTime<Utc>>,
    /// Cap on attempts per submitter; `None` = unlimited.
    pub max_attempts: Option<i32>,
    /// How new attempts are opened after a submission is graded.
    pub attempt_reopen_method: AttemptReopenMethod,
    /// Maximum numeric grade.
    pub grade_max: f64,
    /// Pass threshold used by the `untilpass` reopen policy.
    pub grade_to_pass: Option<f64>,
    /// Whether submissions are made per group instead of per user.
    pub team_submission: bool,
    /// In team mode, whether every member must signal submit intent.
    pub require_all_team_members_submit: bool,
    /// Whether submitter identities are hidden from graders.
    pub blind_marking: bool,
    /// Whether blind-marking identities have been revealed.
    pub identities_revealed: bool,
    /// Whether the marking workflow gates grade visibility.
    pub marking_workflow: bool,
    /// Whether markers are allocated per submitter.
    pub marking_allocation: bool,
    /// Whether the submission statement must be accepted on submit.
    pub require_submission_statement: bool,
    /// Whether students are notified of graded/submitted events.
    pub send_student_notifications: bool,
    /// Online-text submission plugin toggle.
    pub online_text_enabled: bool,
    /// File submission plugin toggle.
    pub file_submission_enabled: bool,
    /// Timestamp when the subject was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the subject was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No RelationDef implemented")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(db: &DbConn, name: &str) -> Result<Model, DbErr> {
        let now = Utc::now();
        let subject = ActiveModel {
            name: Set(name.to_owned()),
            attempt_reopen_method: Set(AttemptReopenMethod::None),
            grade_max: Set(100.0),
            team_submission: Set(false),
            require_all_team_members_submit: Set(false),
            blind_marking: Set(false),
            identities_revealed: Set(false),
            marking_workflow: Set(false),
            marking_allocation: Set(false),
            require_submission_statement: Set(false),
            send_student_notifications: Set(true),
            online_text_enabled: Set(false),
            file_submission_enabled: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        subject.insert(db).await
    }

    /// Checks the `allow_from <= due <= cutoff` ordering for whichever dates
    /// are actually set.
    pub fn dates_consistent(&self) -> bool {
        if let (Some(allow), Some(due)) = (self.allow_submissions_from, self.due_date) {
            if allow > due {
                return false;
            }
        }
        if let (Some(due), Some(cutoff)) = (self.due_date, self.cutoff_date) {
            if due > cutoff {
                return false;
            }
        }
        if let (Some(allow), Some(cutoff)) = (self.allow_submissions_from, self.cutoff_date) {
            if allow > cutoff {
                return false;
            }
        }
        true
    }

    /// True when the submitter may still be given another attempt after
    /// `attempts_used` attempts.
    pub fn attempts_remaining(&self, attempts_used: i32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_used < max,
            None => true,
        }
    }
}
