//! Recording marks.
//!
//! Grades attach to an individual user and an attempt, even when the
//! submission itself is shared by a team. Saving a grade against a team
//! submission can fan out to every member in one transaction.

use chrono::{DateTime, Utc};
use log::{info, warn};
use sea_orm::TransactionTrait;

use db::models::submission::Submitter;
use db::models::{grade, subject, team_group_member};

use crate::context::{Capability, RequestContext};
use crate::error::{BatchWarning, ReviewError};
use crate::lifecycle::{self, ReopenTrigger};
use crate::sinks::GradebookSink;

/// One grade to record, as entered on a grading form.
#[derive(Debug, Clone)]
pub struct GradeData {
    pub user_id: i64,
    /// `None` clears the mark.
    pub grade: Option<f64>,
    /// Team mode only: write the same mark for every group member.
    pub apply_to_all: bool,
    /// `updated_at` of the grade row the form was loaded against; `None`
    /// when the form was loaded before any grade row existed.
    pub expected_updated_at: Option<DateTime<Utc>>,
}

/// Records a mark for the user's latest attempt.
///
/// With `apply_to_all` on a team subject every member of the submitter's
/// group receives the same mark, all-or-nothing. When the subject has no
/// marking workflow the grade is pushed to the gradebook immediately; with
/// a workflow, the push waits for the `released` state.
pub async fn save_grade(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    data: GradeData,
    gradebook: &dyn GradebookSink,
) -> Result<grade::Model, ReviewError> {
    ctx.require(Capability::Grade, subject.id)?;

    if let Some(value) = data.grade {
        if !(0.0..=subject.grade_max).contains(&value) {
            return Err(ReviewError::Validation(format!(
                "grade {} is outside the range 0..={}",
                value, subject.grade_max
            )));
        }
    }

    // Group-membership problems surface here, before anything is written.
    let submitter = lifecycle::resolve_submitter(ctx, subject, data.user_id).await?;
    // Grade rows always reference a real submission; grading an untouched
    // submitter opens the empty attempt 0 first.
    let submission = lifecycle::get_or_create_submission(ctx, subject, submitter, None).await?;
    let attempt_number = submission.attempt_number;

    let existing =
        grade::Model::find_for_attempt(ctx.db, subject.id, data.user_id, attempt_number).await?;
    if let (Some(expected), Some(row)) = (data.expected_updated_at, existing.as_ref()) {
        if row.updated_at != expected {
            return Err(ReviewError::ConcurrentModification);
        }
    }

    let recipients: Vec<i64> = match submitter {
        Submitter::Group(group_id) if data.apply_to_all => {
            team_group_member::Model::user_ids_in_group(ctx.db, group_id).await?
        }
        _ => vec![data.user_id],
    };

    let txn = ctx.db.begin().await?;
    let mut saved_for_caller = None;
    for recipient in &recipients {
        let row =
            grade::Model::get_or_create(&txn, subject.id, *recipient, attempt_number, ctx.now)
                .await?;
        let row = row.record_mark(&txn, data.grade, ctx.user_id, ctx.now).await?;
        if *recipient == data.user_id {
            saved_for_caller = Some(row);
        }
    }
    txn.commit().await?;

    let saved = saved_for_caller
        .ok_or_else(|| ReviewError::NotFound(format!("grade for user {}", data.user_id)))?;

    info!(
        "grade {:?} recorded for {} user(s) on subject {} attempt {}",
        data.grade,
        recipients.len(),
        subject.id,
        attempt_number
    );

    if !subject.marking_workflow {
        if let Some(value) = data.grade {
            for recipient in &recipients {
                gradebook.push_grade(subject.id, *recipient, value);
            }
        }
    }

    maybe_reopen_until_pass(ctx, subject, submitter, data.grade, attempt_number).await?;

    Ok(saved)
}

/// Under the `untilpass` policy a failing mark opens the next attempt, as
/// long as attempts remain. Passing marks and exhausted attempts leave the
/// submission closed.
async fn maybe_reopen_until_pass(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    submitter: Submitter,
    grade: Option<f64>,
    attempt_number: i32,
) -> Result<(), ReviewError> {
    if subject.attempt_reopen_method != subject::AttemptReopenMethod::UntilPass {
        return Ok(());
    }
    let pass_mark = match subject.grade_to_pass {
        Some(mark) if mark > 0.0 => mark,
        _ => return Ok(()),
    };
    let failing = matches!(grade, Some(value) if value < pass_mark);
    if !failing {
        return Ok(());
    }
    if !subject.attempts_remaining(attempt_number + 1) {
        warn!(
            "subject {}: failing grade but no attempts remain for {:?}",
            subject.id, submitter
        );
        return Ok(());
    }

    lifecycle::reopen_for_attempt(ctx, subject, submitter, ReopenTrigger::UntilPass).await?;
    Ok(())
}

/// Records a batch of marks, continuing past per-user failures.
///
/// Returns the grades that were saved and one warning per user that was
/// skipped.
pub async fn save_grades(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    batch: Vec<GradeData>,
    gradebook: &dyn GradebookSink,
) -> Result<(Vec<grade::Model>, Vec<BatchWarning>), ReviewError> {
    let mut saved = Vec::new();
    let mut warnings = Vec::new();
    for data in batch {
        let user_id = data.user_id;
        match save_grade(ctx, subject, data, gradebook).await {
            Ok(row) => saved.push(row),
            Err(err @ ReviewError::PermissionDenied(_)) => return Err(err),
            Err(err @ ReviewError::Db(_)) => return Err(err),
            Err(err) => warnings.push(BatchWarning {
                user_id,
                message: err.to_string(),
            }),
        }
    }
    Ok((saved, warnings))
}
