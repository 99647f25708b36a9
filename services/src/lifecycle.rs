//! Submission lifecycle: draft, submit, reopen, lock, and team-submission
//! reconciliation.
//!
//! Attempt numbers are 0-based and gap-free per submitter; exactly one
//! attempt carries `latest = true`. Historical attempts are retained and
//! never edited once superseded.

use chrono::{DateTime, Utc};
use log::info;
use sea_orm::{ActiveModelTrait, ConnectionTrait, IntoActiveModel, Set, TransactionTrait};

use db::models::submission::{Model as Submission, SubmissionStatus, Submitter};
use db::models::{subject, team_group_member, user_flags};

use crate::context::{Capability, RequestContext};
use crate::error::ReviewError;
use crate::overrides;
use crate::sinks::NotificationSink;

/// What caused an attempt to be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenTrigger {
    /// A grader asked for a new attempt.
    Manual,
    /// A grade below the pass mark was recorded under the `untilpass`
    /// policy.
    UntilPass,
}

/// Determines who owns submissions for this user: the user themselves, or
/// their single team group when the subject is in team mode.
///
/// Belonging to no group, or to more than one group, is a fatal
/// precondition failure that blocks submission until enrollment is fixed.
pub async fn resolve_submitter(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<Submitter, ReviewError> {
    if !subject.team_submission {
        return Ok(Submitter::User(user_id));
    }

    let group_ids =
        team_group_member::Model::group_ids_for_user(ctx.db, subject.id, user_id).await?;
    match group_ids.as_slice() {
        [] => Err(ReviewError::NoGroup { user_id }),
        [only] => Ok(Submitter::Group(*only)),
        _ => Err(ReviewError::MultipleGroups { user_id }),
    }
}

/// Fetches a submission, creating an empty `new` attempt 0 idempotently when
/// the submitter has none. `attempt = None` means the latest attempt;
/// historical attempts are fetched but never created on demand.
pub async fn get_or_create_submission(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    submitter: Submitter,
    attempt: Option<i32>,
) -> Result<Submission, ReviewError> {
    match attempt {
        Some(n) => Submission::find_attempt(ctx.db, subject.id, submitter, n)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("attempt {}", n))),
        None => {
            // Lookup before insert keeps (subject, submitter, attempt) unique.
            if let Some(existing) =
                Submission::find_latest(ctx.db, subject.id, submitter).await?
            {
                return Ok(existing);
            }
            Ok(Submission::create(ctx.db, subject.id, submitter, 0, ctx.now).await?)
        }
    }
}

async fn set_status<C: ConnectionTrait>(
    db: &C,
    submission: Submission,
    status: SubmissionStatus,
    latest: Option<bool>,
    now: DateTime<Utc>,
) -> Result<Submission, ReviewError> {
    let mut active = submission.into_active_model();
    active.status = Set(status);
    if let Some(latest) = latest {
        active.latest = Set(latest);
    }
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

/// Saves draft edits to the latest attempt.
///
/// `expected_updated_at` is the timestamp the edit form was loaded against;
/// a mismatch means another request changed the submission in the meantime.
pub async fn save_submission_draft(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
    online_text: Option<String>,
    expected_updated_at: DateTime<Utc>,
) -> Result<Submission, ReviewError> {
    if ctx.user_id == user_id {
        ctx.require(Capability::Submit, subject.id)?;
    } else {
        ctx.require(Capability::EditOthersSubmission, subject.id)?;
    }

    let flags = user_flags::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    if flags.locked {
        return Err(ReviewError::Policy("the submission is locked".into()));
    }

    let submitter = resolve_submitter(ctx, subject, user_id).await?;
    let submission = get_or_create_submission(ctx, subject, submitter, None).await?;

    if submission.updated_at != expected_updated_at {
        return Err(ReviewError::StaleSubmission);
    }
    if submission.status == SubmissionStatus::Submitted {
        return Err(ReviewError::Policy(
            "the submission has already been handed in; it must be reopened first".into(),
        ));
    }

    let mut active = submission.into_active_model();
    active.online_text = Set(online_text);
    active.status = Set(SubmissionStatus::Draft);
    active.updated_at = Set(ctx.now);
    Ok(active.update(ctx.db).await?)
}

/// Hands the latest attempt in for grading.
///
/// Validates the submission window (overrides and extensions included), the
/// submission statement, and the lock flag. In team mode the member's
/// intent is recorded and the shared group submission flips to `submitted`
/// per `require_all_team_members_submit`.
pub async fn submit_for_grading(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
    accepted_statement: bool,
    notifier: &dyn NotificationSink,
) -> Result<Submission, ReviewError> {
    if ctx.user_id == user_id {
        ctx.require(Capability::Submit, subject.id)?;
    } else {
        ctx.require(Capability::EditOthersSubmission, subject.id)?;
    }

    let flags = user_flags::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    if flags.locked {
        return Err(ReviewError::Policy("the submission is locked".into()));
    }

    let dates = overrides::effective_dates(ctx, subject, user_id).await?;
    overrides::submission_window_open(&dates, flags.extension_due_date, ctx.now)?;

    if subject.require_submission_statement && !accepted_statement {
        return Err(ReviewError::StatementRequired);
    }

    let submitter = resolve_submitter(ctx, subject, user_id).await?;
    let submission = get_or_create_submission(ctx, subject, submitter, None).await?;
    if submission.status == SubmissionStatus::Submitted {
        return Err(ReviewError::Policy(
            "the submission has already been handed in".into(),
        ));
    }

    let submission = match submitter {
        Submitter::User(_) => {
            set_status(ctx.db, submission, SubmissionStatus::Submitted, None, ctx.now).await?
        }
        Submitter::Group(group_id) => {
            // Record this member's intent first.
            let mut active = flags.into_active_model();
            active.submitted_intent = Set(true);
            active.updated_at = Set(ctx.now);
            active.update(ctx.db).await?;

            let all_in = if subject.require_all_team_members_submit {
                let members =
                    team_group_member::Model::user_ids_in_group(ctx.db, group_id).await?;
                let mut all = true;
                for member in members {
                    let member_flags =
                        user_flags::Model::get_or_create(ctx.db, subject.id, member, ctx.now)
                            .await?;
                    if !member_flags.submitted_intent {
                        all = false;
                        break;
                    }
                }
                all
            } else {
                // First submitter wins.
                true
            };

            if all_in {
                set_status(ctx.db, submission, SubmissionStatus::Submitted, None, ctx.now).await?
            } else {
                submission
            }
        }
    };

    if submission.status == SubmissionStatus::Submitted {
        if overrides::is_late(&dates, ctx.now) {
            info!(
                "submission {} for subject {} handed in late at {}",
                submission.id, subject.id, ctx.now
            );
        } else {
            info!(
                "submission {} for subject {} handed in at {}",
                submission.id, subject.id, ctx.now
            );
        }
        if subject.send_student_notifications {
            notifier.submission_received(subject.id, user_id);
        }
    }

    Ok(submission)
}

/// Opens a new attempt for the submitter.
///
/// The prior attempt is flagged `reopened` and loses `latest`; the new
/// attempt starts empty one number higher. Fails with a policy error when
/// reopening is disabled or the attempt cap is reached.
pub async fn reopen_for_attempt(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    submitter: Submitter,
    trigger: ReopenTrigger,
) -> Result<Submission, ReviewError> {
    ctx.require(Capability::Grade, subject.id)?;

    let allowed = match (subject.attempt_reopen_method, trigger) {
        (subject::AttemptReopenMethod::Manual, ReopenTrigger::Manual) => true,
        (subject::AttemptReopenMethod::UntilPass, ReopenTrigger::UntilPass) => true,
        _ => false,
    };
    if !allowed {
        return Err(ReviewError::Policy(format!(
            "attempt reopening is not available (method is {})",
            subject.attempt_reopen_method
        )));
    }

    let current = Submission::find_latest(ctx.db, subject.id, submitter)
        .await?
        .ok_or_else(|| ReviewError::NotFound("submission".into()))?;

    let attempts_used = current.attempt_number + 1;
    if !subject.attempts_remaining(attempts_used) {
        return Err(ReviewError::Policy(
            "the maximum number of attempts has been reached".into(),
        ));
    }

    let txn = ctx.db.begin().await?;
    let superseded =
        set_status(&txn, current, SubmissionStatus::Reopened, Some(false), ctx.now).await?;
    let next = Submission::create(
        &txn,
        subject.id,
        submitter,
        superseded.attempt_number + 1,
        ctx.now,
    )
    .await?;

    // Team mode: every member must signal intent again for the new attempt.
    if let Submitter::Group(group_id) = submitter {
        let members = team_group_member::Model::user_ids_in_group(&txn, group_id).await?;
        for member in members {
            let member_flags =
                user_flags::Model::get_or_create(&txn, subject.id, member, ctx.now).await?;
            let mut active = member_flags.into_active_model();
            active.submitted_intent = Set(false);
            active.updated_at = Set(ctx.now);
            active.update(&txn).await?;
        }
    }
    txn.commit().await?;

    info!(
        "reopened submission for subject {}: attempt {} -> {}",
        subject.id, superseded.attempt_number, next.attempt_number
    );

    Ok(next)
}

/// Freezes further student edits. Idempotent; grader actions are not
/// affected.
pub async fn lock_submission(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<user_flags::Model, ReviewError> {
    set_locked(ctx, subject, user_id, true).await
}

/// Reverses [`lock_submission`]. Idempotent.
pub async fn unlock_submission(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<user_flags::Model, ReviewError> {
    set_locked(ctx, subject, user_id, false).await
}

async fn set_locked(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
    locked: bool,
) -> Result<user_flags::Model, ReviewError> {
    ctx.require(Capability::Grade, subject.id)?;

    let flags = user_flags::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    if flags.locked == locked {
        return Ok(flags);
    }
    let mut active = flags.into_active_model();
    active.locked = Set(locked);
    active.updated_at = Set(ctx.now);
    Ok(active.update(ctx.db).await?)
}
