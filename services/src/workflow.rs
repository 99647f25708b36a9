//! Marking-workflow state machine.
//!
//! The stages are ordered for display, but transitions are override-capable:
//! a grader may set any state from any other. What the machine actually
//! gates is visibility — a grade is invisible to its submitter until the
//! state reaches `released`, and notifications must never fire earlier.

use log::debug;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait};

use db::models::user_flags::WorkflowState;
use db::models::{grade, subject, user_flags};

use crate::context::{Capability, RequestContext};
use crate::error::ReviewError;
use crate::sinks::{GradebookSink, NotificationSink};

/// Sets the marking-workflow state for one user.
///
/// Writes the user-flags cache and the latest grade row. Entering
/// `released` pushes the grade to the gradebook and notifies the student;
/// leaving `released` does NOT retract an earlier push. That asymmetry is
/// long-standing observed behavior and is kept deliberately.
pub async fn set_workflow_state(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
    new_state: WorkflowState,
    gradebook: &dyn GradebookSink,
    notifier: &dyn NotificationSink,
) -> Result<user_flags::Model, ReviewError> {
    ctx.require(Capability::Grade, subject.id)?;

    if !subject.marking_workflow {
        return Err(ReviewError::Policy(
            "marking workflow is not enabled for this subject".into(),
        ));
    }

    let flags = user_flags::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    let previous = flags.workflow_state;

    // The flags cache and the grade-row mirror move together or not at all.
    let txn = ctx.db.begin().await?;

    let mut active = flags.into_active_model();
    active.workflow_state = Set(new_state);
    active.updated_at = Set(ctx.now);
    let flags = active.update(&txn).await?;

    let latest_grade = grade::Entity::find()
        .filter(grade::Column::SubjectId.eq(subject.id))
        .filter(grade::Column::UserId.eq(user_id))
        .order_by_desc(grade::Column::AttemptNumber)
        .order_by_desc(grade::Column::UpdatedAt)
        .one(&txn)
        .await?;

    let mut released_value = None;
    if let Some(grade_row) = latest_grade {
        released_value = grade_row.grade;
        let mut active = grade_row.into_active_model();
        active.workflow_state = Set(new_state);
        active.updated_at = Set(ctx.now);
        active.update(&txn).await?;
    }

    txn.commit().await?;

    if new_state == WorkflowState::Released && previous != WorkflowState::Released {
        if let Some(value) = released_value {
            gradebook.push_grade(subject.id, user_id, value);
        }
        if subject.send_student_notifications {
            notifier.feedback_released(subject.id, user_id);
        }
    }

    debug!(
        "workflow state for user {} on subject {}: {} -> {}",
        user_id, subject.id, previous, new_state
    );

    Ok(flags)
}

/// Notifications must never leak ungraded or provisionally-graded feedback.
pub fn can_notify_student(state: WorkflowState) -> bool {
    state == WorkflowState::Released
}

/// Whether the submitter may see their grade and feedback. Subjects without
/// marking workflow expose grades as soon as they exist.
pub fn grade_visible_to_submitter(subject: &subject::Model, state: WorkflowState) -> bool {
    !subject.marking_workflow || state == WorkflowState::Released
}
