//! Marker allocation: a plain assignment on the user-flags sidecar,
//! independent of workflow state. Any grader-capable identity may reassign
//! at any time.

use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

use db::models::{subject, user_flags};

use crate::context::{Capability, RequestContext};
use crate::error::ReviewError;

/// Assigns (or clears, with `None`) the marker responsible for a user's
/// submissions.
pub async fn allocate_marker(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
    marker_id: Option<i64>,
) -> Result<user_flags::Model, ReviewError> {
    ctx.require(Capability::ManageAllocations, subject.id)?;

    if !subject.marking_allocation {
        return Err(ReviewError::Policy(
            "marking allocation is not enabled for this subject".into(),
        ));
    }

    let flags = user_flags::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    let mut active = flags.into_active_model();
    active.allocated_marker = Set(marker_id);
    active.updated_at = Set(ctx.now);
    Ok(active.update(ctx.db).await?)
}

/// User IDs whose submissions are allocated to the given marker; the "my
/// allocated submissions" filter of grading tables.
pub async fn allocated_to(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    marker_id: i64,
) -> Result<Vec<i64>, ReviewError> {
    let rows = user_flags::Model::find_allocated_to(ctx.db, subject.id, marker_id).await?;
    Ok(rows.into_iter().map(|f| f.user_id).collect())
}
