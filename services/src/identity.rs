//! Blind-marking identity mapping.
//!
//! Each user gets a stable pseudonymous participant number per subject,
//! assigned on first need and never reassigned. Pre-reveal, graders only
//! ever see the participant number.

use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};

use db::models::{subject, user, user_mapping};

use crate::context::{Capability, RequestContext};
use crate::error::ReviewError;

/// The participant number for a user, assigning one on first need.
pub async fn anonymous_id_for(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<i64, ReviewError> {
    let mapping =
        user_mapping::Model::get_or_create(ctx.db, subject.id, user_id, ctx.now).await?;
    Ok(mapping.anonymous_id)
}

/// The name a grader sees for a submitter: the pseudonym while blind marking
/// is active, the real username otherwise.
pub async fn display_name(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<String, ReviewError> {
    if subject.blind_marking && !subject.identities_revealed {
        let anonymous_id = anonymous_id_for(ctx, subject, user_id).await?;
        return Ok(format!("Participant {}", anonymous_id));
    }

    let user = user::Entity::find_by_id(user_id)
        .one(ctx.db)
        .await?
        .ok_or_else(|| ReviewError::NotFound(format!("user {}", user_id)))?;
    Ok(user.username)
}

/// Reveals submitter identities. One-way: mappings survive, but names are
/// shown from here on.
pub async fn reveal_identities(
    ctx: &RequestContext<'_>,
    subject: subject::Model,
) -> Result<subject::Model, ReviewError> {
    ctx.require(Capability::RevealIdentities, subject.id)?;

    if !subject.blind_marking {
        return Err(ReviewError::Policy(
            "blind marking is not enabled for this subject".into(),
        ));
    }
    if subject.identities_revealed {
        return Ok(subject);
    }

    let mut active = subject.into_active_model();
    active.identities_revealed = Set(true);
    active.updated_at = Set(ctx.now);
    Ok(active.update(ctx.db).await?)
}
