//! Effective-date resolution and the submission window predicate.
//!
//! A user-level override beats group overrides. Group overrides are tried in
//! `sort_order` and the first one encountered wins wholesale; there is no
//! per-field merging across groups.

use chrono::{DateTime, Utc};

use db::models::{subject, subject_override, team_group_member};

use crate::context::RequestContext;
use crate::error::ReviewError;

/// The dates in force for one user after overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveDates {
    pub allow_submissions_from: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub cutoff_date: Option<DateTime<Utc>>,
}

impl EffectiveDates {
    fn from_subject(subject: &subject::Model) -> Self {
        Self {
            allow_submissions_from: subject.allow_submissions_from,
            due_date: subject.due_date,
            cutoff_date: subject.cutoff_date,
        }
    }

    fn apply(&mut self, o: &subject_override::Model) {
        if o.allow_submissions_from.is_some() {
            self.allow_submissions_from = o.allow_submissions_from;
        }
        if o.due_date.is_some() {
            self.due_date = o.due_date;
        }
        if o.cutoff_date.is_some() {
            self.cutoff_date = o.cutoff_date;
        }
    }
}

/// Resolves the dates in force for `user_id` on this subject.
pub async fn effective_dates(
    ctx: &RequestContext<'_>,
    subject: &subject::Model,
    user_id: i64,
) -> Result<EffectiveDates, ReviewError> {
    let mut dates = EffectiveDates::from_subject(subject);

    if let Some(user_override) =
        subject_override::Model::find_for_user(ctx.db, subject.id, user_id).await?
    {
        dates.apply(&user_override);
        return Ok(dates);
    }

    let group_ids =
        team_group_member::Model::group_ids_for_user(ctx.db, subject.id, user_id).await?;
    let group_overrides =
        subject_override::Model::find_for_groups(ctx.db, subject.id, &group_ids).await?;
    if let Some(first) = group_overrides.first() {
        dates.apply(first);
    }

    Ok(dates)
}

/// Whether submissions are currently accepted for these dates.
///
/// The hard deadline is the cutoff date, extended per-user when an extension
/// is granted and later. A subject with no cutoff accepts late submissions
/// after the due date indefinitely.
pub fn submission_window_open(
    dates: &EffectiveDates,
    extension: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ReviewError> {
    if let Some(allow_from) = dates.allow_submissions_from {
        if now < allow_from {
            return Err(ReviewError::Validation(
                "submissions are not yet open".into(),
            ));
        }
    }

    let mut deadline = dates.cutoff_date;
    if let Some(ext) = extension {
        deadline = match deadline {
            Some(d) if d >= ext => Some(d),
            _ => Some(ext),
        };
    }

    match deadline {
        Some(d) if now > d => Err(ReviewError::Validation(
            "the submission window has closed".into(),
        )),
        _ => Ok(()),
    }
}

/// True when `now` is past the effective due date (the submission is late
/// but may still be accepted until the cutoff).
pub fn is_late(dates: &EffectiveDates, now: DateTime<Utc>) -> bool {
    matches!(dates.due_date, Some(due) if now > due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, ctx_at, subject_with};
    use db::models::{subject_override, team_group, team_group_member, user};
    use db::test_utils::setup_test_db;
    use sea_orm::{ActiveModelTrait, Set};

    fn dates(
        allow: Option<i64>,
        due: Option<i64>,
        cutoff: Option<i64>,
    ) -> EffectiveDates {
        EffectiveDates {
            allow_submissions_from: allow.map(at),
            due_date: due.map(at),
            cutoff_date: cutoff.map(at),
        }
    }

    #[test]
    fn test_window_within_cutoff() {
        let d = dates(None, Some(1000), Some(1100));
        assert!(submission_window_open(&d, None, at(1050)).is_ok());
    }

    #[test]
    fn test_window_closed_after_cutoff() {
        let d = dates(None, Some(1000), Some(1100));
        assert!(submission_window_open(&d, None, at(1150)).is_err());
    }

    #[test]
    fn test_extension_beats_cutoff() {
        let d = dates(None, Some(1000), Some(1100));
        assert!(submission_window_open(&d, Some(at(1200)), at(1150)).is_ok());
        assert!(submission_window_open(&d, Some(at(1200)), at(1250)).is_err());
    }

    #[test]
    fn test_no_cutoff_accepts_late() {
        let d = dates(None, Some(1000), None);
        assert!(submission_window_open(&d, None, at(1200)).is_ok());
        assert!(is_late(&d, at(1200)));
        assert!(!is_late(&d, at(900)));
    }

    #[test]
    fn test_not_open_yet() {
        let d = dates(Some(500), None, None);
        assert!(submission_window_open(&d, None, at(400)).is_err());
        assert!(submission_window_open(&d, None, at(600)).is_ok());
    }

    #[tokio::test]
    async fn test_user_override_beats_group_override() {
        let db = setup_test_db().await;
        let subject = subject_with(&db, |s| {
            s.due_date = Set(Some(at(1000)));
            s.cutoff_date = Set(Some(at(1100)));
        })
        .await;
        let student = user::Model::create(&db, "u1").await.unwrap();
        let group = team_group::Model::create(&db, subject.id, "Alpha")
            .await
            .unwrap();
        team_group_member::Model::add(&db, group.id, student.id)
            .await
            .unwrap();

        let now = chrono::Utc::now();
        subject_override::ActiveModel {
            subject_id: Set(subject.id),
            group_id: Set(Some(group.id)),
            sort_order: Set(0),
            cutoff_date: Set(Some(at(2000))),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        subject_override::ActiveModel {
            subject_id: Set(subject.id),
            user_id: Set(Some(student.id)),
            sort_order: Set(0),
            cutoff_date: Set(Some(at(3000))),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let ctx = ctx_at(&db, student.id, at(0));
        let effective = effective_dates(&ctx, &subject, student.id).await.unwrap();
        assert_eq!(effective.cutoff_date, Some(at(3000)));
        // Unset override fields fall through to the subject defaults.
        assert_eq!(effective.due_date, Some(at(1000)));
    }

    #[tokio::test]
    async fn test_lowest_sort_order_group_override_wins() {
        let db = setup_test_db().await;
        let subject = subject_with(&db, |s| {
            s.cutoff_date = Set(Some(at(1100)));
        })
        .await;
        let student = user::Model::create(&db, "u1").await.unwrap();
        let g1 = team_group::Model::create(&db, subject.id, "Alpha")
            .await
            .unwrap();
        let g2 = team_group::Model::create(&db, subject.id, "Beta")
            .await
            .unwrap();
        team_group_member::Model::add(&db, g1.id, student.id)
            .await
            .unwrap();
        team_group_member::Model::add(&db, g2.id, student.id)
            .await
            .unwrap();

        let now = chrono::Utc::now();
        for (group_id, sort_order, cutoff) in [(g1.id, 5, at(5000)), (g2.id, 1, at(2000))] {
            subject_override::ActiveModel {
                subject_id: Set(subject.id),
                group_id: Set(Some(group_id)),
                sort_order: Set(sort_order),
                cutoff_date: Set(Some(cutoff)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let ctx = ctx_at(&db, student.id, at(0));
        let effective = effective_dates(&ctx, &subject, student.id).await.unwrap();
        assert_eq!(effective.cutoff_date, Some(at(2000)));
    }
}
