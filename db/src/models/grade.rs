use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, IntoActiveModel, QueryOrder};
use serde::{Deserialize, Serialize};

use super::user_flags::WorkflowState;

/// The mark recorded for one (subject, user, attempt).
///
/// `grade` is `None` until a grader records a mark; the `-1` sentinel from
/// legacy data stops at this boundary. Duplicate rows for the same attempt
/// should not occur, but if they do the latest `updated_at` wins.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "grades")]
pub struct Model {
    /// Primary key of the grade.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the related subject.
    pub subject_id: i64,
    /// The graded user. Always an individual, even for team submissions.
    pub user_id: i64,
    /// The attempt this grade belongs to.
    pub attempt_number: i32,
    /// Numeric grade, `None` when not set.
    pub grade: Option<f64>,
    /// The grader who recorded the mark.
    pub grader_id: Option<i64>,
    /// Marking-workflow stage for this grade.
    pub workflow_state: WorkflowState,
    /// Timestamp when the grade was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the grade was last updated.
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id",
        on_delete = "Cascade"
    )]
    Subject,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Fetches the authoritative grade row for an attempt. Latest
    /// `updated_at` wins when duplicates exist.
    pub async fn find_for_attempt<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
        attempt_number: i32,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::UserId.eq(user_id))
            .filter(Column::AttemptNumber.eq(attempt_number))
            .order_by_desc(Column::UpdatedAt)
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// Fetches the grade row for an attempt, creating an ungraded row when
    /// none exists yet.
    pub async fn get_or_create<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
        attempt_number: i32,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Self::find_for_attempt(db, subject_id, user_id, attempt_number).await? {
            return Ok(existing);
        }

        let grade = ActiveModel {
            subject_id: Set(subject_id),
            user_id: Set(user_id),
            attempt_number: Set(attempt_number),
            grade: Set(None),
            grader_id: Set(None),
            workflow_state: Set(WorkflowState::NotMarked),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        grade.insert(db).await
    }

    /// Writes the numeric grade and grader onto this row.
    pub async fn record_mark<C: ConnectionTrait>(
        self,
        db: &C,
        grade: Option<f64>,
        grader_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        let mut active = self.into_active_model();
        active.grade = Set(grade);
        active.grader_id = Set(Some(grader_id));
        active.updated_at = Set(now);
        active.update(db).await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::grade::Model as Grade;
    use crate::models::user_flags::WorkflowState;
    use crate::models::{subject, user};
    use crate::test_utils::setup_test_db;
    use chrono::Utc;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();

        let first = Grade::get_or_create(&db, subject.id, student.id, 0, Utc::now())
            .await
            .unwrap();
        let second = Grade::get_or_create(&db, subject.id, student.id, 0, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.grade, None);
        assert_eq!(first.workflow_state, WorkflowState::NotMarked);
    }

    #[tokio::test]
    async fn test_record_mark() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u2").await.unwrap();
        let grader = user::Model::create(&db, "t1").await.unwrap();

        let grade = Grade::get_or_create(&db, subject.id, student.id, 0, Utc::now())
            .await
            .unwrap();
        let graded = grade
            .record_mark(&db, Some(66.5), grader.id, Utc::now())
            .await
            .unwrap();

        assert_eq!(graded.grade, Some(66.5));
        assert_eq!(graded.grader_id, Some(grader.id));
    }
}
