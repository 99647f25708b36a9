use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder, Select};
use serde::{Deserialize, Serialize};

/// Represents the status of a submission throughout its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "submission_status_enum"
)]
pub enum SubmissionStatus {
    /// Created empty on first access; nothing saved yet.
    #[sea_orm(string_value = "new")]
    New,
    /// Being edited by the submitter.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Handed in for grading.
    #[sea_orm(string_value = "submitted")]
    Submitted,
    /// Superseded by a newer attempt.
    #[sea_orm(string_value = "reopened")]
    Reopened,
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::New
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            SubmissionStatus::New => "new",
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Reopened => "reopened",
        };
        write!(f, "{}", status_str)
    }
}

/// The owner of a submission: a single user, or a team group when the
/// subject is in team-submission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Submitter {
    User(i64),
    Group(i64),
}

/// One versioned submission instance for a submitter.
///
/// Exactly one of `user_id` / `group_id` is set. Attempt numbers start at 0
/// and increase without gaps; exactly one row per submitter carries
/// `latest = true`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    /// Primary key of the submission.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the related subject.
    pub subject_id: i64,
    /// Owning user; `None` for group submissions.
    pub user_id: Option<i64>,
    /// Owning group; `None` for individual submissions.
    pub group_id: Option<i64>,
    /// Attempt number, 0-based.
    pub attempt_number: i32,
    /// Current status of the submission in the lifecycle.
    pub status: SubmissionStatus,
    /// Whether this is the authoritative attempt for the submitter.
    pub latest: bool,
    /// Online-text plugin content, if any.
    pub online_text: Option<String>,
    /// Timestamp when the submission was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the submission was last updated.
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
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn submitter_filter(query: Select<Entity>, submitter: Submitter) -> Select<Entity> {
    match submitter {
        Submitter::User(id) => query
            .filter(Column::UserId.eq(id))
            .filter(Column::GroupId.is_null()),
        Submitter::Group(id) => query
            .filter(Column::GroupId.eq(id))
            .filter(Column::UserId.is_null()),
    }
}

impl Model {
    pub fn submitter(&self) -> Submitter {
        match (self.user_id, self.group_id) {
            (_, Some(group_id)) => Submitter::Group(group_id),
            (user_id, None) => Submitter::User(user_id.unwrap_or(0)),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        submitter: Submitter,
        attempt_number: i32,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        let (user_id, group_id) = match submitter {
            Submitter::User(id) => (Some(id), None),
            Submitter::Group(id) => (None, Some(id)),
        };
        let submission = ActiveModel {
            subject_id: Set(subject_id),
            user_id: Set(user_id),
            group_id: Set(group_id),
            attempt_number: Set(attempt_number),
            status: Set(SubmissionStatus::New),
            latest: Set(true),
            online_text: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        submission.insert(db).await
    }

    /// Fetches the attempt flagged `latest` for the submitter, if any.
    pub async fn find_latest<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        submitter: Submitter,
    ) -> Result<Option<Model>, DbErr> {
        submitter_filter(Entity::find().filter(Column::SubjectId.eq(subject_id)), submitter)
            .filter(Column::Latest.eq(true))
            .one(db)
            .await
    }

    /// Fetches a specific attempt for the submitter.
    pub async fn find_attempt<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        submitter: Submitter,
        attempt_number: i32,
    ) -> Result<Option<Model>, DbErr> {
        submitter_filter(Entity::find().filter(Column::SubjectId.eq(subject_id)), submitter)
            .filter(Column::AttemptNumber.eq(attempt_number))
            .one(db)
            .await
    }

    /// All attempts for the submitter, oldest first.
    pub async fn list_attempts<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        submitter: Submitter,
    ) -> Result<Vec<Model>, DbErr> {
        submitter_filter(Entity::find().filter(Column::SubjectId.eq(subject_id)), submitter)
            .order_by_asc(Column::AttemptNumber)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::submission::{ActiveModel, Model as Submission, SubmissionStatus, Submitter};
    use crate::models::{subject, user};
    use crate::test_utils::setup_test_db;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn test_create_and_find_latest() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u100").await.unwrap();

        let created = Submission::create(
            &db,
            subject.id,
            Submitter::User(student.id),
            0,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(created.attempt_number, 0);
        assert_eq!(created.status, SubmissionStatus::New);
        assert!(created.latest);

        let latest = Submission::find_latest(&db, subject.id, Submitter::User(student.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, created.id);
    }

    #[tokio::test]
    async fn test_group_and_user_rows_do_not_collide() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Team essay").await.unwrap();

        Submission::create(&db, subject.id, Submitter::Group(7), 0, Utc::now())
            .await
            .unwrap();

        let none = Submission::find_latest(&db, subject.id, Submitter::User(7))
            .await
            .unwrap();
        assert!(none.is_none());

        let group = Submission::find_latest(&db, subject.id, Submitter::Group(7))
            .await
            .unwrap();
        assert!(group.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_attempt_rejected_by_schema() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();

        // SQLite treats NULLs as distinct in unique indexes, so the duplicate
        // check needs every indexed column populated.
        let row = |now| ActiveModel {
            subject_id: Set(subject.id),
            user_id: Set(Some(5)),
            group_id: Set(Some(3)),
            attempt_number: Set(0),
            status: Set(SubmissionStatus::New),
            latest: Set(true),
            online_text: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        row(Utc::now()).insert(&db).await.unwrap();
        let duplicate = row(Utc::now()).insert(&db).await;
        assert!(duplicate.is_err());
    }
}
