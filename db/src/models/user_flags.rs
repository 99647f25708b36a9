use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

/// Marking-workflow stages, in their conventional order. Transitions are not
/// restricted to this order; any stage may be set by a grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "workflow_state_enum")]
pub enum WorkflowState {
    #[sea_orm(string_value = "notmarked")]
    NotMarked,
    #[sea_orm(string_value = "inmarking")]
    InMarking,
    #[sea_orm(string_value = "readyforreview")]
    ReadyForReview,
    #[sea_orm(string_value = "inreview")]
    InReview,
    #[sea_orm(string_value = "readyforrelease")]
    ReadyForRelease,
    #[sea_orm(string_value = "released")]
    Released,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::NotMarked
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::NotMarked => "notmarked",
            WorkflowState::InMarking => "inmarking",
            WorkflowState::ReadyForReview => "readyforreview",
            WorkflowState::InReview => "inreview",
            WorkflowState::ReadyForRelease => "readyforrelease",
            WorkflowState::Released => "released",
        };
        write!(f, "{}", s)
    }
}

/// Per (subject, user) sidecar row, created lazily on first need.
///
/// Holds the extension date, the submission lock, the mailed-notification
/// flag, the cached workflow state of the latest grade, the allocated
/// marker, and the team-submission submit-intent signal.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "user_flags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub subject_id: i64,
    pub user_id: i64,
    /// Extension of the effective cutoff for this user.
    pub extension_due_date: Option<DateTime<Utc>>,
    /// Locked submissions refuse further student edits.
    pub locked: bool,
    /// Whether the grading notification has been mailed.
    pub mailed: bool,
    /// Cache of the latest grade's workflow state.
    pub workflow_state: WorkflowState,
    /// Marker allocated to this user's submissions, if any.
    pub allocated_marker: Option<i64>,
    /// Team mode: this member has signalled submit intent for the current
    /// attempt.
    pub submitted_intent: bool,
    pub created_at: DateTime<Utc>,
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
    pub async fn find_for<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await
    }

    /// Lazily creates the sidecar row on first need.
    pub async fn get_or_create<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Self::find_for(db, subject_id, user_id).await? {
            return Ok(existing);
        }

        let flags = ActiveModel {
            subject_id: Set(subject_id),
            user_id: Set(user_id),
            extension_due_date: Set(None),
            locked: Set(false),
            mailed: Set(false),
            workflow_state: Set(WorkflowState::NotMarked),
            allocated_marker: Set(None),
            submitted_intent: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        flags.insert(db).await
    }

    /// All flag rows for a subject where the allocated marker matches.
    pub async fn find_allocated_to<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        marker_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::AllocatedMarker.eq(marker_id))
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::user_flags::{Model as UserFlags, WorkflowState};
    use crate::models::{subject, user};
    use crate::test_utils::setup_test_db;
    use chrono::Utc;

    #[tokio::test]
    async fn test_lazy_creation_once() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();

        let first = UserFlags::get_or_create(&db, subject.id, student.id, Utc::now())
            .await
            .unwrap();
        let second = UserFlags::get_or_create(&db, subject.id, student.id, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(!first.locked);
        assert_eq!(first.workflow_state, WorkflowState::NotMarked);
        assert_eq!(first.extension_due_date, None);
    }
}
