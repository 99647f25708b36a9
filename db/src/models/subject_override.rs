use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

/// A per-user or per-group date exception relative to the subject defaults.
///
/// Exactly one of `user_id` / `group_id` is set; at most one override exists
/// per identity per subject. Group overrides carry a `sort_order`; when a
/// user belongs to several overridden groups the lowest sort order wins
/// (first-match semantics).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "overrides")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub subject_id: i64,
    pub user_id: Option<i64>,
    pub group_id: Option<i64>,
    /// Tie-break priority for group overrides; lowest wins.
    pub sort_order: i32,
    /// Dates left `None` fall through to the subject defaults.
    pub allow_submissions_from: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub cutoff_date: Option<DateTime<Utc>>,
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
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The user-level override for a user, if one exists.
    pub async fn find_for_user<C: ConnectionTrait>(
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

    /// Group overrides for any of the given groups, lowest sort order first.
    pub async fn find_for_groups<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Model>, DbErr> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .filter(Column::GroupId.is_in(group_ids.to_vec()))
            .order_by_asc(Column::SortOrder)
            .all(db)
            .await
    }
}
