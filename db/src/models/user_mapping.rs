use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

/// Blind-marking identity mapping: per (subject, user) stable pseudonymous
/// identifier, assigned once and never reassigned.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "user_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub subject_id: i64,
    pub user_id: i64,
    /// The pseudonymous participant number, 1-based per subject.
    pub anonymous_id: i64,
    pub created_at: DateTime<Utc>,
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

    /// Assigns the next participant number on first need; existing mappings
    /// are returned untouched.
    pub async fn get_or_create<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Self::find_for(db, subject_id, user_id).await? {
            return Ok(existing);
        }

        let highest = Entity::find()
            .filter(Column::SubjectId.eq(subject_id))
            .order_by_desc(Column::AnonymousId)
            .one(db)
            .await?
            .map(|m| m.anonymous_id)
            .unwrap_or(0);

        let mapping = ActiveModel {
            subject_id: Set(subject_id),
            user_id: Set(user_id),
            anonymous_id: Set(highest + 1),
            created_at: Set(now),
            ..Default::default()
        };
        mapping.insert(db).await
    }
}

#[cfg(test)]
mod tests {
    use crate::models::user_mapping::Model as UserMapping;
    use crate::models::{subject, user};
    use crate::test_utils::setup_test_db;
    use chrono::Utc;

    #[tokio::test]
    async fn test_stable_and_sequential() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Essay").await.unwrap();
        let a = user::Model::create(&db, "a").await.unwrap();
        let b = user::Model::create(&db, "b").await.unwrap();

        let first = UserMapping::get_or_create(&db, subject.id, a.id, Utc::now())
            .await
            .unwrap();
        let second = UserMapping::get_or_create(&db, subject.id, b.id, Utc::now())
            .await
            .unwrap();
        let again = UserMapping::get_or_create(&db, subject.id, a.id, Utc::now())
            .await
            .unwrap();

        assert_eq!(first.anonymous_id, 1);
        assert_eq!(second.anonymous_id, 2);
        assert_eq!(again.id, first.id);
        assert_eq!(again.anonymous_id, 1);
    }
}
