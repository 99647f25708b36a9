use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, JoinType, QuerySelect};
use serde::{Deserialize, Serialize};

/// Membership of a user in a team group.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "team_group_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::team_group::Entity",
        from = "Column::GroupId",
        to = "super::team_group::Column::Id",
        on_delete = "Cascade"
    )]
    Group,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::team_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn add(db: &DbConn, group_id: i64, user_id: i64) -> Result<Model, DbErr> {
        let member = ActiveModel {
            group_id: Set(group_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        member.insert(db).await
    }

    /// IDs of every group under the subject that the user belongs to.
    pub async fn group_ids_for_user<C: ConnectionTrait>(
        db: &C,
        subject_id: i64,
        user_id: i64,
    ) -> Result<Vec<i64>, DbErr> {
        let rows = Entity::find()
            .join(JoinType::InnerJoin, Relation::Group.def())
            .filter(super::team_group::Column::SubjectId.eq(subject_id))
            .filter(Column::UserId.eq(user_id))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.group_id).collect())
    }

    /// IDs of every user in the group.
    pub async fn user_ids_in_group<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
    ) -> Result<Vec<i64>, DbErr> {
        let rows = Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::team_group_member::Model as Member;
    use crate::models::{subject, team_group, user};
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_group_membership_lookup() {
        let db = setup_test_db().await;
        let subject = subject::Model::create(&db, "Team project").await.unwrap();
        let group = team_group::Model::create(&db, subject.id, "Alpha")
            .await
            .unwrap();
        let a = user::Model::create(&db, "a").await.unwrap();
        let b = user::Model::create(&db, "b").await.unwrap();

        Member::add(&db, group.id, a.id).await.unwrap();
        Member::add(&db, group.id, b.id).await.unwrap();

        let groups = Member::group_ids_for_user(&db, subject.id, a.id)
            .await
            .unwrap();
        assert_eq!(groups, vec![group.id]);

        let members = Member::user_ids_in_group(&db, group.id).await.unwrap();
        assert_eq!(members.len(), 2);
    }
}
