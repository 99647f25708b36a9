use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

/// A written feedback comment anchored to a point on a page.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "feedback_comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub grade_id: i64,
    /// Zero-based page index within the combined document.
    pub page_number: i32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub raw_text: String,
    pub colour: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::grade::Entity",
        from = "Column::GradeId",
        to = "super::grade::Column::Id",
        on_delete = "Cascade"
    )]
    Grade,
}

impl Related<super::grade::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Grade.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// All comments for a grade, ordered for the trailing comments section:
    /// page first, then top-to-bottom.
    pub async fn list_for_grade<C: ConnectionTrait>(
        db: &C,
        grade_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::GradeId.eq(grade_id))
            .order_by_asc(Column::PageNumber)
            .order_by_asc(Column::Y)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
