use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

/// Drawing tool used for an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "annotation_kind_enum")]
pub enum AnnotationKind {
    #[sea_orm(string_value = "pen")]
    Pen,
    #[sea_orm(string_value = "line")]
    Line,
    #[sea_orm(string_value = "rectangle")]
    Rectangle,
    #[sea_orm(string_value = "oval")]
    Oval,
    #[sea_orm(string_value = "highlight")]
    Highlight,
    #[sea_orm(string_value = "stamp")]
    Stamp,
}

/// A drawn annotation placed on one page of a combined document.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "annotations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub grade_id: i64,
    /// Zero-based page index within the combined document.
    pub page_number: i32,
    pub kind: AnnotationKind,
    pub x: i32,
    pub y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub colour: String,
    /// Freehand path data for pen annotations.
    pub path: Option<String>,
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
    /// All annotations for a grade, page order then insertion order.
    pub async fn list_for_grade<C: ConnectionTrait>(
        db: &C,
        grade_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::GradeId.eq(grade_id))
            .order_by_asc(Column::PageNumber)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
