use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202608260010_create_annotations"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("annotations"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("grade_id")).integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("page_number"))
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("kind"))
                            .string()
                            .not_null()
                            .default("pen"),
                    )
                    .col(ColumnDef::new(Alias::new("x")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("y")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("end_x")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("end_y")).integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("colour"))
                            .string()
                            .not_null()
                            .default("red"),
                    )
                    .col(ColumnDef::new(Alias::new("path")).text())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Alias::new("annotations"), Alias::new("grade_id"))
                            .to(Alias::new("grades"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("annotations")).to_owned())
            .await
    }
}
