use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608260001_create_users::Migration),
            Box::new(migrations::m202608260002_create_subjects::Migration),
            Box::new(migrations::m202608260003_create_team_groups::Migration),
            Box::new(migrations::m202608260004_create_team_group_members::Migration),
            Box::new(migrations::m202608260005_create_submissions::Migration),
            Box::new(migrations::m202608260006_create_grades::Migration),
            Box::new(migrations::m202608260007_create_user_flags::Migration),
            Box::new(migrations::m202608260008_create_user_mappings::Migration),
            Box::new(migrations::m202608260009_create_overrides::Migration),
            Box::new(migrations::m202608260010_create_annotations::Migration),
            Box::new(migrations::m202608260011_create_feedback_comments::Migration),
            Box::new(migrations::m202608260012_create_page_rotations::Migration),
        ]
    }
}
