use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel};

use db::models::subject;

use crate::context::{AllowAll, RequestContext};

static ALLOW: AllowAll = AllowAll;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn ctx_at<'a>(db: &'a DatabaseConnection, user_id: i64, now: DateTime<Utc>) -> RequestContext<'a> {
    RequestContext::new(db, user_id, now, &ALLOW)
}

/// Creates a subject and applies configuration tweaks in one step.
pub async fn subject_with(
    db: &DatabaseConnection,
    configure: impl FnOnce(&mut subject::ActiveModel),
) -> subject::Model {
    let created = subject::Model::create(db, "Test subject").await.unwrap();
    let mut active = created.into_active_model();
    configure(&mut active);
    active.update(db).await.unwrap()
}
