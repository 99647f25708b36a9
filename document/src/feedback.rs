//! Feedback document generation.
//!
//! Burns the grader's rotations, annotations, and comments into the page
//! images of the combined document, appends a trailing comments section
//! with page back-links, and publishes one final artifact per grade. The
//! page-image set is duplicated into a read-only snapshot area so later
//! submission edits cannot change what the grader annotated.

use log::info;

use db::models::{annotation, feedback_comment, page_rotation, subject, user_flags};

use services::context::RequestContext;
use services::identity;
use services::workflow;

use crate::combine::{
    CombineOutcome, DocumentServices, FEEDBACK_AREA, PAGE_IMAGE_AREA, READONLY_PAGE_IMAGE_AREA,
};
use crate::error::DocumentError;
use crate::pages;
use crate::storage::{FileKey, StoredFile};

/// Whether the submitter may download their feedback document yet.
pub fn feedback_visible(subject: &subject::Model, flags: &user_flags::Model) -> bool {
    workflow::grade_visible_to_submitter(subject, flags.workflow_state)
}

fn feedback_filename(anonymous: Option<i64>, user_id: i64) -> String {
    match anonymous {
        Some(participant) => format!("participant_{}_feedback.pdf", participant),
        None => format!("user_{}_feedback.pdf", user_id),
    }
}

/// Generates the final annotated feedback document for a user's attempt.
///
/// The combined document must be `Complete`; a pending or failed pipeline
/// surfaces as an error here. Regeneration deletes the prior artifact for
/// the same grade first, so exactly one final document ever exists.
pub async fn generate_feedback_document(
    ctx: &RequestContext<'_>,
    services: &DocumentServices<'_>,
    subject: &subject::Model,
    user_id: i64,
    attempt: Option<i32>,
) -> Result<StoredFile, DocumentError> {
    let artifact = match services
        .get_combined_document(ctx, subject, user_id, attempt)
        .await?
    {
        CombineOutcome::Complete(artifact) => artifact,
        CombineOutcome::NoSource => {
            return Err(DocumentError::NotReady("the submitter has no source files"))
        }
        CombineOutcome::PendingInput => {
            return Err(DocumentError::NotReady("source conversions are still pending"))
        }
        CombineOutcome::Failed(message) => {
            return Err(DocumentError::ConversionFailed(message))
        }
    };
    let grade_id = artifact.key.item_id;

    let annotations = annotation::Model::list_for_grade(ctx.db, grade_id).await?;
    let comments = feedback_comment::Model::list_for_grade(ctx.db, grade_id).await?;
    let rotations = page_rotation::Model::list_for_grade(ctx.db, grade_id).await?;

    let images = services.page_images(grade_id)?;
    let mut marked_pages = Vec::with_capacity(images.len() + 1);
    for image in &images {
        let page_index = pages::page_index(&image.key.filename)
            .ok_or_else(|| DocumentError::NotFound(format!("page index in {}", image.key.filename)))?
            as i32;
        let degree = rotations
            .iter()
            .find(|r| r.page_number == page_index)
            .map(|r| r.degree)
            .unwrap_or(0);
        let page_annotations: Vec<annotation::Model> = annotations
            .iter()
            .filter(|a| a.page_number == page_index)
            .cloned()
            .collect();
        let page_comments: Vec<feedback_comment::Model> = comments
            .iter()
            .filter(|c| c.page_number == page_index)
            .cloned()
            .collect();
        marked_pages.push(services.backend.apply_markup(
            &image.bytes,
            degree,
            &page_annotations,
            &page_comments,
        )?);
    }

    if !comments.is_empty() {
        let entries: Vec<(usize, String)> = comments
            .iter()
            .map(|c| (c.page_number as usize, c.raw_text.clone()))
            .collect();
        marked_pages.push(services.backend.comments_appendix(&entries)?);
    }

    let document = services.backend.assemble(&marked_pages)?;

    let anonymous = if subject.blind_marking && !subject.identities_revealed {
        Some(identity::anonymous_id_for(ctx, subject, user_id).await?)
    } else {
        None
    };
    let filename = feedback_filename(anonymous, user_id);

    // One final artifact per grade.
    services.storage.delete_area(FEEDBACK_AREA, grade_id)?;
    let key = FileKey::new(FEEDBACK_AREA, grade_id, &filename);
    services.storage.put(key.clone(), document.clone(), ctx.now)?;

    // Copy-on-publish: snapshot the page images the grader annotated.
    services.storage.delete_area(READONLY_PAGE_IMAGE_AREA, grade_id)?;
    for image in &images {
        services.storage.copy(
            &image.key,
            FileKey::new(READONLY_PAGE_IMAGE_AREA, grade_id, &image.key.filename),
        )?;
    }

    info!(
        "feedback document {} published for grade {} ({} page(s))",
        filename,
        grade_id,
        images.len()
    );

    Ok(StoredFile {
        key,
        bytes: document,
        modified: ctx.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::UnsupportedConverter;
    use crate::renderer::{PdfBackend, StubBackend};
    use crate::storage::{FileStorage, MemoryStorage};
    use chrono::{DateTime, TimeZone, Utc};
    use db::models::annotation::AnnotationKind;
    use db::models::grade;
    use db::models::submission::{Model as Submission, Submitter};
    use db::models::user;
    use db::test_utils::setup_test_db;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel, Set};
    use services::context::AllowAll;

    static ALLOW: AllowAll = AllowAll;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn ctx_at(db: &DatabaseConnection, user_id: i64, now: DateTime<Utc>) -> RequestContext<'_> {
        RequestContext::new(db, user_id, now, &ALLOW)
    }

    /// Subject + student + one submitted PDF, with the grade row created so
    /// markup rows can reference it.
    async fn fixture(
        db: &DatabaseConnection,
        storage: &MemoryStorage,
    ) -> (db::models::subject::Model, user::Model, grade::Model) {
        let subject = db::models::subject::Model::create(db, "Essay").await.unwrap();
        let student = user::Model::create(db, "u1").await.unwrap();
        let submission =
            Submission::create(db, subject.id, Submitter::User(student.id), 0, at(100))
                .await
                .unwrap();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "work.pdf"),
                b"page-one".to_vec(),
                at(100),
            )
            .unwrap();
        let grade_row = grade::Model::get_or_create(db, subject.id, student.id, 0, at(100))
            .await
            .unwrap();
        (subject, student, grade_row)
    }

    async fn add_comment(db: &DatabaseConnection, grade_id: i64, page: i32, text: &str) {
        feedback_comment::ActiveModel {
            grade_id: Set(grade_id),
            page_number: Set(page),
            x: Set(10),
            y: Set(20),
            width: Set(120),
            raw_text: Set(text.to_string()),
            colour: Set("yellow".to_string()),
            created_at: Set(at(150)),
            updated_at: Set(at(150)),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_markup_and_appendix_in_final_document() {
        let db = setup_test_db().await;
        let storage = MemoryStorage::new();
        let (subject, student, grade_row) = fixture(&db, &storage).await;

        annotation::ActiveModel {
            grade_id: Set(grade_row.id),
            page_number: Set(0),
            kind: Set(AnnotationKind::Highlight),
            x: Set(1),
            y: Set(2),
            end_x: Set(3),
            end_y: Set(4),
            colour: Set("red".to_string()),
            path: Set(None),
            created_at: Set(at(150)),
            updated_at: Set(at(150)),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        add_comment(&db, grade_row.id, 0, "needs work").await;
        page_rotation::ActiveModel {
            grade_id: Set(grade_row.id),
            page_number: Set(0),
            degree: Set(90),
            created_at: Set(at(150)),
            updated_at: Set(at(150)),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, 42, at(200));
        let document = generate_feedback_document(&ctx, &services, &subject, student.id, None)
            .await
            .unwrap();

        assert_eq!(document.key.filename, format!("user_{}_feedback.pdf", student.id));
        // Page 0 carries the rotation, one annotation, and one comment; the
        // appendix follows with a back-link.
        let page = StubBackend.render_page(&document.bytes, 0).unwrap();
        assert!(String::from_utf8_lossy(&page).contains("MARKED[r90,a1,c1]"));
        let appendix = StubBackend.render_page(&document.bytes, 1).unwrap();
        assert!(String::from_utf8_lossy(&appendix).contains("Page 1: needs work"));
    }

    #[tokio::test]
    async fn test_regeneration_leaves_one_artifact() {
        let db = setup_test_db().await;
        let storage = MemoryStorage::new();
        let (subject, student, grade_row) = fixture(&db, &storage).await;

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, 42, at(200));
        generate_feedback_document(&ctx, &services, &subject, student.id, None)
            .await
            .unwrap();
        add_comment(&db, grade_row.id, 0, "second pass").await;
        generate_feedback_document(&ctx, &services, &subject, student.id, None)
            .await
            .unwrap();

        let artifacts = storage.list(FEEDBACK_AREA, grade_row.id).unwrap();
        assert_eq!(artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_readonly_snapshot_survives_submission_edits() {
        let db = setup_test_db().await;
        let storage = MemoryStorage::new();
        let (subject, student, grade_row) = fixture(&db, &storage).await;

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, 42, at(200));
        generate_feedback_document(&ctx, &services, &subject, student.id, None)
            .await
            .unwrap();

        let snapshot = storage
            .list(READONLY_PAGE_IMAGE_AREA, grade_row.id)
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        let original_bytes = snapshot[0].bytes.clone();

        // The student replaces their file after publication.
        let submission =
            Submission::find_latest(&db, subject.id, Submitter::User(student.id))
                .await
                .unwrap()
                .unwrap();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "work.pdf"),
                b"rewritten".to_vec(),
                at(300),
            )
            .unwrap();
        let mut active = submission.into_active_model();
        active.updated_at = Set(at(300));
        active.update(&db).await.unwrap();

        let ctx = ctx_at(&db, 42, at(400));
        services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();

        // Mutable page images changed; the published snapshot did not.
        let live = storage.list(PAGE_IMAGE_AREA, grade_row.id).unwrap();
        assert!(String::from_utf8_lossy(&live[0].bytes).contains("rewritten"));
        let snapshot = storage
            .list(READONLY_PAGE_IMAGE_AREA, grade_row.id)
            .unwrap();
        assert_eq!(snapshot[0].bytes, original_bytes);
    }

    #[tokio::test]
    async fn test_requires_complete_pipeline() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();
        let storage = MemoryStorage::new();
        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);

        let ctx = ctx_at(&db, 42, at(200));
        let result =
            generate_feedback_document(&ctx, &services, &subject, student.id, None).await;
        assert!(matches!(result, Err(DocumentError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_blind_marking_uses_participant_filename() {
        let db = setup_test_db().await;
        let storage = MemoryStorage::new();
        let (subject, student, _) = fixture(&db, &storage).await;
        let mut active = subject.into_active_model();
        active.blind_marking = Set(true);
        let subject = active.update(&db).await.unwrap();

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, 42, at(200));
        let document = generate_feedback_document(&ctx, &services, &subject, student.id, None)
            .await
            .unwrap();
        assert_eq!(document.key.filename, "participant_1_feedback.pdf");
    }

    #[tokio::test]
    async fn test_visibility_follows_workflow_state() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let mut active = subject.into_active_model();
        active.marking_workflow = Set(true);
        let subject = active.update(&db).await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();

        let mut flags = user_flags::Model::get_or_create(&db, subject.id, student.id, at(100))
            .await
            .unwrap();
        assert!(!feedback_visible(&subject, &flags));

        flags.workflow_state = db::models::user_flags::WorkflowState::Released;
        assert!(feedback_visible(&subject, &flags));
    }
}
