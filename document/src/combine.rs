//! Document combination pipeline.
//!
//! Per (subject, submitter, attempt) the pipeline moves through
//! `NoSource -> PendingInput -> Complete | Failed`. Artifacts are cached
//! under the grade id and regenerated when the source submission changes
//! or when the cached artifact turns out to be the blank placeholder.

use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sha1::{Digest, Sha1};

use db::models::grade;
use db::models::submission::{Model as Submission, Submitter};
use db::models::subject;

use services::context::RequestContext;
use services::lifecycle;
use services::plugins::{SubmissionPlugin, SUBMISSION_PLUGINS};

use crate::converter::{ConversionOutcome, FormatConverter};
use crate::error::DocumentError;
use crate::pages;
use crate::renderer::PdfBackend;
use crate::storage::{FileKey, FileStorage, StoredFile};

pub const COMBINED_AREA: &str = "combined";
pub const PAGE_IMAGE_AREA: &str = "pageimages";
pub const READONLY_PAGE_IMAGE_AREA: &str = "pageimagesreadonly";
pub const FEEDBACK_AREA: &str = "feedbackdocuments";

pub const COMBINED_FILENAME: &str = "combined.pdf";
pub const ONLINE_TEXT_FILENAME: &str = "onlinetext.html";

/// sha1 of the well-known single-page blank PDF placeholder.
pub const BLANK_PDF_HASH: &str = "4c803c92c71f21b423d13de570c8a09e0a31c718";

/// Canonical blank 1-page PDF 1.4 fixture. Artifacts matching either this
/// fixture's hash or [`BLANK_PDF_HASH`] are treated as absent.
pub const BLANK_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >>\nendobj\n\
trailer\n<< /Size 4 /Root 1 0 R >>\n\
%%EOF\n";

fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Whether the bytes are a known blank placeholder rather than real content.
pub fn is_blank_placeholder(bytes: &[u8]) -> bool {
    let digest = sha1_hex(bytes);
    digest == BLANK_PDF_HASH || digest == sha1_hex(BLANK_PDF)
}

/// Result of a combined-document request.
#[derive(Debug, Clone, PartialEq)]
pub enum CombineOutcome {
    /// The submitter has no source files at all.
    NoSource,
    /// At least one source conversion is still outstanding; retry later.
    PendingInput,
    Complete(StoredFile),
    Failed(String),
}

/// The document pipeline with its three external collaborators.
pub struct DocumentServices<'a> {
    pub storage: &'a dyn FileStorage,
    pub converter: &'a dyn FormatConverter,
    pub backend: &'a dyn PdfBackend,
    /// Wall-clock budget for page-image generation, seconds.
    page_budget_secs: Option<u64>,
}

impl<'a> DocumentServices<'a> {
    pub fn new(
        storage: &'a dyn FileStorage,
        converter: &'a dyn FormatConverter,
        backend: &'a dyn PdfBackend,
    ) -> Self {
        Self {
            storage,
            converter,
            backend,
            page_budget_secs: None,
        }
    }

    pub fn with_page_budget(mut self, secs: u64) -> Self {
        self.page_budget_secs = Some(secs);
        self
    }

    /// Applies the configured page-generation budget.
    pub fn with_configured_page_budget(self) -> Self {
        let secs = common::config::Config::get().document_generation_timeout_secs;
        self.with_page_budget(secs)
    }

    /// Returns the combined document for a user's attempt, regenerating it
    /// when the cached artifact is stale or a blank placeholder.
    ///
    /// `attempt = None` means the latest attempt. Repeated calls with no
    /// submission changes return the cached artifact byte-identically.
    pub async fn get_combined_document(
        &self,
        ctx: &RequestContext<'_>,
        subject: &subject::Model,
        user_id: i64,
        attempt: Option<i32>,
    ) -> Result<CombineOutcome, DocumentError> {
        let submitter = lifecycle::resolve_submitter(ctx, subject, user_id).await?;
        let submission = match self.find_submission(ctx, subject, submitter, attempt).await? {
            Some(submission) => submission,
            None => return Ok(CombineOutcome::NoSource),
        };
        let grade = grade::Model::get_or_create(
            ctx.db,
            subject.id,
            user_id,
            submission.attempt_number,
            ctx.now,
        )
        .await?;

        let key = FileKey::new(COMBINED_AREA, grade.id, COMBINED_FILENAME);
        if let Some(artifact) = self.storage.get(&key)? {
            let stale = artifact.modified < submission.updated_at;
            let blank = is_blank_placeholder(&artifact.bytes);
            if !stale && !blank {
                debug!("combined document for grade {} served from cache", grade.id);
                return Ok(CombineOutcome::Complete(artifact));
            }
            self.storage.delete_area(COMBINED_AREA, grade.id)?;
            self.storage.delete_area(PAGE_IMAGE_AREA, grade.id)?;
        }

        let sources = self.collect_sources(subject, &submission)?;
        if sources.is_empty() {
            return Ok(CombineOutcome::NoSource);
        }

        let mut blobs = Vec::with_capacity(sources.len());
        for file in &sources {
            if file.extension() == Some("pdf") {
                blobs.push(file.bytes.clone());
                continue;
            }
            match self.converter.start_conversion(file, "pdf")? {
                ConversionOutcome::Ready(blob) => blobs.push(blob),
                ConversionOutcome::Pending => {
                    debug!(
                        "conversion of {} for grade {} still pending",
                        file.key.filename, grade.id
                    );
                    return Ok(CombineOutcome::PendingInput);
                }
                ConversionOutcome::Failed(message) => {
                    return Ok(CombineOutcome::Failed(message));
                }
            }
        }

        let combined = self.backend.combine(&blobs)?;
        self.generate_page_images(grade.id, &combined, ctx.now)?;
        self.storage.put(key.clone(), combined.clone(), ctx.now)?;
        info!(
            "combined {} source file(s) into {} for grade {}",
            sources.len(),
            COMBINED_FILENAME,
            grade.id
        );

        Ok(CombineOutcome::Complete(StoredFile {
            key,
            bytes: combined,
            modified: ctx.now,
        }))
    }

    /// Page images of the combined document, in display order.
    pub fn page_images(&self, grade_id: i64) -> Result<Vec<StoredFile>, DocumentError> {
        Ok(pages::in_page_order(
            self.storage.list(PAGE_IMAGE_AREA, grade_id)?,
        ))
    }

    async fn find_submission(
        &self,
        ctx: &RequestContext<'_>,
        subject: &subject::Model,
        submitter: Submitter,
        attempt: Option<i32>,
    ) -> Result<Option<Submission>, DocumentError> {
        match attempt {
            Some(n) => {
                let found = Submission::find_attempt(ctx.db, subject.id, submitter, n)
                    .await?
                    .ok_or_else(|| DocumentError::NotFound(format!("attempt {}", n)))?;
                Ok(Some(found))
            }
            None => Ok(Submission::find_latest(ctx.db, subject.id, submitter).await?),
        }
    }

    /// All source files across the enabled submission plugins, ordered by
    /// filename so page order is stable.
    fn collect_sources(
        &self,
        subject: &subject::Model,
        submission: &Submission,
    ) -> Result<Vec<StoredFile>, DocumentError> {
        let mut sources = Vec::new();
        for plugin in SUBMISSION_PLUGINS {
            if !plugin.is_enabled(subject) {
                continue;
            }
            match plugin {
                SubmissionPlugin::File => {
                    sources.extend(self.storage.list(plugin.file_area(), submission.id)?);
                }
                SubmissionPlugin::OnlineText => {
                    if let Some(text) = &submission.online_text {
                        let html =
                            format!("<html><body>{}</body></html>", text).into_bytes();
                        sources.push(StoredFile {
                            key: FileKey::new(
                                plugin.file_area(),
                                submission.id,
                                ONLINE_TEXT_FILENAME,
                            ),
                            bytes: html,
                            modified: submission.updated_at,
                        });
                    }
                }
            }
        }
        sources.sort_by(|a, b| a.key.filename.cmp(&b.key.filename));
        Ok(sources)
    }

    fn generate_page_images(
        &self,
        grade_id: i64,
        combined: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        self.storage.delete_area(PAGE_IMAGE_AREA, grade_id)?;
        let started = Instant::now();
        let count = self.backend.page_count(combined)?;
        for page_index in 0..count {
            if let Some(budget) = self.page_budget_secs {
                if started.elapsed().as_secs() >= budget {
                    return Err(DocumentError::BudgetExceeded(budget));
                }
            }
            let png = self.backend.render_page(combined, page_index)?;
            self.storage.put(
                FileKey::new(PAGE_IMAGE_AREA, grade_id, &pages::page_image_name(page_index)),
                png,
                now,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::UnsupportedConverter;
    use crate::renderer::StubBackend;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;
    use db::models::user;
    use db::test_utils::setup_test_db;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel, Set};
    use services::context::AllowAll;
    use std::sync::Mutex;

    static ALLOW: AllowAll = AllowAll;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn ctx_at(db: &DatabaseConnection, user_id: i64, now: DateTime<Utc>) -> RequestContext<'_> {
        RequestContext::new(db, user_id, now, &ALLOW)
    }

    /// Converts anything after an initial run of `Pending` answers, counting
    /// every call.
    struct CountingConverter {
        pending_first: Mutex<usize>,
        calls: Mutex<usize>,
    }

    impl CountingConverter {
        fn new(pending_first: usize) -> Self {
            Self {
                pending_first: Mutex::new(pending_first),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl FormatConverter for CountingConverter {
        fn start_conversion(
            &self,
            file: &StoredFile,
            _target_format: &str,
        ) -> Result<ConversionOutcome, DocumentError> {
            *self.calls.lock().unwrap() += 1;
            let mut pending = self.pending_first.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Ok(ConversionOutcome::Pending);
            }
            let mut out = b"CONV:".to_vec();
            out.extend_from_slice(&file.bytes);
            Ok(ConversionOutcome::Ready(out))
        }
    }

    async fn online_text_fixture(
        db: &DatabaseConnection,
        text: &str,
        when: DateTime<Utc>,
    ) -> (db::models::subject::Model, user::Model) {
        let subject = db::models::subject::Model::create(db, "Essay").await.unwrap();
        let mut active = subject.into_active_model();
        active.online_text_enabled = Set(true);
        let subject = active.update(db).await.unwrap();

        let student = user::Model::create(db, "u1").await.unwrap();
        let submission =
            Submission::create(db, subject.id, Submitter::User(student.id), 0, when)
                .await
                .unwrap();
        let mut active = submission.into_active_model();
        active.online_text = Set(Some(text.to_string()));
        active.update(db).await.unwrap();

        (subject, student)
    }

    #[tokio::test]
    async fn test_no_submission_means_no_source() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();
        let storage = MemoryStorage::new();
        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);

        let ctx = ctx_at(&db, student.id, at(100));
        let outcome = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert_eq!(outcome, CombineOutcome::NoSource);
    }

    #[tokio::test]
    async fn test_pdf_sources_combined_and_page_images_written() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();
        let submission =
            Submission::create(&db, subject.id, Submitter::User(student.id), 0, at(100))
                .await
                .unwrap();

        let storage = MemoryStorage::new();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "a.pdf"),
                b"alpha".to_vec(),
                at(100),
            )
            .unwrap();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "b.pdf"),
                b"beta".to_vec(),
                at(100),
            )
            .unwrap();

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, student.id, at(200));
        let outcome = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();

        let artifact = match outcome {
            CombineOutcome::Complete(artifact) => artifact,
            other => panic!("expected Complete, got {:?}", other),
        };
        assert_eq!(StubBackend.page_count(&artifact.bytes).unwrap(), 2);

        let grade_id = artifact.key.item_id;
        let images = services.page_images(grade_id).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].key.filename, "image_page0.png");
        assert_eq!(images[1].key.filename, "image_page1.png");
    }

    #[tokio::test]
    async fn test_cached_artifact_is_idempotent() {
        let db = setup_test_db().await;
        let (subject, student) = online_text_fixture(&db, "hello", at(100)).await;
        let storage = MemoryStorage::new();
        let converter = CountingConverter::new(0);
        let services = DocumentServices::new(&storage, &converter, &StubBackend);

        let ctx = ctx_at(&db, student.id, at(200));
        let first = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        let second = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(converter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_artifact_regenerated_after_submission_change() {
        let db = setup_test_db().await;
        let (subject, student) = online_text_fixture(&db, "hello", at(100)).await;
        let storage = MemoryStorage::new();
        let converter = CountingConverter::new(0);
        let services = DocumentServices::new(&storage, &converter, &StubBackend);

        let ctx = ctx_at(&db, student.id, at(200));
        services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert_eq!(converter.call_count(), 1);

        // The student edits their submission after the combine.
        let submission =
            Submission::find_latest(&db, subject.id, Submitter::User(student.id))
                .await
                .unwrap()
                .unwrap();
        let mut active = submission.into_active_model();
        active.online_text = Set(Some("edited".to_string()));
        active.updated_at = Set(at(300));
        active.update(&db).await.unwrap();

        let ctx = ctx_at(&db, student.id, at(400));
        let outcome = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert_eq!(converter.call_count(), 2);
        match outcome {
            CombineOutcome::Complete(artifact) => {
                let page = StubBackend.render_page(&artifact.bytes, 0).unwrap();
                assert!(String::from_utf8_lossy(&page).contains("edited"));
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_placeholder_treated_as_absent() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();
        Submission::create(&db, subject.id, Submitter::User(student.id), 0, at(100))
            .await
            .unwrap();
        let grade_row = grade::Model::get_or_create(&db, subject.id, student.id, 0, at(100))
            .await
            .unwrap();

        let storage = MemoryStorage::new();
        // A blank placeholder cached with a fresh timestamp.
        storage
            .put(
                FileKey::new(COMBINED_AREA, grade_row.id, COMBINED_FILENAME),
                BLANK_PDF.to_vec(),
                at(500),
            )
            .unwrap();

        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);
        let ctx = ctx_at(&db, student.id, at(600));
        let outcome = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        // No real sources behind the placeholder: absent, never Complete.
        assert_eq!(outcome, CombineOutcome::NoSource);
        assert!(is_blank_placeholder(BLANK_PDF));
    }

    #[tokio::test]
    async fn test_pending_conversion_polls_until_ready() {
        let db = setup_test_db().await;
        let (subject, student) = online_text_fixture(&db, "hello", at(100)).await;
        let storage = MemoryStorage::new();
        let converter = CountingConverter::new(1);
        let services = DocumentServices::new(&storage, &converter, &StubBackend);

        let ctx = ctx_at(&db, student.id, at(200));
        let first = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert_eq!(first, CombineOutcome::PendingInput);
        // Nothing is cached while input is pending.
        assert!(storage.list(COMBINED_AREA, 1).unwrap().is_empty());

        let second = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert!(matches!(second, CombineOutcome::Complete(_)));
    }

    #[tokio::test]
    async fn test_exhausted_page_budget_is_fatal() {
        let db = setup_test_db().await;
        let subject = db::models::subject::Model::create(&db, "Essay").await.unwrap();
        let student = user::Model::create(&db, "u1").await.unwrap();
        let submission =
            Submission::create(&db, subject.id, Submitter::User(student.id), 0, at(100))
                .await
                .unwrap();

        let storage = MemoryStorage::new();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "a.pdf"),
                b"alpha".to_vec(),
                at(100),
            )
            .unwrap();
        storage
            .put(
                FileKey::new("submission_files", submission.id, "b.pdf"),
                b"beta".to_vec(),
                at(100),
            )
            .unwrap();

        // A zero-second budget is exhausted before the first page renders.
        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend)
            .with_page_budget(0);
        let ctx = ctx_at(&db, student.id, at(200));
        let result = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await;
        assert!(matches!(result, Err(DocumentError::BudgetExceeded(0))));

        // The combined artifact is never cached after an aborted render.
        let grade_row = grade::Model::get_or_create(&db, subject.id, student.id, 0, at(200))
            .await
            .unwrap();
        assert!(storage.list(COMBINED_AREA, grade_row.id).unwrap().is_empty());
        assert!(storage.list(PAGE_IMAGE_AREA, grade_row.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_conversion_reported() {
        let db = setup_test_db().await;
        let (subject, student) = online_text_fixture(&db, "hello", at(100)).await;
        let storage = MemoryStorage::new();
        let services = DocumentServices::new(&storage, &UnsupportedConverter, &StubBackend);

        let ctx = ctx_at(&db, student.id, at(200));
        let outcome = services
            .get_combined_document(&ctx, &subject, student.id, None)
            .await
            .unwrap();
        assert!(matches!(outcome, CombineOutcome::Failed(_)));
    }
}
