//! Intake: the synchronous call the external HTTP surface makes to turn an
//! upload announcement into a document row and an initial job, performing
//! content-hash dedup before any job is queued.
//!
//! This crate has no HTTP concerns of its own — no signed URLs, no auth, no
//! request parsing. It exposes a plain async function over [`Repository`]
//! so the HTTP-facing crate stays a thin adapter.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use vellum_common::CommonError;
use vellum_data::{DatabaseError, Document, ids};

const CONTENT_HASH_LEN: usize = 64;

fn content_hash_regex() -> Option<&'static Regex> {
    static CONTENT_HASH_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    CONTENT_HASH_REGEX.get_or_init(|| Regex::new(r"^[0-9a-f]{64}$").ok()).as_ref()
}

/// Inputs to [`intake`], mirroring the upload announcement the HTTP surface
/// receives before it hands the caller a place to put the bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRequest {
    pub user_id: String,
    pub filename: String,
    pub mime: String,
    pub byte_length: i64,
    /// Lowercase hex SHA-256 of the upload's bytes.
    pub content_hash: String,
}

/// Result of a successful intake call. `upload_target` is opaque to this
/// crate; the HTTP surface is responsible for turning it into a signed URL
/// or equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub upload_target: String,
    pub upload_expires_at: DateTime<Utc>,
}

/// Machine-readable validation failure codes, surfaced to callers verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInputCode {
    InvalidFilename,
    InvalidMime,
    InvalidByteLength,
    InvalidContentHash,
}

impl InvalidInputCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFilename => "invalid_filename",
            Self::InvalidMime => "invalid_mime",
            Self::InvalidByteLength => "invalid_byte_length",
            Self::InvalidContentHash => "invalid_content_hash",
        }
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    /// Synchronous validation failure; no document or job was created.
    #[error("{code}: {message}", code = code.as_str())]
    InvalidInput { code: InvalidInputCode, message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl IntakeError {
    fn invalid(code: InvalidInputCode, message: impl Into<String>) -> Self {
        Self::InvalidInput { code, message: message.into() }
    }

    /// The machine-readable code for an `InvalidInput` failure, `None` otherwise.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput { code, .. } => Some(code.as_str()),
            Self::Database(_) | Self::Configuration(_) | Self::Other(_) => None,
        }
    }
}

impl CommonError for IntakeError {
    fn io_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    fn parse_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    fn other_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

/// How long an issued upload target remains valid. Tied to the out-of-scope
/// signed-URL mechanics, not a pipeline knob, so it lives here rather than
/// in `vellum-config`.
const UPLOAD_TTL_SECS: i64 = 15 * 60;

/// Strip control characters (code points below `0x20`) from a filename and
/// reject it if nothing is left.
fn validate_filename(filename: &str) -> IntakeResult<String> {
    let stripped: String = filename.chars().filter(|c| (*c as u32) >= 0x20).collect();
    if stripped.is_empty() {
        return Err(IntakeError::invalid(
            InvalidInputCode::InvalidFilename,
            "filename must be non-empty after stripping control characters",
        ));
    }
    Ok(stripped)
}

fn validate_mime(mime: &str) -> IntakeResult<()> {
    if mime == "application/pdf" {
        Ok(())
    } else {
        Err(IntakeError::invalid(InvalidInputCode::InvalidMime, format!("unsupported mime type: {mime}")))
    }
}

fn validate_byte_length(byte_length: i64, max_file_size_bytes: u64) -> IntakeResult<()> {
    if byte_length <= 0 {
        return Err(IntakeError::invalid(InvalidInputCode::InvalidByteLength, "byte_length must be greater than 0"));
    }
    let max = i64::try_from(max_file_size_bytes).unwrap_or(i64::MAX);
    if byte_length > max {
        return Err(IntakeError::invalid(
            InvalidInputCode::InvalidByteLength,
            format!("byte_length {byte_length} exceeds the {max} byte limit"),
        ));
    }
    Ok(())
}

fn validate_content_hash(content_hash: &str) -> IntakeResult<()> {
    let matches = content_hash_regex().map_or_else(
        || content_hash.len() == CONTENT_HASH_LEN && content_hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()),
        |regex| regex.is_match(content_hash),
    );
    if matches {
        Ok(())
    } else {
        Err(IntakeError::invalid(
            InvalidInputCode::InvalidContentHash,
            "content_hash must be 64 lowercase hex characters",
        ))
    }
}

fn validate(request: &IntakeRequest, max_file_size_bytes: u64) -> IntakeResult<String> {
    let filename = validate_filename(&request.filename)?;
    validate_mime(&request.mime)?;
    validate_byte_length(request.byte_length, max_file_size_bytes)?;
    validate_content_hash(&request.content_hash)?;
    Ok(filename)
}

fn extension_of(filename: &str) -> &str {
    filename.rsplit('.').next().filter(|ext| !ext.is_empty() && *ext != filename).unwrap_or("bin")
}

/// Blob store location for a freshly-intaken raw artifact:
/// `files/user/<user_id>/raw/<ts_hash>_<doc_hash>.<ext>`.
fn raw_path_for(user_id: &str, document_id: Uuid, now: DateTime<Utc>, ext: &str) -> String {
    let ts_hash = &ids::hash_content(&now.timestamp_nanos_opt().unwrap_or_default().to_string())[..8];
    let doc_hash = &ids::hash_content(&document_id.to_string())[..8];
    format!("files/user/{user_id}/raw/{ts_hash}_{doc_hash}.{ext}")
}

/// Validate an upload announcement and resolve it to a document/job pair:
///
/// 1. Same user, same content hash → return the existing document, paired
///    with a new job already at the terminal stage.
/// 2. Different user, same content hash → clone the existing document's
///    parsed output and chunks for this user.
/// 3. Otherwise → insert a brand-new document and queue it at `job_validated`.
///
/// # Errors
/// Returns [`IntakeError::InvalidInput`] if any field fails validation, or
/// [`IntakeError::Database`] if the store operation fails.
pub async fn intake(
    repo: &dyn vellum_data::Repository,
    namespace: Uuid,
    max_file_size_bytes: u64,
    request: &IntakeRequest,
    now: DateTime<Utc>,
) -> IntakeResult<IntakeResponse> {
    let filename = validate(request, max_file_size_bytes)?;

    if let Some(existing) = repo.find_user_document(&request.user_id, &request.content_hash).await? {
        let (document, job) = repo.insert_document(&existing).await?;
        return Ok(response_for(&document, job.job_id, now));
    }

    if let Some(source) = repo.find_any_document(&request.content_hash).await? {
        let (document, job) = repo.clone_document_for_user(source.document_id, &request.user_id, &filename).await?;
        return Ok(response_for(&document, job.job_id, now));
    }

    let document_id = ids::document_id(namespace, &request.user_id, &request.content_hash);
    let ext = extension_of(&filename);
    let raw_path = raw_path_for(&request.user_id, document_id, now, ext);

    let document = Document {
        document_id,
        user_id: request.user_id.clone(),
        filename,
        mime: request.mime.clone(),
        byte_length: request.byte_length,
        content_hash: request.content_hash.clone(),
        parsed_hash: None,
        raw_path,
        parsed_path: None,
        processing_status: "job_validated".to_string(),
        created_at: now,
        updated_at: now,
    };

    let (document, job) = repo.insert_document(&document).await?;
    Ok(response_for(&document, job.job_id, now))
}

fn response_for(document: &Document, job_id: Uuid, now: DateTime<Utc>) -> IntakeResponse {
    IntakeResponse {
        job_id,
        document_id: document.document_id,
        upload_target: document.raw_path.clone(),
        upload_expires_at: now + chrono::Duration::seconds(UPLOAD_TTL_SECS),
    }
}

#[cfg(test)]
mod tests {
    use vellum_data::MockRepository;

    use super::*;

    const NS: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");
    const MAX_SIZE: u64 = 25 * 1024 * 1024;

    fn request(user_id: &str, hash: &str) -> IntakeRequest {
        IntakeRequest {
            user_id: user_id.to_string(),
            filename: "report.pdf".to_string(),
            mime: "application/pdf".to_string(),
            byte_length: 1024,
            content_hash: hash.to_string(),
        }
    }

    fn hash(byte: u8) -> String {
        format!("{byte:02x}").repeat(32)
    }

    #[tokio::test]
    async fn happy_path_queues_a_brand_new_document() {
        let repo = MockRepository::new(NS);
        let now = chrono::Utc::now();
        let req = request("u1", &hash(0xab));

        let response = intake(&repo, NS, MAX_SIZE, &req, now).await.unwrap();

        assert_eq!(response.document_id, ids::document_id(NS, "u1", &hash(0xab)));
        let document = repo.get_document(response.document_id).await.unwrap();
        assert_eq!(document.processing_status, "job_validated");
    }

    #[tokio::test]
    async fn same_user_reupload_returns_existing_document_and_a_done_job() {
        let repo = MockRepository::new(NS);
        let now = chrono::Utc::now();
        let req = request("u1", &hash(0x11));

        let first = intake(&repo, NS, MAX_SIZE, &req, now).await.unwrap();
        let second = intake(&repo, NS, MAX_SIZE, &req, now).await.unwrap();

        assert_eq!(first.document_id, second.document_id);
        assert_ne!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn cross_user_duplicate_clones_the_document_for_the_new_owner() {
        let repo = MockRepository::new(NS);
        let now = chrono::Utc::now();
        let shared_hash = hash(0x22);

        let first = intake(&repo, NS, MAX_SIZE, &request("u1", &shared_hash), now).await.unwrap();
        let second = intake(&repo, NS, MAX_SIZE, &request("u2", &shared_hash), now).await.unwrap();

        assert_ne!(first.document_id, second.document_id);
        assert_eq!(second.document_id, ids::document_id(NS, "u2", &shared_hash));
    }

    #[tokio::test]
    async fn rejects_byte_length_zero() {
        let repo = MockRepository::new(NS);
        let mut req = request("u1", &hash(0x33));
        req.byte_length = 0;

        let err = intake(&repo, NS, MAX_SIZE, &req, chrono::Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_byte_length"));
    }

    #[tokio::test]
    async fn accepts_exactly_the_max_size_and_rejects_one_byte_over() {
        let repo = MockRepository::new(NS);
        let mut ok = request("u1", &hash(0x44));
        ok.byte_length = i64::try_from(MAX_SIZE).unwrap();
        intake(&repo, NS, MAX_SIZE, &ok, chrono::Utc::now()).await.unwrap();

        let mut too_big = request("u1", &hash(0x55));
        too_big.byte_length = i64::try_from(MAX_SIZE).unwrap() + 1;
        let err = intake(&repo, NS, MAX_SIZE, &too_big, chrono::Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_byte_length"));
    }

    #[tokio::test]
    async fn rejects_a_content_hash_that_is_not_lowercase_hex_sha256() {
        let repo = MockRepository::new(NS);
        let req = request("u1", "not-a-hash");

        let err = intake(&repo, NS, MAX_SIZE, &req, chrono::Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_content_hash"));
    }

    #[tokio::test]
    async fn rejects_a_non_pdf_mime() {
        let repo = MockRepository::new(NS);
        let mut req = request("u1", &hash(0x66));
        req.mime = "image/png".to_string();

        let err = intake(&repo, NS, MAX_SIZE, &req, chrono::Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_mime"));
    }

    #[tokio::test]
    async fn strips_control_characters_from_filename_and_rejects_if_nothing_remains() {
        let repo = MockRepository::new(NS);
        let mut req = request("u1", &hash(0x77));
        req.filename = "\u{0007}\u{0008}".to_string();

        let err = intake(&repo, NS, MAX_SIZE, &req, chrono::Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), Some("invalid_filename"));
    }
}
