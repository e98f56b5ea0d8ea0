//! Image ingestion shared by the file picker, drag-and-drop and clipboard paste.
//!
//! Every trigger only produces a list of [`Candidate`]s and applies its own filter;
//! [`ingest_batch`] does the decoding for all of them. Decodes within one batch run
//! concurrently and the outcome keeps input order, so the caller can append the whole
//! batch at once.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use snafu::{ResultExt, Snafu};

use crate::chat::data_uri;
use crate::chat::message::Attachment;

pub const IMAGE_MIME_PREFIX: &str = "image/";
pub const PASTED_IMAGE_PREFIX: &str = "pasted-image";

/// Which user gesture produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestSource {
    FilePicker,
    Drop,
    Paste,
}

impl IngestSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::FilePicker => "file-picker",
            Self::Drop => "drop",
            Self::Paste => "paste",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateBody {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A raw file-like input awaiting decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub mime: String,
    pub body: CandidateBody,
}

impl Candidate {
    /// Builds a candidate for a file on disk, sniffing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            name,
            mime,
            body: CandidateBody::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            body: CandidateBody::Bytes(bytes),
        }
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime)
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim()
        .get(..IMAGE_MIME_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMAGE_MIME_PREFIX))
}

/// Files chosen in the picker. The dialog has no MIME filter of its own, so filter here.
pub fn picker_candidates(paths: &[PathBuf]) -> Vec<Candidate> {
    image_candidates(paths)
}

/// Files dropped on the upload area. Non-images are discarded silently.
pub fn drop_candidates(paths: &[PathBuf]) -> Vec<Candidate> {
    image_candidates(paths)
}

fn image_candidates(paths: &[PathBuf]) -> Vec<Candidate> {
    paths
        .iter()
        .map(|path| Candidate::from_path(path))
        .filter(Candidate::is_image)
        .collect()
}

/// One clipboard entry, reduced to what ingestion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastedItem {
    pub mime: String,
    /// `None` when the entry advertises a type but carries no file payload.
    pub bytes: Option<Vec<u8>>,
}

impl PastedItem {
    pub fn text() -> Self {
        Self {
            mime: "text/plain".to_string(),
            bytes: None,
        }
    }

    pub fn image(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes: Some(bytes),
        }
    }
}

/// What to do with a paste gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PastePlan {
    /// No image items: let the default text paste run.
    PassThrough,
    /// At least one image item: suppress the default paste and ingest these.
    Ingest(Vec<Candidate>),
}

impl PastePlan {
    pub fn suppresses_default(&self) -> bool {
        matches!(self, Self::Ingest(_))
    }
}

pub fn plan_paste(items: Vec<PastedItem>, timestamp_ms: u128) -> PastePlan {
    let image_items = items
        .into_iter()
        .filter(|item| is_image_mime(&item.mime))
        .collect::<Vec<_>>();

    if image_items.is_empty() {
        return PastePlan::PassThrough;
    }

    let candidates = image_items
        .into_iter()
        .filter_map(|item| {
            let bytes = item.bytes?;
            let name = pasted_image_name(&item.mime, timestamp_ms);
            Some(Candidate::from_bytes(name, item.mime, bytes))
        })
        .collect();

    PastePlan::Ingest(candidates)
}

/// `pasted-image-<ms>.<subtype>`; names from one millisecond collide.
pub fn pasted_image_name(mime: &str, timestamp_ms: u128) -> String {
    let subtype = mime.split('/').nth(1).unwrap_or_default();
    format!("{PASTED_IMAGE_PREFIX}-{timestamp_ms}.{subtype}")
}

pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IngestError {
    #[snafu(display("failed to read image '{name}' from {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of one batch: decoded attachments in input order, plus per-file failures.
#[derive(Debug)]
pub struct IngestOutcome {
    pub source: IngestSource,
    pub attachments: Vec<Attachment>,
    pub failures: Vec<IngestError>,
}

pub async fn decode_candidate(candidate: Candidate) -> Result<Attachment, IngestError> {
    let Candidate { name, mime, body } = candidate;
    let bytes = match body {
        CandidateBody::Bytes(bytes) => bytes,
        CandidateBody::Path(path) => tokio::fs::read(&path).await.context(ReadFileSnafu {
            stage: "read-candidate-file",
            name: name.clone(),
            path: path.clone(),
        })?,
    };

    Ok(Attachment::new(data_uri::encode(&mime, &bytes), name, mime))
}

pub async fn ingest_batch(source: IngestSource, candidates: Vec<Candidate>) -> IngestOutcome {
    let total = candidates.len();
    let results = join_all(candidates.into_iter().map(decode_candidate)).await;

    let mut attachments = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(attachment) => attachments.push(attachment),
            Err(error) => {
                tracing::warn!(
                    source = source.label(),
                    error = %error,
                    "dropping image that could not be decoded"
                );
                failures.push(error);
            }
        }
    }

    tracing::debug!(
        source = source.label(),
        total,
        decoded = attachments.len(),
        failed = failures.len(),
        "image batch decoded"
    );

    IngestOutcome {
        source,
        attachments,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::data_uri::DataUri;
    use crate::chat::image_cache::ImageKey;
    use pretty_assertions::assert_eq;

    fn write_files(dir: &Path, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, bytes)| {
                let path = dir.join(name);
                std::fs::write(&path, bytes).expect("fixture written");
                path
            })
            .collect()
    }

    fn names(attachments: &[Attachment]) -> Vec<&str> {
        attachments.iter().map(|item| item.name.as_str()).collect()
    }

    #[tokio::test]
    async fn valid_batch_decodes_every_file_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_files(
            dir.path(),
            &[("c.png", b"ccc"), ("a.jpg", b"aaaa"), ("b.gif", b"b")],
        );

        let outcome = ingest_batch(IngestSource::FilePicker, picker_candidates(&paths)).await;

        assert!(outcome.failures.is_empty());
        assert_eq!(names(&outcome.attachments), vec!["c.png", "a.jpg", "b.gif"]);
        assert_eq!(outcome.attachments[1].mime, "image/jpeg");
        let decoded = DataUri::parse(&outcome.attachments[1].data).expect("data uri");
        assert_eq!(decoded.bytes, b"aaaa".to_vec());
    }

    #[tokio::test]
    async fn completion_order_does_not_change_append_order() {
        use futures::StreamExt as _;
        use futures::stream::FuturesUnordered;

        let dir = tempfile::tempdir().unwrap();
        let large_body = vec![0xAB; 4 * 1024 * 1024];
        let large = write_files(dir.path(), &[("large.png", large_body.as_slice())]);
        let candidates = || {
            vec![
                Candidate::from_path(&large[0]),
                Candidate::from_bytes("tiny-1.png", "image/png", vec![1]),
                Candidate::from_bytes("tiny-2.png", "image/png", vec![2]),
            ]
        };

        // The file read yields to the runtime while in-memory bodies are ready at once.
        let mut settled = candidates()
            .into_iter()
            .map(decode_candidate)
            .collect::<FuturesUnordered<_>>();
        let first = settled.next().await.expect("one result").expect("decodes");
        assert_ne!(first.name, "large.png");

        let outcome = ingest_batch(IngestSource::Drop, candidates()).await;

        assert!(outcome.failures.is_empty());
        assert_eq!(
            names(&outcome.attachments),
            vec!["large.png", "tiny-1.png", "tiny-2.png"]
        );
        assert_eq!(
            DataUri::parse(&outcome.attachments[0].data).expect("data uri").bytes.len(),
            4 * 1024 * 1024
        );
        for attachment in &outcome.attachments {
            assert_eq!(attachment.key, ImageKey::of(&attachment.data));
        }
    }

    #[tokio::test]
    async fn mixed_drop_keeps_only_images_without_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_files(
            dir.path(),
            &[
                ("notes.txt", b"text"),
                ("shot.webp", b"webp"),
                ("report.pdf", b"%PDF"),
                ("photo.png", b"png"),
                ("no-extension", b"?"),
            ],
        );

        let candidates = drop_candidates(&paths);
        let outcome = ingest_batch(IngestSource::Drop, candidates).await;

        assert!(outcome.failures.is_empty());
        assert_eq!(names(&outcome.attachments), vec!["shot.webp", "photo.png"]);
    }

    #[tokio::test]
    async fn unreadable_file_does_not_disturb_its_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_files(dir.path(), &[("first.png", b"1")]);
        paths.push(dir.path().join("vanished.png"));
        paths.extend(write_files(dir.path(), &[("last.png", b"3")]));

        let outcome = ingest_batch(IngestSource::Drop, drop_candidates(&paths)).await;

        assert_eq!(names(&outcome.attachments), vec!["first.png", "last.png"]);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0],
            IngestError::ReadFile { name, .. } if name == "vanished.png"
        ));
    }

    #[test]
    fn mime_check_is_prefix_based_and_case_insensitive() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("IMAGE/JPEG"));
        assert!(!is_image_mime("text/plain"));
        assert!(!is_image_mime("img"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn paste_without_images_passes_through() {
        let plan = plan_paste(vec![PastedItem::text()], 1);

        assert_eq!(plan, PastePlan::PassThrough);
        assert!(!plan.suppresses_default());
    }

    #[test]
    fn paste_with_image_suppresses_default_and_names_by_timestamp() {
        let plan = plan_paste(
            vec![
                PastedItem::text(),
                PastedItem::image("image/png", vec![1, 2, 3]),
                PastedItem::image("image/jpeg", vec![4]),
            ],
            1_700_000_000_123,
        );

        assert!(plan.suppresses_default());
        let PastePlan::Ingest(candidates) = plan else {
            panic!("expected ingest plan");
        };
        let names = candidates
            .iter()
            .map(|candidate| candidate.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "pasted-image-1700000000123.png",
                "pasted-image-1700000000123.jpeg"
            ]
        );
    }

    #[test]
    fn image_item_without_payload_still_suppresses_default() {
        let plan = plan_paste(
            vec![PastedItem {
                mime: "image/png".to_string(),
                bytes: None,
            }],
            5,
        );

        assert_eq!(plan, PastePlan::Ingest(Vec::new()));
        assert!(plan.suppresses_default());
    }

    #[tokio::test]
    async fn pasted_bytes_decode_without_touching_disk() {
        let PastePlan::Ingest(candidates) =
            plan_paste(vec![PastedItem::image("image/png", vec![9, 8, 7])], 42)
        else {
            panic!("expected ingest plan");
        };

        let outcome = ingest_batch(IngestSource::Paste, candidates).await;

        assert_eq!(outcome.attachments.len(), 1);
        assert_eq!(outcome.attachments[0].name, "pasted-image-42.png");
        assert_eq!(
            DataUri::parse(&outcome.attachments[0].data).map(|uri| uri.bytes),
            Some(vec![9, 8, 7])
        );
    }
}
