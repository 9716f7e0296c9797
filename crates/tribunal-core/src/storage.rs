//! Evidence object storage and upload-time structural checks.

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tribunal_schema::EvidenceKind;

use crate::evidence::{STRUCTURE_INVALID, STRUCTURE_VERIFIED};

/// Result of persisting an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Stable locator used for retrieval and for oracle media references.
    pub locator: String,
    pub sha256: String,
    pub size: u64,
}

/// Byte sink for uploaded evidence: a byte stream plus destination path in,
/// a stable locator out.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, destination: &str, bytes: Vec<u8>) -> Result<StoredObject>;
}

/// Filesystem store rooted at a configured directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, destination: &str, bytes: Vec<u8>) -> Result<StoredObject> {
        let relative = sanitize_destination(destination)?;
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create storage dir: {}", parent.display()))?;
        }

        let sha256 = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write evidence object: {}", path.display()))?;

        Ok(StoredObject {
            locator: format!("file://{}", path.display()),
            sha256,
            size,
        })
    }
}

/// Destinations are confined below the storage root: relative paths with
/// plain components only.
fn sanitize_destination(destination: &str) -> Result<PathBuf> {
    let path = Path::new(destination);
    if destination.is_empty()
        || path.is_absolute()
        || !path.components().all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(anyhow!("invalid destination path: {destination}"));
    }
    Ok(path.to_path_buf())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Maps an uploaded file name to an accepted evidence kind, if any.
pub fn kind_for_filename(filename: &str) -> Option<EvidenceKind> {
    let mime = mime_guess::from_path(filename).first_raw()?;
    EvidenceKind::from_mime(mime)
}

/// Upload-time structural verification. Pdf documents must parse; video
/// content is only examined later by the media analyzer, so it carries no
/// upload-time verdict.
pub fn verify_structure(kind: EvidenceKind, bytes: &[u8]) -> Option<&'static str> {
    match kind {
        EvidenceKind::Pdf => {
            if lopdf::Document::load_mem(bytes).is_ok() {
                Some(STRUCTURE_VERIFIED)
            } else {
                Some(STRUCTURE_INVALID)
            }
        }
        EvidenceKind::Video => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    fn minimal_pdf_bytes() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn put_writes_bytes_and_digests_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let stored = store
            .put("uploads/videos/clip.mp4", b"hello world".to_vec())
            .await
            .unwrap();

        assert!(stored.locator.ends_with("uploads/videos/clip.mp4"));
        assert!(stored.locator.starts_with("file://"));
        assert_eq!(
            stored.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(stored.size, 11);

        let on_disk = tokio::fs::read(dir.path().join("uploads/videos/clip.mp4"))
            .await
            .unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[tokio::test]
    async fn put_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let err = store.put("../escape.bin", vec![1, 2, 3]).await.unwrap_err();
        assert!(err.to_string().contains("invalid destination path"));

        let err = store.put("/etc/passwd", vec![1]).await.unwrap_err();
        assert!(err.to_string().contains("invalid destination path"));
    }

    #[test]
    fn kind_for_filename_recognizes_supported_media() {
        assert_eq!(kind_for_filename("clip.mp4"), Some(EvidenceKind::Video));
        assert_eq!(kind_for_filename("proof.mov"), Some(EvidenceKind::Video));
        assert_eq!(kind_for_filename("receipt.pdf"), Some(EvidenceKind::Pdf));
        assert_eq!(kind_for_filename("notes.txt"), None);
        assert_eq!(kind_for_filename("archive"), None);
    }

    #[test]
    fn well_formed_pdf_passes_structure_check() {
        let bytes = minimal_pdf_bytes();
        assert_eq!(
            verify_structure(EvidenceKind::Pdf, &bytes),
            Some(STRUCTURE_VERIFIED)
        );
    }

    #[test]
    fn corrupt_pdf_fails_structure_check() {
        assert_eq!(
            verify_structure(EvidenceKind::Pdf, b"not a pdf at all"),
            Some(STRUCTURE_INVALID)
        );
        assert_eq!(
            verify_structure(EvidenceKind::Pdf, &[]),
            Some(STRUCTURE_INVALID)
        );
    }

    #[test]
    fn video_carries_no_upload_time_verdict() {
        assert_eq!(verify_structure(EvidenceKind::Video, b"\x00\x00\x00 ftypmp42"), None);
    }
}
