use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Pdf,
    Video,
    Image,
    Document,
}

impl MaterialKind {
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("pdf") {
            MaterialKind::Pdf
        } else if mime.starts_with("video/") {
            MaterialKind::Video
        } else if mime.starts_with("image/") {
            MaterialKind::Image
        } else {
            MaterialKind::Document
        }
    }
}

const DOCUMENT_MIME_TYPES: [&str; 6] = [
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// PDFs, videos, images, plain text and office documents.
pub fn is_supported_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime == "application/pdf"
        || mime.starts_with("video/")
        || mime.starts_with("image/")
        || mime.starts_with("text/")
        || DOCUMENT_MIME_TYPES.contains(&mime.as_str())
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<title>.<subtype>` for the Content-Disposition header
pub fn download_file_name(title: &str, mime: &str) -> String {
    let subtype = mime
        .split('/')
        .nth(1)
        .and_then(|s| s.split(';').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("bin");
    let title: String = title
        .trim()
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !matches!(c, '"' | '\\'))
        .collect();

    format!("{}.{}", title, subtype)
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Relative to the storage root
    pub relative_path: String,
    pub size: i64,
}

/// Study material files on local disk, one directory per tutor.
#[derive(Debug, Clone)]
pub struct MaterialStorage {
    root: PathBuf,
}

impl MaterialStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative_path);
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }

        Ok(self.root.join(path))
    }

    /// Writes `<owner>/<material>_<name>`. An existing file is never replaced.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(
        &self,
        owner_id: Uuid,
        material_id: Uuid,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let relative_path = format!(
            "{}/{}_{}",
            owner_id,
            material_id,
            sanitize_file_name(original_name)
        );

        let path = self.resolve(&relative_path)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::debug!(path = %relative_path, "Stored material file");

        Ok(StoredFile {
            relative_path,
            size: bytes.len() as i64,
        })
    }

    pub async fn read(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative_path)?;
        Ok(tokio::fs::read(path).await?)
    }

    /// Removes a stored file; a file that is already gone is not an error
    pub async fn delete(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %relative_path, "Material file already missing");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (MaterialStorage, PathBuf) {
        let root = std::env::temp_dir().join(format!("dawnbell-{}", Uuid::new_v4()));
        (MaterialStorage::new(&root), root)
    }

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MaterialKind::from_mime("application/pdf"), MaterialKind::Pdf);
        assert_eq!(MaterialKind::from_mime("video/mp4"), MaterialKind::Video);
        assert_eq!(MaterialKind::from_mime("IMAGE/PNG"), MaterialKind::Image);
        assert_eq!(MaterialKind::from_mime("text/plain"), MaterialKind::Document);
    }

    #[test]
    fn test_supported_mime_types() {
        assert!(is_supported_mime("application/pdf"));
        assert!(is_supported_mime("video/webm"));
        assert!(is_supported_mime("text/markdown"));
        assert!(is_supported_mime(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!is_supported_mime("application/x-msdownload"));
        assert!(!is_supported_mime("application/zip"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Week 1 notes.pdf"), "Week_1_notes.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\algèbre.pdf"), "alg_bre.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name("Fractions worksheet", "application/pdf"),
            "Fractions worksheet.pdf"
        );
        assert_eq!(download_file_name("Clip \"1\"", "video/mp4"), "Clip 1.mp4");
        assert_eq!(
            download_file_name("Notes", "text/plain; charset=utf-8"),
            "Notes.plain"
        );
        assert_eq!(download_file_name("Blob", "unknown"), "Blob.bin");
        assert_eq!(download_file_name("Résumé", "application/pdf"), "Rsum.pdf");
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let (storage, root) = temp_storage();
        let (owner, material) = (Uuid::new_v4(), Uuid::new_v4());

        let stored = storage
            .save(owner, material, "lesson plan.pdf", b"%PDF-1.4")
            .await
            .unwrap();

        assert_eq!(
            stored.relative_path,
            format!("{}/{}_lesson_plan.pdf", owner, material)
        );
        assert_eq!(stored.size, 8);
        assert_eq!(storage.read(&stored.relative_path).await.unwrap(), b"%PDF-1.4");

        storage.delete(&stored.relative_path).await.unwrap();
        assert!(storage.read(&stored.relative_path).await.is_err());
        // Deleting twice is fine
        storage.delete(&stored.relative_path).await.unwrap();

        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn test_same_name_uploads_do_not_overwrite() {
        let (storage, root) = temp_storage();
        let owner = Uuid::new_v4();

        let first = storage
            .save(owner, Uuid::new_v4(), "notes.txt", b"first")
            .await
            .unwrap();
        let second = storage
            .save(owner, Uuid::new_v4(), "notes.txt", b"second")
            .await
            .unwrap();

        assert_ne!(first.relative_path, second.relative_path);
        assert_eq!(storage.read(&first.relative_path).await.unwrap(), b"first");
        assert_eq!(storage.read(&second.relative_path).await.unwrap(), b"second");

        let material = Uuid::new_v4();
        storage.save(owner, material, "notes.txt", b"kept").await.unwrap();
        let clash = storage.save(owner, material, "notes.txt", b"lost").await;
        assert!(matches!(clash, Err(StorageError::Io(_))));
        let kept = format!("{}/{}_notes.txt", owner, material);
        assert_eq!(storage.read(&kept).await.unwrap(), b"kept");

        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let (storage, _root) = temp_storage();

        assert!(matches!(
            storage.read("../secret").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
