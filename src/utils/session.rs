use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::p7m_extract::{ExtractError, ExtractionReport, Extractor};

/// Default cap on envelope size; extraction cost grows linearly with input.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;

static P7M_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.p7m$").expect("Failed to create p7m suffix regex"));

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("unsupported file type, expected a .p7m file: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("{} is {size} bytes, above the {limit} byte limit", path.display())]
    InputTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("a document is already open, reset the session first")]
    Locked,

    #[error("no document is open")]
    NoDocument,

    #[error("extraction worker failed: {0}")]
    Worker(String),
}

impl SessionError {
    /// Stable code used in tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::UnsupportedExtension(_) => "ERR_P7M_UNSUPPORTED_EXTENSION",
            SessionError::InputTooLarge { .. } => "ERR_P7M_TOO_LARGE",
            SessionError::Io { .. } => "ERR_P7M_IO",
            SessionError::Extract(ExtractError::NoPayloadFound) => "ERR_P7M_NO_PAYLOAD",
            SessionError::Locked => "ERR_P7M_LOCKED",
            SessionError::NoDocument => "ERR_P7M_NO_DOCUMENT",
            SessionError::Worker(_) => "ERR_P7M_INTERNAL",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            SessionError::UnsupportedExtension(_) => "Choose a file with the .p7m extension.",
            SessionError::InputTooLarge { .. } => {
                "Raise --max-input-bytes if this envelope is expected to be this large."
            }
            SessionError::Io { .. } => "Check that the path exists and is readable/writable.",
            SessionError::Extract(_) => {
                "The file does not contain a PDF. Make sure it is a P7M wrapping a PDF document."
            }
            SessionError::Locked => "Call p7m-reset before opening another document.",
            SessionError::NoDocument => "Open a document with p7m-open first.",
            SessionError::Worker(_) => "Retry the call; the session was left unchanged.",
        }
    }
}

/// Rejects anything whose file name does not end in `.p7m` (any case).
pub fn check_extension(path: &Path) -> Result<(), SessionError> {
    let ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| P7M_SUFFIX.is_match(n))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(SessionError::UnsupportedExtension(path.to_path_buf()))
    }
}

/// `contract.pdf.p7m` -> `contract.pdf`, `invoice.P7M` -> `invoice.pdf`.
pub fn derive_download_name(file_name: &str) -> String {
    let mut base = P7M_SUFFIX.replace(file_name, "").into_owned();
    if !base.to_ascii_lowercase().ends_with(".pdf") {
        base.push_str(".pdf");
    }
    base
}

/// Reads an envelope after checking its extension and size.
pub async fn read_envelope(path: &Path, max_bytes: u64) -> Result<Vec<u8>, SessionError> {
    check_extension(path)?;

    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
    if size > max_bytes {
        warn!(target: "session", path = %path.display(), size, limit = max_bytes, "Envelope too large; refusing");
        return Err(SessionError::InputTooLarge {
            path: path.to_path_buf(),
            size,
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(io_err)?;
    debug!(target: "session", path = %path.display(), size = bytes.len(), "Envelope read");
    Ok(bytes)
}

/// Runs CPU-bound envelope work on the blocking pool so large inputs do not
/// stall the stdio loop.
pub async fn run_blocking<T, F>(work: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|join_err| {
        warn!(target: "session", "Extraction task failed: {}", join_err);
        SessionError::Worker(join_err.to_string())
    })
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source_path: PathBuf,
    pub download_name: String,
    pub pdf: Vec<u8>,
    pub report: ExtractionReport,
}

/// The single document a client is working on. A loaded document locks the
/// session until `reset`.
#[derive(Debug)]
pub struct DocumentSession {
    extractor: Extractor<'static>,
    max_input_bytes: u64,
    current: Option<LoadedDocument>,
}

impl DocumentSession {
    pub fn new(extractor: Extractor<'static>, max_input_bytes: u64) -> Self {
        Self {
            extractor,
            max_input_bytes,
            current: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&LoadedDocument> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        if let Some(doc) = self.current.take() {
            info!(target: "session", name = %doc.download_name, "Session reset");
        }
    }

    pub async fn load(&mut self, path: &Path) -> Result<&LoadedDocument, SessionError> {
        if self.is_locked() {
            return Err(SessionError::Locked);
        }

        let envelope = read_envelope(path, self.max_input_bytes).await?;
        let extractor = self.extractor;
        let (pdf, report) =
            run_blocking(move || extractor.extract_with_report(&envelope)).await??;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.p7m");
        let download_name = derive_download_name(file_name);
        info!(
            target: "session",
            path = %path.display(),
            name = %download_name,
            size = pdf.len(),
            "Document loaded"
        );

        Ok(self.current.insert(LoadedDocument {
            source_path: path.to_path_buf(),
            download_name,
            pdf,
            report,
        }))
    }

    /// Writes the current PDF into `output_dir`, or next to the source file.
    pub async fn export(&self, output_dir: Option<&Path>) -> Result<PathBuf, SessionError> {
        let doc = self.current.as_ref().ok_or(SessionError::NoDocument)?;
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => doc
                .source_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let target = dir.join(&doc.download_name);

        tokio::fs::write(&target, &doc.pdf)
            .await
            .map_err(|source| SessionError::Io {
                path: target.clone(),
                source,
            })?;
        info!(target: "session", path = %target.display(), size = doc.pdf.len(), "PDF exported");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &[u8] = b"\x30\x80junk%PDF-1.4\n\x04\x82\x04\x00body\n%%EOF\x00\x00sig";

    async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    fn session() -> DocumentSession {
        DocumentSession::new(Extractor::default(), DEFAULT_MAX_INPUT_BYTES)
    }

    #[test]
    fn download_names() {
        assert_eq!(derive_download_name("contract.pdf.p7m"), "contract.pdf");
        assert_eq!(derive_download_name("contract.PDF.P7M"), "contract.PDF");
        assert_eq!(derive_download_name("invoice.p7m"), "invoice.pdf");
        assert_eq!(derive_download_name("a.p7m.p7m"), "a.p7m.pdf");
        assert_eq!(derive_download_name("report"), "report.pdf");
    }

    #[test]
    fn extension_check() {
        assert!(check_extension(Path::new("/tmp/doc.pdf.p7m")).is_ok());
        assert!(check_extension(Path::new("DOC.P7M")).is_ok());
        assert!(matches!(
            check_extension(Path::new("doc.pdf")),
            Err(SessionError::UnsupportedExtension(_))
        ));
        assert!(check_extension(Path::new("p7m")).is_err());
        assert!(check_extension(Path::new("/tmp/")).is_err());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            SessionError::from(ExtractError::NoPayloadFound).code(),
            "ERR_P7M_NO_PAYLOAD"
        );
        assert_eq!(SessionError::Locked.code(), "ERR_P7M_LOCKED");
        assert_eq!(SessionError::NoDocument.code(), "ERR_P7M_NO_DOCUMENT");
        assert_eq!(
            SessionError::Worker("boom".to_string()).code(),
            "ERR_P7M_INTERNAL"
        );
    }

    #[tokio::test]
    async fn blocking_work_returns_its_value() {
        let extractor = Extractor::default();
        let (pdf, _) = run_blocking(move || extractor.extract_with_report(ENVELOPE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pdf, b"%PDF-1.4\nbody\n%%EOF");
    }

    #[tokio::test]
    async fn panicking_work_becomes_worker_error() {
        let err = run_blocking(|| -> usize { panic!("stripper blew up") })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Worker(_)));
    }

    #[tokio::test]
    async fn load_export_reset_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "signed.pdf.p7m", ENVELOPE).await;

        let mut session = session();
        let doc = session.load(&path).await.unwrap();
        assert_eq!(doc.download_name, "signed.pdf");
        assert_eq!(doc.pdf, b"%PDF-1.4\nbody\n%%EOF");
        assert_eq!(doc.report.removed_per_pass, vec![1, 0]);
        assert!(session.is_locked());

        let out_dir = tempfile::tempdir().unwrap();
        let written = session.export(Some(out_dir.path())).await.unwrap();
        assert_eq!(written, out_dir.path().join("signed.pdf"));
        assert_eq!(
            tokio::fs::read(&written).await.unwrap(),
            b"%PDF-1.4\nbody\n%%EOF"
        );

        session.reset();
        assert!(!session.is_locked());
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn export_defaults_to_source_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "invoice.P7M", ENVELOPE).await;

        let mut session = session();
        session.load(&path).await.unwrap();
        let written = session.export(None).await.unwrap();
        assert_eq!(written, dir.path().join("invoice.pdf"));
    }

    #[tokio::test]
    async fn second_load_requires_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.p7m", ENVELOPE).await;

        let mut session = session();
        session.load(&path).await.unwrap();
        assert!(matches!(
            session.load(&path).await,
            Err(SessionError::Locked)
        ));
        session.reset();
        assert!(session.load(&path).await.is_ok());
    }

    #[tokio::test]
    async fn failed_load_leaves_session_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty.p7m", b"no pdf in here").await;

        let mut session = session();
        let err = session.load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Extract(ExtractError::NoPayloadFound)
        ));
        assert!(!session.is_locked());
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected_before_reading() {
        let mut session = session();
        let err = session
            .load(Path::new("/definitely/missing/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedExtension(_)));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session();
        let err = session
            .load(&dir.path().join("missing.p7m"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ERR_P7M_IO");
    }

    #[tokio::test]
    async fn oversized_envelope_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.p7m", ENVELOPE).await;

        let mut session = DocumentSession::new(Extractor::default(), 8);
        let err = session.load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InputTooLarge { limit: 8, .. }
        ));
    }

    #[tokio::test]
    async fn export_without_document() {
        let session = session();
        assert!(matches!(
            session.export(None).await,
            Err(SessionError::NoDocument)
        ));
    }
}
