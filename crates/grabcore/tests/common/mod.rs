//! Common test utilities
//!
//! In-memory fakes of every collaborator the orchestrator talks to. Media
//! files are created sparse (`set_len`) so oversized fixtures cost nothing.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grabcore::conversion::{ConversionError, ConversionResult, Transcoder};
use grabcore::core::retry::RetryConfig;
use grabcore::delivery::{DeliveryError, MessageRef, Messenger};
use grabcore::download::source::{
    shared_provider, InstagramProvider, PrimaryError, PrimaryPost, ToolFailure, UrlDownloadReport, UrlDownloadRequest,
    UrlDownloader,
};
use grabcore::download::{InstagramStrategy, YouTubeStrategy};
use grabcore::storage::{JobBook, MemoryStore};
use grabcore::{Orchestrator, Settings};

pub const MB: u64 = 1024 * 1024;

pub fn write_sparse(path: &Path, size: u64) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size).unwrap();
}

/// Settings for tests: no delays, fast retries.
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default().with_temp_root(root);
    settings.item_delay = Duration::ZERO;
    settings.retry = RetryConfig::new()
        .max_retries(2)
        .initial_delay(Duration::from_millis(1))
        .linear()
        .no_jitter();
    settings
}

/// Job directories left under `root`.
pub fn job_dirs(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.starts_with("ig_") || name.starts_with("yt_")
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Edit(i32, String),
    Photo { name: String, size: u64, caption: Option<String> },
    Video { name: String, size: u64, caption: Option<String> },
    Audio { name: String, size: u64, caption: Option<String> },
    Document { name: String, size: u64, caption: Option<String> },
}

impl Sent {
    pub fn media_size(&self) -> Option<u64> {
        match self {
            Sent::Photo { size, .. } | Sent::Video { size, .. } | Sent::Audio { size, .. } | Sent::Document { size, .. } => {
                Some(*size)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Sent::Photo { name, .. } | Sent::Video { name, .. } | Sent::Audio { name, .. } | Sent::Document { name, .. } => {
                name
            }
            Sent::Text(_) | Sent::Edit(..) => "",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text(t) | Sent::Edit(_, t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    log: Mutex<Vec<Sent>>,
    next_id: AtomicUsize,
    media_sends: AtomicUsize,
    /// 1-based indices of media sends that fail
    fail_media_sends: Vec<usize>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_media_sends(indices: &[usize]) -> Self {
        Self {
            fail_media_sends: indices.to_vec(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn media(&self) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.media_size().is_some()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().iter().filter_map(|s| s.text().map(str::to_string)).collect()
    }

    pub fn all_text(&self) -> String {
        self.texts().join("\n")
    }

    fn record_media(
        &self,
        path: &Path,
        caption: Option<&str>,
        make: fn(String, u64, Option<String>) -> Sent,
    ) -> Result<(), DeliveryError> {
        let n = self.media_sends.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_media_sends.contains(&n) {
            return Err(DeliveryError::new("Bad Request: file upload failed"));
        }
        let size = std::fs::metadata(path)
            .map_err(|e| DeliveryError::new(e.to_string()))?
            .len();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.log
            .lock()
            .unwrap()
            .push(make(name, size, caption.map(str::to_string)));
        Ok(())
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_text(&self, text: &str) -> Result<MessageRef, DeliveryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1;
        self.log.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(MessageRef {
            chat_id: 1,
            message_id: id,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError> {
        self.log
            .lock()
            .unwrap()
            .push(Sent::Edit(message.message_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.record_media(path, caption, |name, size, caption| Sent::Photo { name, size, caption })
    }

    async fn send_video(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.record_media(path, caption, |name, size, caption| Sent::Video { name, size, caption })
    }

    async fn send_audio(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.record_media(path, caption, |name, size, caption| Sent::Audio { name, size, caption })
    }

    async fn send_document(&self, path: &Path, caption: Option<&str>) -> Result<(), DeliveryError> {
        self.record_media(path, caption, |name, size, caption| Sent::Document { name, size, caption })
    }
}

// ---------------------------------------------------------------------------
// Instagram primary
// ---------------------------------------------------------------------------

/// Files written into the target directory: `(name, size)`.
pub type FakeFiles = Vec<(&'static str, u64)>;

#[derive(Clone)]
pub struct FakeProvider {
    result: Result<(FakeFiles, PrimaryPost), PrimaryError>,
    pub calls: Arc<AtomicUsize>,
    pub invalidations: Arc<AtomicUsize>,
    panics: bool,
}

impl FakeProvider {
    pub fn ok(files: FakeFiles, caption: &str, owner: &str) -> Self {
        Self::with_result(Ok((
            files,
            PrimaryPost {
                caption: Some(caption.to_string()),
                owner: Some(owner.to_string()),
            },
        )))
    }

    pub fn failing(err: PrimaryError) -> Self {
        Self::with_result(Err(err))
    }

    /// A provider whose fetch panics mid-job.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::failing(PrimaryError::NotFound("unused".into()))
        }
    }

    fn with_result(result: Result<(FakeFiles, PrimaryPost), PrimaryError>) -> Self {
        Self {
            result,
            calls: Arc::new(AtomicUsize::new(0)),
            invalidations: Arc::new(AtomicUsize::new(0)),
            panics: false,
        }
    }
}

#[async_trait]
impl InstagramProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake-primary"
    }

    async fn fetch_post(&mut self, _shortcode: &str, target_dir: &Path) -> Result<PrimaryPost, PrimaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("instaloader output could not be parsed");
        }
        let (files, post) = self.result.clone()?;
        for (name, size) in files {
            write_sparse(&target_dir.join(name), size);
        }
        Ok(post)
    }

    async fn invalidate_session(&mut self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// URL downloader
// ---------------------------------------------------------------------------

/// One scripted downloader run.
#[derive(Clone)]
pub enum Script {
    Files(FakeFiles, Option<&'static str>),
    Fail(ToolFailure),
}

pub struct FakeDownloader {
    available: bool,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<UrlDownloadRequest>>,
}

impl FakeDownloader {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            available: true,
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(vec![])
        }
    }

    pub fn requests(&self) -> Vec<UrlDownloadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UrlDownloader for FakeDownloader {
    fn name(&self) -> &'static str {
        "fake-ytdlp"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn download(&self, request: &UrlDownloadRequest) -> Result<UrlDownloadReport, ToolFailure> {
        assert!(request.output_dir.is_dir(), "output dir must exist before download");
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Files(files, title)) => {
                for (name, size) in files {
                    write_sparse(&request.output_dir.join(name), size);
                }
                Ok(UrlDownloadReport {
                    title: title.map(str::to_string),
                    uploader: Some("uploader".to_string()),
                })
            }
            Some(Script::Fail(failure)) => Err(failure),
            None => Err(ToolFailure::Unavailable("no script left".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTranscoder {
    /// Size of the written output; `None` fails the transcode
    pub output_size: Option<u64>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn compress(&self, _input: &Path, output: &Path, _target_mb: u64) -> ConversionResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.output_size {
            Some(size) => {
                write_sparse(output, size);
                Ok(())
            }
            None => Err(ConversionError::FfmpegError("fake failure".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryStore>,
    pub ig_fallback: Arc<FakeDownloader>,
    pub yt: Arc<FakeDownloader>,
    pub transcoder: Arc<FakeTranscoder>,
    pub root: tempfile::TempDir,
}

pub fn harness(provider: FakeProvider, ig_fallback: FakeDownloader, yt: FakeDownloader) -> Harness {
    harness_with(provider, ig_fallback, yt, FakeTranscoder::default(), |_| {})
}

/// Like [`harness`], with a custom transcoder and orchestrator settings.
/// The strategies keep the default test settings, so `tune` can make the
/// delivery side stricter than extraction.
pub fn harness_with(
    provider: FakeProvider,
    ig_fallback: FakeDownloader,
    yt: FakeDownloader,
    transcoder: FakeTranscoder,
    tune: impl FnOnce(&mut Settings),
) -> Harness {
    let root = tempfile::TempDir::new().unwrap();
    let settings = test_settings(root.path());
    let store = Arc::new(MemoryStore::new());
    let ig_fallback = Arc::new(ig_fallback);
    let yt = Arc::new(yt);
    let transcoder = Arc::new(transcoder);

    let instagram = InstagramStrategy::new(shared_provider(provider), ig_fallback.clone(), &settings);
    let youtube = YouTubeStrategy::new(yt.clone(), &settings);

    let mut delivery_settings = settings;
    tune(&mut delivery_settings);
    let orchestrator = Orchestrator::new(
        instagram,
        youtube,
        transcoder.clone(),
        JobBook::new(store.clone()),
        delivery_settings,
    );

    Harness {
        orchestrator,
        store,
        ig_fallback,
        yt,
        transcoder,
        root,
    }
}

pub fn idle_provider() -> FakeProvider {
    FakeProvider::failing(PrimaryError::NotFound("unused".into()))
}
