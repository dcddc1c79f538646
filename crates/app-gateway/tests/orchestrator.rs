use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use app_config::gateway::Credential;
use app_gateway::{
    adapters::{
        music::{CatalogError, MusicCatalog, Track},
        Adapter, FetchRequest, Music,
    },
    registry::{AdapterEntry, AdapterRegistry},
    ErrorKind, GatewayError, GatewaySettings, MediaArtifact, MimeKind, Platform, PlatformDetector,
    Request, RequestOrchestrator, TerminalState,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug)]
enum Behavior {
    /// Write a file of the given size into the work dir.
    Write(&'static str, u64),
    Fail(ErrorKind, &'static str),
    /// Never finish and ignore cancellation.
    Block,
    /// Wait for cancellation and report that it was seen.
    Cooperative(Arc<AtomicBool>),
    Panic,
}

#[derive(Debug)]
struct Stub {
    behavior: Behavior,
    work_dirs: Mutex<Vec<PathBuf>>,
}

impl Stub {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            work_dirs: Mutex::new(Vec::new()),
        })
    }

    fn work_dirs(&self) -> Vec<PathBuf> {
        self.work_dirs.lock().clone()
    }
}

#[async_trait::async_trait]
impl Adapter for Stub {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn platforms(&self) -> &[Platform] {
        &[Platform::Tiktok, Platform::Instagram, Platform::Reddit]
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<MediaArtifact, GatewayError> {
        self.work_dirs.lock().push(req.work_dir.to_path_buf());

        match &self.behavior {
            Behavior::Write(name, len) => {
                let path = req.work_dir.join(name);
                std::fs::File::create(&path)
                    .and_then(|f| f.set_len(*len))
                    .map_err(GatewayError::internal)?;

                MediaArtifact::from_download(path).await
            }
            Behavior::Fail(kind, detail) => Err(GatewayError::with_detail(*kind, *detail)),
            Behavior::Block => {
                std::future::pending::<()>().await;
                Err(GatewayError::internal("unreachable"))
            }
            Behavior::Cooperative(stopped) => {
                req.cancel.cancelled().await;
                stopped.store(true, Ordering::SeqCst);
                Err(GatewayError::new(ErrorKind::Cancelled))
            }
            Behavior::Panic => panic!("adapter blew up"),
        }
    }
}

#[derive(Debug, Default)]
struct FakeCatalog {
    tracks: Vec<Track>,
    fail_search: bool,
    full_tracks: bool,
    queries: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl MusicCatalog for FakeCatalog {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Track>, CatalogError> {
        self.queries.lock().push(query.to_string());

        if self.fail_search {
            return Err(CatalogError::Api("catalog is down".to_string()));
        }

        Ok(self.tracks.clone())
    }

    async fn track(&self, id: u64) -> Result<Option<Track>, CatalogError> {
        Ok(self.tracks.iter().find(|x| x.id == id).cloned())
    }

    async fn preview(&self, _track: &Track) -> Result<Vec<u8>, CatalogError> {
        Ok(vec![0xFF; 3000])
    }

    async fn full_track(
        &self,
        track: &Track,
        _credential: &Credential,
        req: &FetchRequest<'_>,
    ) -> Result<PathBuf, GatewayError> {
        if !self.full_tracks {
            return Err(GatewayError::new(ErrorKind::AuthFailed));
        }

        let path = req.work_dir.join(track.file_name());
        std::fs::write(&path, vec![0xFF; 9000]).map_err(GatewayError::internal)?;
        Ok(path)
    }
}

fn track(id: u64, artist: &str, title: &str) -> Track {
    Track {
        id,
        title: title.to_string(),
        artist: artist.to_string(),
        preview_url: Url::parse("https://cdn.example.com/preview.mp3").ok(),
        link: None,
        duration_secs: Some(30),
    }
}

struct Harness {
    _root: tempfile::TempDir,
    orchestrator: Arc<RequestOrchestrator>,
}

impl Harness {
    fn jobs_left(&self) -> usize {
        std::fs::read_dir(self.orchestrator.store().jobs_dir())
            .map(Iterator::count)
            .unwrap_or(0)
    }

    fn outbox_len(&self) -> usize {
        std::fs::read_dir(self.orchestrator.store().outbox_dir())
            .map(Iterator::count)
            .unwrap_or(0)
    }
}

fn harness<F>(adapters: Vec<AdapterEntry>, catalog: FakeCatalog, tweak: F) -> Harness
where
    F: FnOnce(&mut GatewaySettings),
{
    let root = tempfile::tempdir().expect("temp root");

    let mut settings = GatewaySettings::new(root.path());
    settings.per_job_timeout = Duration::from_secs(5);
    settings.kill_grace = Duration::from_millis(100);
    tweak(&mut settings);

    let music: AdapterEntry = Arc::new(Music::new(
        Arc::new(catalog),
        settings.music_credential.clone(),
    ));

    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        for platform in adapter.platforms().to_vec() {
            if registry.get(platform).is_none() {
                registry
                    .bind(platform, Arc::clone(&adapter))
                    .expect("binds");
            }
        }
    }
    registry.register(Arc::clone(&music)).expect("binds music");
    registry.set_search(music).expect("music searches");

    let orchestrator = RequestOrchestrator::new(settings, PlatformDetector::default(), registry)
        .expect("registry covers detector");

    Harness {
        _root: root,
        orchestrator: Arc::new(orchestrator),
    }
}

fn entry<A: Adapter + 'static>(adapter: Arc<A>) -> AdapterEntry {
    adapter
}

fn stub_harness(stub: &Arc<Stub>) -> Harness {
    harness(vec![entry(stub.clone())], FakeCatalog::default(), |_| {})
}

#[tokio::test]
async fn tiktok_short_link_returns_video() {
    let stub = Stub::new(Behavior::Write("clip.mp4", 2_000_000));
    let h = stub_harness(&stub);

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://vm.tiktok.com/ABC123/", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::Succeeded);
    assert!(outcome.job_id.is_some());
    let artifact = outcome.result.expect("artifact");
    assert_eq!(artifact.mime_kind(), MimeKind::Video);
    assert_eq!(artifact.size_bytes(), 2_000_000);
    assert!(artifact.path().starts_with(h.orchestrator.store().outbox_dir()));
    assert_eq!(std::fs::metadata(artifact.path()).map(|x| x.len()).ok(), Some(2_000_000));

    assert_eq!(h.jobs_left(), 0);
    assert!(stub.work_dirs().iter().all(|x| !x.exists()));

    drop(artifact);
    assert_eq!(h.outbox_len(), 0);
}

#[tokio::test]
async fn unallocated_work_dir_has_no_job_id() {
    let stub = Stub::new(Behavior::Write("clip.mp4", 10));
    let h = stub_harness(&stub);
    let jobs_dir = h.orchestrator.store().jobs_dir();
    let _ = std::fs::remove_dir_all(&jobs_dir);
    std::fs::write(&jobs_dir, b"not a directory").expect("blocker file");

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://vm.tiktok.com/ABC123/", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::Failed);
    assert!(outcome.job_id.is_none());
    assert_eq!(
        outcome.result.map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::InternalError)
    );
    assert!(stub.work_dirs().is_empty());
}

#[tokio::test]
async fn persisted_artifact_outlives_the_gateway() {
    let stub = Stub::new(Behavior::Write("clip.mp4", 10));
    let h = stub_harness(&stub);
    let dest_dir = tempfile::tempdir().expect("dest");
    let dest = dest_dir.path().join("clip.mp4");

    let artifact = h
        .orchestrator
        .handle(&Request::download("https://redd.it/abc123", "alice"))
        .await
        .expect("artifact");
    artifact.persist(&dest).await.expect("persists");

    assert!(dest.exists());
    assert_eq!(h.outbox_len(), 0);
}

#[tokio::test]
async fn text_without_link_searches_music() {
    let stub = Stub::new(Behavior::Block);
    let h = stub_harness(&stub);

    let outcome = h
        .orchestrator
        .run(
            &Request::search("random text with no link", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::Failed);
    assert_eq!(
        outcome.result.map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::NoResults)
    );
    assert!(stub.work_dirs().is_empty());
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn search_returns_best_preview_without_credential() {
    let catalog = FakeCatalog::with_tracks(vec![
        track(1, "Daft Punk", "One More Time (Live)"),
        track(2, "Daft Punk", "One More Time"),
    ]);
    let h = harness(vec![entry(Stub::new(Behavior::Block))], catalog, |_| {});

    let artifact = h
        .orchestrator
        .handle(&Request::search("daft punk one more time", "alice"))
        .await
        .expect("artifact");

    assert!(artifact.preview());
    assert_eq!(artifact.mime_kind(), MimeKind::Audio);
    assert_eq!(artifact.title(), Some("Daft Punk - One More Time"));
    assert_eq!(artifact.size_bytes(), 3000);
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn failed_full_track_falls_back_to_preview() {
    let catalog = FakeCatalog::with_tracks(vec![track(1, "Queen", "Bohemian Rhapsody")]);
    let h = harness(vec![entry(Stub::new(Behavior::Block))], catalog, |s| {
        s.music_credential = Some(Credential::new("expired"));
    });

    let artifact = h
        .orchestrator
        .handle(&Request::search("bohemian rhapsody", "alice"))
        .await
        .expect("artifact");

    assert!(artifact.preview());
}

#[tokio::test]
async fn credential_fetches_full_track() {
    let catalog = FakeCatalog {
        full_tracks: true,
        ..FakeCatalog::with_tracks(vec![track(1, "Queen", "Bohemian Rhapsody")])
    };
    let h = harness(vec![entry(Stub::new(Behavior::Block))], catalog, |s| {
        s.music_credential = Some(Credential::new("valid"));
    });

    let artifact = h
        .orchestrator
        .handle(&Request::search("bohemian rhapsody", "alice"))
        .await
        .expect("artifact");

    assert!(!artifact.preview());
    assert_eq!(artifact.size_bytes(), 9000);
}

#[tokio::test]
async fn deezer_track_link_is_looked_up() {
    let catalog = FakeCatalog::with_tracks(vec![track(3_135_556, "Daft Punk", "Around the World")]);
    let h = harness(vec![entry(Stub::new(Behavior::Block))], catalog, |_| {});

    let artifact = h
        .orchestrator
        .handle(&Request::download("https://www.deezer.com/fr/track/3135556", "alice"))
        .await
        .expect("artifact");

    assert_eq!(artifact.title(), Some("Daft Punk - Around the World"));

    let err = h
        .orchestrator
        .handle(&Request::download("https://www.deezer.com/album/302127", "alice"))
        .await
        .expect_err("albums are not supported");
    assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn failed_search_is_retried_once_with_relaxed_query() {
    let catalog = Arc::new(FakeCatalog {
        fail_search: true,
        ..FakeCatalog::default()
    });
    let music: AdapterEntry = Arc::new(Music::new(catalog.clone(), None));
    let stub = entry(Stub::new(Behavior::Block));

    let mut registry = AdapterRegistry::new();
    registry.register(stub).expect("binds");
    registry.register(Arc::clone(&music)).expect("binds");
    registry.set_search(music).expect("music searches");

    let root = tempfile::tempdir().expect("root");
    let orchestrator = RequestOrchestrator::new(
        GatewaySettings::new(root.path()),
        PlatformDetector::default(),
        registry,
    )
    .expect("valid");

    let err = orchestrator
        .handle(&Request::search("AC/DC: Back in   Black!", "alice"))
        .await
        .expect_err("search fails");

    assert_eq!(err.kind(), ErrorKind::SearchFailed);
    assert_eq!(
        *catalog.queries.lock(),
        vec![
            "AC/DC: Back in   Black!".to_string(),
            "ACDC Back in Black".to_string()
        ]
    );
}

#[tokio::test]
async fn adapter_failures_are_not_retried() {
    let stub = Stub::new(Behavior::Fail(ErrorKind::DownloadFailed, "gone"));
    let h = stub_harness(&stub);

    let err = h
        .orchestrator
        .handle(&Request::download("https://redd.it/abc123", "alice"))
        .await
        .expect_err("fails");

    assert_eq!(err.kind(), ErrorKind::DownloadFailed);
    assert_eq!(stub.work_dirs().len(), 1);
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn oversized_file_is_rejected_and_cleaned_up() {
    let stub = Stub::new(Behavior::Write("huge.mp4", 60_000_000));
    let h = harness(vec![entry(stub.clone())], FakeCatalog::default(), |s| {
        s.max_file_size_bytes = 50_000_000;
    });

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://www.instagram.com/p/abc/", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::Failed);
    let err = outcome.result.expect_err("too large");
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);
    assert!(err.detail().is_some_and(|x| x.contains("60000000")));

    assert_eq!(stub.work_dirs().len(), 1);
    assert!(stub.work_dirs().iter().all(|x| !x.exists()));
    assert_eq!(h.jobs_left(), 0);
    assert_eq!(h.outbox_len(), 0);
}

#[tokio::test]
async fn eleventh_request_in_window_is_rate_limited() {
    let stub = Stub::new(Behavior::Fail(ErrorKind::DownloadFailed, "nope"));
    let h = harness(vec![entry(stub.clone())], FakeCatalog::default(), |s| {
        s.rate_limit_max_requests = 10;
        s.rate_limit_window = Duration::from_secs(60);
    });

    let mut kinds = Vec::new();
    for _ in 0..11 {
        let outcome = h
            .orchestrator
            .run(
                &Request::download("https://redd.it/abc123", "alice"),
                CancellationToken::new(),
            )
            .await;
        kinds.push((outcome.job_id.is_some(), outcome.result.map(|_| ()).map_err(|e| e.kind())));
    }

    let limited = kinds
        .iter()
        .filter(|(_, x)| *x == Err(ErrorKind::RateLimited))
        .count();
    assert_eq!(limited, 1);
    assert_eq!(kinds.last(), Some(&(false, Err(ErrorKind::RateLimited))));
    assert_eq!(stub.work_dirs().len(), 10);

    let other = h
        .orchestrator
        .handle(&Request::download("https://redd.it/abc123", "bob"))
        .await;
    assert_eq!(other.map(|_| ()).map_err(|e| e.kind()), Err(ErrorKind::DownloadFailed));
}

#[tokio::test]
async fn classification_failures_allocate_nothing() {
    let stub = Stub::new(Behavior::Write("clip.mp4", 1));
    let h = stub_harness(&stub);

    let cases = [
        (Request::download("https://example.com/video.mp4", "a"), ErrorKind::UnsupportedPlatform),
        (Request::download("no link at all", "a"), ErrorKind::InvalidUrl),
        (Request::search("   ", "a"), ErrorKind::InvalidUrl),
        (Request::search("look: https://", "a"), ErrorKind::InvalidUrl),
    ];

    for (request, kind) in cases {
        let outcome = h.orchestrator.run(&request, CancellationToken::new()).await;

        assert_eq!(outcome.job_id, None, "{request:?}");
        assert_eq!(outcome.state, TerminalState::Failed, "{request:?}");
        assert_eq!(
            outcome.result.map(|_| ()).map_err(|e| e.kind()),
            Err(kind),
            "{request:?}"
        );
    }

    assert!(stub.work_dirs().is_empty());
}

#[tokio::test]
async fn blocking_adapter_times_out() {
    let stub = Stub::new(Behavior::Block);
    let h = harness(vec![entry(stub.clone())], FakeCatalog::default(), |s| {
        s.per_job_timeout = Duration::from_millis(300);
        s.kill_grace = Duration::from_millis(50);
    });
    let started = Instant::now();

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://vm.tiktok.com/ABC123/", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::TimedOut);
    assert_eq!(
        outcome.result.map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::Timeout)
    );
    assert!(started.elapsed() < Duration::from_millis(300) + Duration::from_secs(2));
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn timed_out_adapter_is_told_to_stop() {
    let stopped = Arc::new(AtomicBool::new(false));
    let stub = Stub::new(Behavior::Cooperative(stopped.clone()));
    let h = harness(vec![entry(stub)], FakeCatalog::default(), |s| {
        s.per_job_timeout = Duration::from_millis(100);
        s.kill_grace = Duration::from_secs(2);
    });

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://redd.it/abc123", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::TimedOut);
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn caller_can_cancel_running_job() {
    let stub = Stub::new(Behavior::Block);
    let h = stub_harness(&stub);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = h
        .orchestrator
        .run(&Request::download("https://redd.it/abc123", "alice"), cancel)
        .await;

    assert_eq!(outcome.state, TerminalState::Cancelled);
    assert!(outcome.job_id.is_some());
    assert_eq!(stub.work_dirs().len(), 1);
    assert!(stub.work_dirs().iter().all(|x| !x.exists()));
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn already_cancelled_request_never_starts() {
    let stub = Stub::new(Behavior::Write("clip.mp4", 1));
    let h = stub_harness(&stub);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .orchestrator
        .run(&Request::download("https://redd.it/abc123", "alice"), cancel)
        .await;

    assert_eq!(outcome.state, TerminalState::Cancelled);
    assert_eq!(outcome.job_id, None);
    assert!(stub.work_dirs().is_empty());
}

#[tokio::test]
async fn adapter_panic_becomes_opaque_internal_error() {
    let stub = Stub::new(Behavior::Panic);
    let h = stub_harness(&stub);

    let outcome = h
        .orchestrator
        .run(
            &Request::download("https://redd.it/abc123", "alice"),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.state, TerminalState::Failed);
    let err = outcome.result.expect_err("panics");
    assert_eq!(err.kind(), ErrorKind::InternalError);
    assert!(!err.user_message().contains("blew up"));
    assert!(stub.work_dirs().iter().all(|x| !x.exists()));
    assert_eq!(h.jobs_left(), 0);
}

#[tokio::test]
async fn saturated_gate_rejects_without_work_dir() {
    let stub = Stub::new(Behavior::Block);
    let h = harness(vec![entry(stub.clone())], FakeCatalog::default(), |s| {
        s.max_concurrent_jobs = 1;
        s.per_job_timeout = Duration::from_millis(500);
        s.kill_grace = Duration::from_millis(10);
    });

    let orchestrator = Arc::clone(&h.orchestrator);
    let first = tokio::spawn(async move {
        orchestrator
            .run(
                &Request::download("https://redd.it/first", "alice"),
                CancellationToken::new(),
            )
            .await
    });

    while stub.work_dirs().is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let second = h
        .orchestrator
        .run(
            &Request::download("https://redd.it/second", "bob"),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(second.job_id, None);
    assert_eq!(
        second.result.map(|_| ()).map_err(|e| e.kind()),
        Err(ErrorKind::RateLimited)
    );

    let first = first.await.expect("first job runs");
    assert_eq!(first.state, TerminalState::TimedOut);
    assert_eq!(stub.work_dirs().len(), 1);
    assert_eq!(h.jobs_left(), 0);
}

#[test]
fn detector_is_total_and_deterministic() {
    let detector = PlatformDetector::default();
    let pieces = [
        "", " ", "https://", "http://", "vm.tiktok.com/", "instagram.com/p/x", "redd.it/",
        "deezer.com/track/1", "?", ")", "\u{202e}", "🎵", "\n", "www.", "r/rust/s/x",
    ];

    for a in pieces {
        for b in pieces {
            for c in pieces {
                let text = format!("{a}{b}{c}");
                let first = detector.classify(&text);
                assert_eq!(first, detector.classify(&text), "{text:?}");
                if first.platform == Platform::Unsupported {
                    assert!(!first.confidence, "{text:?}");
                } else {
                    assert!(first.normalized_url.is_some(), "{text:?}");
                }
            }
        }
    }
}

#[cfg(unix)]
mod tools {
    use std::os::unix::fs::PermissionsExt;

    use app_gateway::adapters::{GalleryDl, YtDlp};

    use super::*;

    fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).expect("writes tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod tool");
        path
    }

    #[tokio::test]
    async fn private_instagram_post_is_auth_failure() {
        let bin = tempfile::tempdir().expect("bin dir");
        let tool = fake_tool(bin.path(), "gallery-dl", "echo 'ERROR: Private post' >&2\nexit 1");
        let h = harness(
            vec![entry(Arc::new(GalleryDl::new(Some(tool)))), entry(Stub::new(Behavior::Block))],
            FakeCatalog::default(),
            |_| {},
        );

        let outcome = h
            .orchestrator
            .run(
                &Request::download("https://www.instagram.com/p/Cx1abc/", "alice"),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.state, TerminalState::Failed);
        let err = outcome.result.expect_err("private");
        assert_eq!(err.kind(), ErrorKind::AuthFailed);
        assert_eq!(err.detail(), Some("Private post"));
        assert_eq!(h.jobs_left(), 0);
    }

    #[tokio::test]
    async fn yt_dlp_download_is_picked_up() {
        let bin = tempfile::tempdir().expect("bin dir");
        // Pulls the work dir out of the `--output` template and writes a file there.
        let tool = fake_tool(
            bin.path(),
            "yt-dlp",
            r#"while [ "$1" != "--output" ]; do shift; done
dir=$(dirname "$2")
printf 'video' > "$dir/job.abc123.mp4"
printf '{"title":"A clip"}' > "$dir/job.abc123.info.json"
echo "$dir/job.abc123.mp4""#,
        );
        let h = harness(
            vec![entry(Arc::new(YtDlp::new(Some(tool)))), entry(Stub::new(Behavior::Block))],
            FakeCatalog::default(),
            |_| {},
        );

        let artifact = h
            .orchestrator
            .handle(&Request::download("https://vm.tiktok.com/ABC123/", "alice"))
            .await
            .expect("artifact");

        assert_eq!(artifact.title(), Some("A clip"));
        assert_eq!(artifact.size_bytes(), 5);
        assert_eq!(artifact.mime_kind(), MimeKind::Video);
        assert_eq!(h.jobs_left(), 0);
    }

    #[tokio::test]
    async fn zero_exit_without_file_is_download_failure() {
        let bin = tempfile::tempdir().expect("bin dir");
        let tool = fake_tool(bin.path(), "yt-dlp", "exit 0");
        let h = harness(
            vec![entry(Arc::new(YtDlp::new(Some(tool)))), entry(Stub::new(Behavior::Block))],
            FakeCatalog::default(),
            |_| {},
        );

        let err = h
            .orchestrator
            .handle(&Request::download("https://redd.it/abc123", "alice"))
            .await
            .expect_err("no file");

        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(err.detail(), Some("no artifact produced"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn hanging_tool_is_killed_on_timeout() {
        let bin = tempfile::tempdir().expect("bin dir");
        let pid_file = bin.path().join("pid");
        let tool = fake_tool(
            bin.path(),
            "yt-dlp",
            &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
        );
        let h = harness(
            vec![entry(Arc::new(YtDlp::new(Some(tool)))), entry(Stub::new(Behavior::Block))],
            FakeCatalog::default(),
            |s| {
                s.per_job_timeout = Duration::from_millis(500);
                s.kill_grace = Duration::from_secs(2);
            },
        );
        let started = Instant::now();

        let outcome = h
            .orchestrator
            .run(
                &Request::download("https://redd.it/abc123", "alice"),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.state, TerminalState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));

        let pid = std::fs::read_to_string(&pid_file).expect("tool wrote pid");
        assert!(!Path::new(&format!("/proc/{}", pid.trim())).exists());
        assert_eq!(h.jobs_left(), 0);
    }
}
