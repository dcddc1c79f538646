use std::{any::Any, io, panic::AssertUnwindSafe, path::Path, sync::Arc};

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    adapters::{
        music::{select::relax_query, CatalogError, DeezerCatalog},
        Adapter, FetchConstraints, FetchRequest, GalleryDl, Music, Source, YtDlp,
    },
    admission::{AdmissionGate, RateLimiter},
    artifact::MediaArtifact,
    error::{ErrorKind, GatewayError},
    guard::SizeGuard,
    platform::{link_candidate, Platform, PlatformDetector},
    registry::{AdapterEntry, AdapterRegistry, RegistryError},
    request::{DownloadJob, JobId, JobStatus, Request, RequestKind},
    settings::GatewaySettings,
    temp_store::{TempStore, WorkDir},
    GatewayResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TerminalState {
    fn of(result: &GatewayResult) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(e) => match e.kind() {
                ErrorKind::Timeout => Self::TimedOut,
                ErrorKind::Cancelled => Self::Cancelled,
                _ => Self::Failed,
            },
        }
    }
}

/// How a request ended. `job_id` is only set if a work dir was allocated.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: Option<JobId>,
    pub state: TerminalState,
    pub result: GatewayResult,
}

impl JobOutcome {
    fn rejected(err: GatewayError) -> Self {
        let result = Err(err);

        Self {
            job_id: None,
            state: TerminalState::of(&result),
            result,
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to set up music catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("failed to prepare scratch space: {0}")]
    Scratch(#[from] io::Error),
}

struct Route {
    platform: Platform,
    adapter: AdapterEntry,
    source: Source,
}

enum Fetched {
    Done(GatewayResult),
    TimedOut,
    Cancelled,
}

/// Takes a request from receipt to a terminal state.
#[derive(Debug)]
pub struct RequestOrchestrator {
    settings: GatewaySettings,
    detector: PlatformDetector,
    registry: AdapterRegistry,
    store: TempStore,
    gate: AdmissionGate,
    limiter: RateLimiter,
}

impl RequestOrchestrator {
    /// Fails if `registry` does not cover exactly what `detector` recognizes.
    pub fn new(
        settings: GatewaySettings,
        detector: PlatformDetector,
        registry: AdapterRegistry,
    ) -> Result<Self, RegistryError> {
        registry.validate_against(&detector)?;

        Ok(Self {
            store: TempStore::new(&settings.temp_root),
            gate: AdmissionGate::new(settings.max_concurrent_jobs),
            limiter: RateLimiter::new(settings.rate_limit_window, settings.rate_limit_max_requests),
            settings,
            detector,
            registry,
        })
    }

    /// The standard adapter set: `yt-dlp`, `gallery-dl` and Deezer music.
    pub fn from_settings(settings: GatewaySettings) -> Result<Self, SetupError> {
        let detector = PlatformDetector::with_order(&settings.recognizer_order);

        let catalog = DeezerCatalog::new(
            settings.deezer_api_base_url.as_str(),
            settings.deemix_path.clone(),
        )?;
        let music: AdapterEntry = Arc::new(Music::new(
            Arc::new(catalog),
            settings.music_credential.clone(),
        ));

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(YtDlp::new(settings.yt_dlp_path.clone())))?;
        registry.register(Arc::new(GalleryDl::new(settings.gallery_dl_path.clone())))?;
        registry.register(Arc::clone(&music))?;
        registry.set_search(music)?;

        for platform in registry.platforms() {
            if let Some(adapter) = registry.get(platform).filter(|x| !x.can_run()) {
                warn!(%platform, adapter = adapter.name(), "Adapter is missing its tool, requests will fail");
            }
        }

        std::fs::create_dir_all(&settings.temp_root)?;

        Ok(Self::new(settings, detector, registry)?)
    }

    #[must_use]
    pub const fn store(&self) -> &TempStore {
        &self.store
    }

    pub async fn handle(&self, request: &Request) -> GatewayResult {
        self.run(request, CancellationToken::new()).await.result
    }

    /// Process `request`. Cancelling `cancel` stops the job as soon as possible.
    #[tracing::instrument(skip_all, fields(requester = request.requester(), kind = ?request.kind()))]
    pub async fn run(&self, request: &Request, cancel: CancellationToken) -> JobOutcome {
        debug!(text = request.raw_text(), "Received request");

        if cancel.is_cancelled() {
            return JobOutcome::rejected(GatewayError::new(ErrorKind::Cancelled));
        }

        if !self.limiter.try_acquire(request.requester()) {
            info!("Requester is over the rate limit");
            return JobOutcome::rejected(GatewayError::new(ErrorKind::RateLimited));
        }

        let route = match self.route(request) {
            Ok(x) => x,
            Err(e) => {
                info!(err = %e, "Request rejected");
                return JobOutcome::rejected(e);
            }
        };

        let Some(permit) = self.gate.try_admit() else {
            info!("All job slots are taken");
            return JobOutcome::rejected(GatewayError::new(ErrorKind::RateLimited));
        };

        let job_id = JobId::generate();
        let work_dir = match self.store.acquire(&job_id) {
            Ok(x) => x,
            Err(e) => {
                error!(?e, job = %job_id, "Failed to allocate work dir");
                return JobOutcome {
                    job_id: None,
                    state: TerminalState::Failed,
                    result: Err(GatewayError::internal(e)),
                };
            }
        };

        let mut job = DownloadJob::new(
            job_id.clone(),
            route.platform,
            route.source.to_string(),
            work_dir.path().to_path_buf(),
        );

        let result = self.dispatch(&mut job, route, &work_dir, &cancel).await;
        let state = TerminalState::of(&result);

        if let Err(e) = work_dir.release().await {
            error!(?e, job = %job_id, "Failed to remove work dir");
        }
        drop(permit);

        match &result {
            Ok(artifact) => info!(
                job = %job_id,
                ?state,
                size = artifact.size_bytes(),
                kind = ?artifact.mime_kind(),
                preview = artifact.preview(),
                "Job finished"
            ),
            Err(e) if e.kind() == ErrorKind::InternalError => {
                error!(job = %job_id, ?state, err = %e, "Job failed");
            }
            Err(e) => info!(job = %job_id, ?state, err = %e, "Job finished"),
        }

        JobOutcome {
            job_id: Some(job_id),
            state,
            result,
        }
    }

    fn route(&self, request: &Request) -> Result<Route, GatewayError> {
        let text = request.raw_text().trim();
        if text.is_empty() {
            return Err(GatewayError::with_detail(ErrorKind::InvalidUrl, "empty request"));
        }

        let matched = self.detector.classify(text);
        debug!(?matched, "Classified request");

        match (matched.platform, matched.normalized_url) {
            (Platform::Unsupported, Some(url)) => Err(GatewayError::with_detail(
                ErrorKind::UnsupportedPlatform,
                url.host_str().unwrap_or_default(),
            )),

            (Platform::Unsupported, None) if link_candidate(text).is_some() => Err(
                GatewayError::with_detail(ErrorKind::InvalidUrl, "the link could not be parsed"),
            ),

            (Platform::Unsupported, None) => match request.kind() {
                RequestKind::Download => Err(GatewayError::with_detail(
                    ErrorKind::InvalidUrl,
                    "no link found",
                )),
                RequestKind::Search => {
                    let adapter = self.registry.search().cloned().ok_or_else(|| {
                        GatewayError::with_detail(
                            ErrorKind::UnsupportedPlatform,
                            "search is not available",
                        )
                    })?;

                    Ok(Route {
                        platform: adapter
                            .platforms()
                            .first()
                            .copied()
                            .unwrap_or(Platform::Unsupported),
                        adapter,
                        source: Source::Query(text.to_string()),
                    })
                }
            },

            (platform, Some(url)) => {
                let adapter = self.registry.get(platform).cloned().ok_or_else(|| {
                    GatewayError::with_detail(ErrorKind::UnsupportedPlatform, platform.name())
                })?;

                Ok(Route {
                    platform,
                    adapter,
                    source: Source::Url(url),
                })
            }

            (platform, None) => Err(GatewayError::internal(format!(
                "{} matched without a url",
                platform
            ))),
        }
    }

    async fn dispatch(
        &self,
        job: &mut DownloadJob,
        route: Route,
        work_dir: &WorkDir,
        cancel: &CancellationToken,
    ) -> GatewayResult {
        job.status = JobStatus::Running;
        info!(
            job = %job.id,
            platform = %job.platform,
            adapter = route.adapter.name(),
            source = %job.source,
            "Dispatched job"
        );

        let constraints = self.settings.constraints();
        let deadline = Instant::now() + constraints.timeout;

        let mut fetched = self
            .fetch(
                &route.adapter,
                route.source.clone(),
                work_dir.path(),
                &constraints,
                deadline,
                cancel,
            )
            .await;

        let retry = match (&route.source, &fetched) {
            (Source::Query(query), Fetched::Done(Err(e))) if e.kind() == ErrorKind::SearchFailed => {
                Some(relax_query(query))
            }
            _ => None,
        };

        if let Some(relaxed) = retry {
            info!(?relaxed, "Search failed, retrying once with relaxed query");

            fetched = self
                .fetch(
                    &route.adapter,
                    Source::Query(relaxed),
                    work_dir.path(),
                    &constraints,
                    deadline,
                    cancel,
                )
                .await;
        }

        let result = match fetched {
            Fetched::Done(Ok(artifact)) => self.finish(artifact, work_dir).await,
            Fetched::Done(Err(e)) => Err(e),
            Fetched::TimedOut => Err(GatewayError::new(ErrorKind::Timeout)),
            Fetched::Cancelled => Err(GatewayError::new(ErrorKind::Cancelled)),
        };

        job.status = if result.is_ok() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        debug!(job = %job.id, status = ?job.status, "Job reached terminal status");

        result
    }

    /// Run the adapter until it finishes, the deadline passes or the caller cancels.
    async fn fetch(
        &self,
        adapter: &AdapterEntry,
        source: Source,
        work_dir: &Path,
        constraints: &FetchConstraints,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Fetched {
        let job_cancel = cancel.child_token();
        let req = FetchRequest {
            source,
            work_dir,
            constraints,
            cancel: job_cancel.clone(),
        };

        let fut = AssertUnwindSafe(adapter.fetch(&req)).catch_unwind();
        tokio::pin!(fut);

        let interrupted = tokio::select! {
            res = &mut fut => return Fetched::Done(res.unwrap_or_else(|panic| {
                let msg = panic_message(panic.as_ref());
                error!(adapter = adapter.name(), %msg, "Adapter panicked");
                Err(GatewayError::internal(format!("adapter {} panicked: {}", adapter.name(), msg)))
            })),
            () = tokio::time::sleep_until(deadline) => Fetched::TimedOut,
            () = cancel.cancelled() => Fetched::Cancelled,
        };

        job_cancel.cancel();
        if tokio::time::timeout(self.settings.kill_grace, &mut fut).await.is_err() {
            warn!(adapter = adapter.name(), "Adapter did not stop in time, abandoning it");
        }

        interrupted
    }

    async fn finish(&self, mut artifact: MediaArtifact, work_dir: &WorkDir) -> GatewayResult {
        let size = SizeGuard::check(artifact.path(), self.settings.max_file_size_bytes).await?;
        artifact.set_size_bytes(size);

        let file = self
            .store
            .hand_off(work_dir, artifact.path())
            .await
            .map_err(GatewayError::internal)?;

        Ok(artifact.replace_file(file))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
