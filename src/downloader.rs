use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use tokio::{runtime::Handle, sync::mpsc::UnboundedSender};

use crate::{
    backend::Backend,
    cache::FetchTicket,
    error::BackendError,
    model::DownloadRequest,
    progress::{FrameBuffer, ProgressEvent},
    session::{DownloadTicket, Effect, SessionEvent},
    setup::SetupEvent,
};

/// Everything background tasks report to the GUI thread
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Session(SessionEvent),
    Setup(SetupEvent),
}

pub type EventSender = UnboundedSender<AppEvent>;

/// Carries out session effects and one-shot backend calls on the tokio runtime.
#[derive(Clone)]
pub struct Runner {
    backend: Arc<dyn Backend>,
    runtime: Handle,
    events: EventSender,
}

impl Runner {
    pub fn new(backend: Arc<dyn Backend>, runtime: Handle, events: EventSender) -> Self {
        Self {
            backend,
            runtime,
            events,
        }
    }

    pub fn run(&self, effect: Effect) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        match effect {
            Effect::FetchInfo { ticket, url } => {
                self.runtime.spawn(fetch_info(backend, ticket, url, events));
            }
            Effect::StartDownload { ticket, request } => {
                self.runtime
                    .spawn(spawn_download(backend, ticket, request, events));
            }
            Effect::ResolveStream { url } => {
                self.runtime.spawn(resolve_stream(backend, url, events));
            }
            Effect::SelectFolder => warn!("Folder selection is handled by the view"),
        }
    }

    pub fn check_setup(&self) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let result = backend
                .setup_check()
                .await
                .map(|check| check.installed)
                .map_err(|err| err.to_string());
            let _ = events.send(AppEvent::Setup(SetupEvent::Checked(result)));
        });
    }

    pub fn install(&self) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(install_tools(backend, events));
    }

    pub fn browse(&self, path: String) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let result = backend.browse(&path).await.map_err(|err| err.to_string());
            let _ = events.send(AppEvent::Setup(SetupEvent::Browsed(result)));
        });
    }

    pub fn debug_report(&self) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let result = backend.debug_report().await.map_err(|err| err.to_string());
            let _ = events.send(AppEvent::Setup(SetupEvent::DebugReport(result)));
        });
    }

    pub fn debug_test(&self, url: String) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let result = backend.debug_test(&url).await.map_err(|err| err.to_string());
            let _ = events.send(AppEvent::Setup(SetupEvent::DebugTest(result)));
        });
    }

    /// Asks the backend to shut down. Blocks; only call from outside the runtime.
    pub fn shutdown_backend(&self) {
        if let Err(err) = self.runtime.block_on(self.backend.exit()) {
            warn!("Backend did not acknowledge exit: {err}");
        }
    }
}

pub async fn fetch_info(
    backend: Arc<dyn Backend>,
    ticket: FetchTicket,
    url: String,
    events: EventSender,
) {
    let result = backend.fetch_info(&url).await.map_err(|err| {
        warn!("Metadata fetch for {url} failed: {err}");
        err.to_string()
    });
    let _ = events.send(AppEvent::Session(SessionEvent::InfoFetched { ticket, result }));
}

/// Opens the download stream and forwards every frame as it arrives, tagged with `ticket`.
pub async fn spawn_download(
    backend: Arc<dyn Backend>,
    ticket: DownloadTicket,
    request: DownloadRequest,
    events: EventSender,
) {
    let wrap = |event| AppEvent::Session(SessionEvent::Progress { ticket, event });
    let outcome = match backend.open_download(&request).await {
        Ok(stream) => pump_frames(stream, &events, wrap).await,
        Err(err) => Err(err),
    };

    let last = match outcome {
        Ok(()) => {
            debug!("Download stream for {} closed", request.url);
            SessionEvent::DownloadEnded { ticket }
        }
        Err(err) => {
            error!("Download stream for {} failed: {err}", request.url);
            SessionEvent::DownloadFailed {
                ticket,
                message: err.to_string(),
            }
        }
    };
    let _ = events.send(AppEvent::Session(last));
}

pub async fn resolve_stream(backend: Arc<dyn Backend>, url: String, events: EventSender) {
    let result = backend.resolve_stream(&url).await.map_err(|err| err.to_string());
    if let Ok(stream) = &result {
        info!("Resolved stream for {url}: {}", stream.stream_url);
    }
    let _ = events.send(AppEvent::Session(SessionEvent::StreamResolved(result)));
}

pub async fn install_tools(backend: Arc<dyn Backend>, events: EventSender) {
    let outcome = match backend.open_install().await {
        Ok(stream) => pump_frames(stream, &events, |e| AppEvent::Setup(SetupEvent::Install(e))).await,
        Err(err) => Err(err),
    };
    let last = match outcome {
        Ok(()) => SetupEvent::InstallEnded,
        Err(err) => SetupEvent::InstallFailed(err.to_string()),
    };
    let _ = events.send(AppEvent::Setup(last));
}

/// Reads a frame stream until it ends or yields a terminal frame, sending each
/// parsed event in arrival order.
///
/// Returns early without error if the receiving side has gone away.
pub async fn pump_frames<S, F>(
    mut stream: S,
    events: &EventSender,
    wrap: F,
) -> Result<(), BackendError>
where
    S: Stream<Item = Result<Vec<u8>, BackendError>> + Unpin,
    F: Fn(ProgressEvent) -> AppEvent,
{
    let mut frames = FrameBuffer::new();
    while let Some(chunk) = stream.next().await {
        for event in frames.push(&chunk?) {
            let terminal = event.is_terminal();
            if events.send(wrap(event)).is_err() {
                debug!("Event receiver dropped, abandoning stream");
                return Ok(());
            }
            if terminal {
                return Ok(());
            }
        }
    }
    if frames.pending_len() > 0 {
        debug!("Stream closed with {} unterminated bytes", frames.pending_len());
    }
    if let Some(event) = frames.finish() {
        let _ = events.send(wrap(event));
    }
    Ok(())
}
