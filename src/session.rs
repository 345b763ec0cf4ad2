// Session controller: the only owner of mode, URL, cached metadata, trim and quality state.
// - Every user action and every backend result is a method call that mutates state and
//   returns the I/O the caller must perform next (`Effect`). Nothing here blocks or spawns.
// - Results come back as `SessionEvent`s, in the order the runner produced them.
// - Completion and failure both hand the controls back; the advanced-options
//   disclosure is the one piece of view state that a reset leaves alone.
use log::{debug, info};

use crate::{
    activity_log::ActivityLog,
    cache::{FetchOutcome, FetchTicket, MetadataCache},
    diagnostics::Diagnostics,
    error::{SessionError, TransitionError, ValidationError},
    model::{DownloadKind, DownloadRequest, Metadata, Mode, StreamInfo},
    progress::ProgressEvent,
    quality::QualityCatalog,
    trim::{Handle, TrimRange},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Metadata request outstanding; `then_download` when a download is waiting on it
    Fetching { then_download: bool },
    Ready,
    /// Playlist URL: waiting for the user to pick single or whole playlist
    ConfirmPending,
    SelectingFolder,
    Downloading,
    /// Stream URL resolution outstanding
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching { .. } => "fetching",
            Self::Ready => "ready",
            Self::ConfirmPending => "awaiting playlist confirmation",
            Self::SelectingFolder => "selecting a folder",
            Self::Downloading => "downloading",
            Self::Streaming => "resolving a stream",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True while an operation owns the download button.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Fetching {
                then_download: true
            } | Self::ConfirmPending
                | Self::SelectingFolder
                | Self::Downloading
                | Self::Streaming
        )
    }
}

/// Identifies one download stream. Events carrying an older ticket are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadTicket(u64);

impl DownloadTicket {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Work the caller has to carry out on the session's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchInfo { ticket: FetchTicket, url: String },
    /// Ask the user for a destination; answer with `Session::folder_selected`
    SelectFolder,
    StartDownload {
        ticket: DownloadTicket,
        request: DownloadRequest,
    },
    ResolveStream { url: String },
}

/// Results reported back by the runner
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    InfoFetched {
        ticket: FetchTicket,
        result: Result<Metadata, String>,
    },
    Progress {
        ticket: DownloadTicket,
        event: ProgressEvent,
    },
    /// The download request or its body stream failed
    DownloadFailed {
        ticket: DownloadTicket,
        message: String,
    },
    /// The body stream closed
    DownloadEnded { ticket: DownloadTicket },
    StreamResolved(Result<StreamInfo, String>),
}

/// User toggles that feed into the download request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub trim_enabled: bool,
    pub log_to_file: bool,
    pub choose_location: bool,
    pub sponsorblock: bool,
}

#[derive(Debug)]
pub struct Session {
    mode: Mode,
    state: SessionState,
    cache: MetadataCache,
    fetch_preserves: bool,
    trim: TrimRange,
    trim_url: Option<String>,
    trim_edited: bool,
    quality: QualityCatalog,
    options: DownloadOptions,
    advanced_open: bool,
    pending_request: Option<DownloadRequest>,
    last_download: DownloadTicket,
    active_download: Option<DownloadTicket>,
    status_line: String,
    log: ActivityLog,
    diagnostics: Diagnostics,
    now_playing: Option<StreamInfo>,
    playback_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Mode::Video)
    }
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: SessionState::Idle,
            cache: MetadataCache::default(),
            fetch_preserves: false,
            trim: TrimRange::default(),
            trim_url: None,
            trim_edited: false,
            quality: QualityCatalog::default(),
            options: DownloadOptions::default(),
            advanced_open: false,
            pending_request: None,
            last_download: DownloadTicket::default(),
            active_download: None,
            status_line: String::new(),
            log: ActivityLog::default(),
            diagnostics: Diagnostics::default(),
            now_playing: None,
            playback_error: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_url(&self) -> &str {
        self.cache.current_url()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.cache.metadata()
    }

    pub fn trim(&self) -> &TrimRange {
        &self.trim
    }

    pub fn quality(&self) -> &QualityCatalog {
        &self.quality
    }

    pub fn options(&self) -> DownloadOptions {
        self.options
    }

    pub fn set_options(&mut self, options: DownloadOptions) {
        self.options = options;
    }

    pub fn advanced_open(&self) -> bool {
        self.advanced_open
    }

    pub fn toggle_advanced(&mut self) {
        self.advanced_open = !self.advanced_open;
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn now_playing(&self) -> Option<&StreamInfo> {
        self.now_playing.as_ref()
    }

    pub fn playback_error(&self) -> Option<&str> {
        self.playback_error.as_deref()
    }

    /// A metadata request is outstanding, whether or not a download waits on it.
    pub fn is_fetching(&self) -> bool {
        self.cache.is_fetching()
    }

    pub fn controls_enabled(&self) -> bool {
        !self.state.is_busy()
    }

    pub fn download_label(&self) -> &'static str {
        match self.state {
            SessionState::Fetching {
                then_download: true,
            }
            | SessionState::ConfirmPending
            | SessionState::SelectingFolder => "Starting...",
            SessionState::Downloading => "Downloading...",
            SessionState::Streaming => "Resolving stream...",
            _ => "Download",
        }
    }

    fn is_playlist(&self) -> bool {
        self.metadata().is_some_and(|m| m.is_playlist)
    }

    /// Trim needs a file-producing mode and a single item.
    pub fn trim_available(&self) -> bool {
        self.mode.supports_trim() && !self.is_playlist()
    }

    pub fn quality_available(&self) -> bool {
        self.mode.supports_quality() && !self.is_playlist()
    }

    /// Records a failure that happened outside the download flow (setup, debug panel).
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.log.push(format!("Error: {message}"));
        self.diagnostics.record(message);
    }

    pub fn select_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!("Mode {} -> {}", self.mode.as_str(), mode.as_str());
        }
        self.mode = mode;
    }

    pub fn select_quality(&mut self, value: &str) -> bool {
        self.quality.select(value)
    }

    pub fn drag_trim(&mut self, handle: Handle, seconds: u64) {
        self.trim.set_from_handle(handle, seconds);
        self.trim_edited = true;
    }

    pub fn edit_trim_text(&mut self, start: &str, end: &str) {
        self.trim.set_from_text(start, end);
        self.trim_edited = true;
    }

    /// URL field lost focus. Prefetches metadata for a new, non-empty URL.
    pub fn commit_url(&mut self, raw: &str) -> Option<Effect> {
        let url = raw.trim();
        if url.is_empty() || url == self.cache.current_url() || self.state.is_busy() {
            return None;
        }
        Some(self.start_fetch(url, false, false))
    }

    pub fn initiate_download(&mut self, raw: &str) -> Result<Option<Effect>, SessionError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl.into());
        }
        if self.state.is_busy() {
            return Err(TransitionError::Busy.into());
        }

        if !self.mode.needs_metadata() {
            info!("Resolving stream for {url}");
            self.state = SessionState::Streaming;
            self.playback_error = None;
            self.now_playing = None;
            self.log.push("Resolving stream...");
            return Ok(Some(Effect::ResolveStream {
                url: url.to_string(),
            }));
        }

        if self.cache.lookup(url).is_some() {
            return self.proceed().map_err(SessionError::from);
        }

        if self.cache.in_flight_for(url).is_some() {
            debug!("Joining outstanding fetch for {url}");
            self.state = SessionState::Fetching {
                then_download: true,
            };
            return Ok(None);
        }

        Ok(Some(self.start_fetch(url, true, true)))
    }

    pub fn confirm_download(&mut self, kind: DownloadKind) -> Result<Option<Effect>, SessionError> {
        if self.state != SessionState::ConfirmPending {
            return Err(TransitionError::Invalid {
                action: "confirm download",
                state: self.state.name(),
            }
            .into());
        }
        self.begin_download(kind).map(Some).map_err(SessionError::from)
    }

    /// Playlist dialog closed without a choice.
    pub fn dismiss_confirm(&mut self) {
        if self.state == SessionState::ConfirmPending {
            self.state = SessionState::Ready;
        }
    }

    /// Answer to `Effect::SelectFolder`. `None` or an empty path cancels the download.
    pub fn folder_selected(&mut self, path: Option<String>) -> Result<Option<Effect>, SessionError> {
        if self.state != SessionState::SelectingFolder {
            return Err(TransitionError::Invalid {
                action: "select a folder",
                state: self.state.name(),
            }
            .into());
        }

        let path = path.filter(|p| !p.trim().is_empty());
        let (Some(mut request), Some(path)) = (self.pending_request.take(), path) else {
            self.log.push("Download cancelled (no folder selected).");
            self.finish(SessionState::Idle);
            return Ok(None);
        };

        self.log.push(format!("Saving to: {path}"));
        request.save_path = Some(path);
        Ok(Some(self.start_download(request)))
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Option<Effect> {
        match event {
            SessionEvent::InfoFetched { ticket, result } => self.on_info(ticket, result),
            SessionEvent::Progress { ticket, event } => {
                if self.owns(ticket) {
                    self.on_progress(event);
                }
                None
            }
            SessionEvent::DownloadFailed { ticket, message } => {
                if self.owns(ticket) {
                    self.fail_download(format!("Network Error: {message}"), message);
                }
                None
            }
            SessionEvent::DownloadEnded { ticket } => {
                if self.owns(ticket) {
                    let message = "stream ended before completion".to_string();
                    self.fail_download(format!("Network Error: {message}"), message);
                }
                None
            }
            SessionEvent::StreamResolved(result) => {
                self.on_stream(result);
                None
            }
        }
    }

    fn start_fetch(&mut self, url: &str, preserve: bool, then_download: bool) -> Effect {
        let ticket = self.cache.begin(url);
        self.fetch_preserves = preserve;
        self.state = SessionState::Fetching { then_download };
        self.status_line = "Fetching video info...".to_string();
        self.log.replace("Retrieving video metadata...");
        info!("Fetching metadata for {url}");
        Effect::FetchInfo {
            ticket,
            url: url.to_string(),
        }
    }

    fn on_info(&mut self, ticket: FetchTicket, result: Result<Metadata, String>) -> Option<Effect> {
        let preserve = self.fetch_preserves;
        let metadata = match self.cache.complete(ticket, result) {
            FetchOutcome::Stale => {
                debug!("Ignoring superseded metadata response");
                return None;
            }
            FetchOutcome::Failed(message) => {
                if matches!(self.state, SessionState::Fetching { .. }) {
                    self.status_line = "Error fetching info".to_string();
                    self.state = SessionState::Failed;
                }
                self.record_error(message);
                return None;
            }
            FetchOutcome::Stored(metadata) => metadata.clone(),
        };

        self.quality.rebuild(&metadata.available_formats, preserve);
        if !metadata.is_playlist {
            let url = self.cache.current_url().to_string();
            let keep_edits =
                preserve && self.trim_edited && self.trim_url.as_deref() == Some(url.as_str());
            if !keep_edits {
                self.trim.set_bound(metadata.duration_seconds);
                self.trim_edited = false;
                self.trim_url = Some(url);
            }
        }
        // only a fetch the session is still waiting on touches the status surfaces
        if !matches!(self.state, SessionState::Fetching { .. }) {
            return None;
        }
        self.status_line = "Ready to download".to_string();
        self.log.replace("Ready to download! ✅");

        match self.state {
            SessionState::Fetching {
                then_download: true,
            } => self.proceed().ok().flatten(),
            SessionState::Fetching {
                then_download: false,
            } => {
                self.state = SessionState::Ready;
                None
            }
            _ => None,
        }
    }

    /// Metadata for the current URL is cached; branch on playlist.
    fn proceed(&mut self) -> Result<Option<Effect>, ValidationError> {
        if self.is_playlist() {
            self.state = SessionState::ConfirmPending;
            return Ok(None);
        }
        self.begin_download(DownloadKind::Single).map(Some)
    }

    fn begin_download(&mut self, kind: DownloadKind) -> Result<Effect, ValidationError> {
        self.log.push(format!("Starting {} download...", kind.as_str()));
        self.log.push(format!("Mode: {}", self.mode.as_str()));

        let request = match self.build_request(kind) {
            Ok(request) => request,
            Err(err) => {
                self.log.push(format!("Error: {err}"));
                self.finish(SessionState::Idle);
                return Err(err);
            }
        };

        if self.options.choose_location {
            self.log.push("Select download folder...");
            self.pending_request = Some(request);
            self.state = SessionState::SelectingFolder;
            return Ok(Effect::SelectFolder);
        }

        Ok(self.start_download(request))
    }

    fn start_download(&mut self, request: DownloadRequest) -> Effect {
        let ticket = self.last_download.next();
        self.last_download = ticket;
        self.active_download = Some(ticket);
        self.state = SessionState::Downloading;
        Effect::StartDownload { ticket, request }
    }

    /// Whether `ticket` belongs to the download currently running.
    fn owns(&self, ticket: DownloadTicket) -> bool {
        let current = self.state == SessionState::Downloading && self.active_download == Some(ticket);
        if !current {
            debug!("Dropping event from a download that is no longer running");
        }
        current
    }

    /// Snapshot of everything the download needs, taken before any folder dialog.
    fn build_request(&self, kind: DownloadKind) -> Result<DownloadRequest, ValidationError> {
        let (trim_start, trim_end) = if self.options.trim_enabled && self.trim_available() {
            if self.trim.bound() == 0 {
                return Err(ValidationError::MissingTrimBounds);
            }
            if self.trim.is_empty() {
                return Err(ValidationError::EmptyTrimRange);
            }
            (
                Some(self.trim.start_text().to_string()),
                Some(self.trim.end_text().to_string()),
            )
        } else {
            (None, None)
        };

        Ok(DownloadRequest {
            url: self.cache.current_url().to_string(),
            mode: self.mode,
            kind,
            save_path: None,
            quality: self.quality.selected_value().to_string(),
            trim_start,
            trim_end,
            log_to_file: self.options.log_to_file,
            sponsorblock: self.options.sponsorblock.then_some(true),
        })
    }

    fn on_progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Log { log } => self.log.push(log),
            ProgressEvent::Error { error } => {
                self.fail_download(format!("Error: {error}"), error);
            }
            event if event.is_completed() => {
                info!("Download completed");
                self.log.push("Download Complete! ✅");
                self.finish(SessionState::Completed);
            }
            other => debug!("Ignoring progress event {other:?}"),
        }
    }

    fn fail_download(&mut self, line: String, message: String) {
        self.log.push(line);
        self.diagnostics.record(message);
        self.finish(SessionState::Failed);
    }

    fn on_stream(&mut self, result: Result<StreamInfo, String>) {
        if self.state != SessionState::Streaming {
            debug!("Stream result arrived after the session moved on");
            return;
        }
        match result {
            Ok(stream) => {
                self.log.push(format!("Streaming: {}", stream.title));
                self.now_playing = Some(stream);
                self.finish(SessionState::Completed);
            }
            Err(message) => {
                self.log.push(format!("Playback error: {message}"));
                self.diagnostics.record(format!("Playback error: {message}"));
                self.playback_error = Some(message);
                self.finish(SessionState::Idle);
            }
        }
    }

    fn finish(&mut self, state: SessionState) {
        self.pending_request = None;
        self.active_download = None;
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Format};

    const URL: &str = "https://example.com/watch?v=1";

    fn single(duration: u64, heights: &[u64]) -> Metadata {
        Metadata {
            title: "Clip".to_string(),
            duration_seconds: duration,
            is_playlist: false,
            entries: None,
            entries_count: 1,
            available_formats: heights
                .iter()
                .map(|&h| Format { height: Some(h) })
                .collect(),
            thumbnail_url: None,
            size_label: None,
        }
    }

    fn playlist() -> Metadata {
        Metadata {
            title: "Mix".to_string(),
            duration_seconds: 0,
            is_playlist: true,
            entries: Some(vec![Entry::default(), Entry::default()]),
            entries_count: 2,
            available_formats: Vec::new(),
            thumbnail_url: None,
            size_label: None,
        }
    }

    fn fetch_ticket(effect: Option<Effect>) -> FetchTicket {
        match effect {
            Some(Effect::FetchInfo { ticket, .. }) => ticket,
            other => panic!("expected FetchInfo, got {other:?}"),
        }
    }

    fn started(effect: Option<Effect>) -> (DownloadTicket, DownloadRequest) {
        match effect {
            Some(Effect::StartDownload { ticket, request }) => (ticket, request),
            other => panic!("expected StartDownload, got {other:?}"),
        }
    }

    fn download_request(effect: Option<Effect>) -> DownloadRequest {
        started(effect).1
    }

    fn frame(ticket: DownloadTicket, event: ProgressEvent) -> SessionEvent {
        SessionEvent::Progress { ticket, event }
    }

    fn fetched(session: &mut Session, ticket: FetchTicket, metadata: Metadata) -> Option<Effect> {
        session.handle_event(SessionEvent::InfoFetched {
            ticket,
            result: Ok(metadata),
        })
    }

    #[test]
    fn empty_url_is_rejected_without_side_effects() {
        let mut session = Session::default();
        assert_eq!(
            session.initiate_download("   "),
            Err(SessionError::Validation(ValidationError::EmptyUrl))
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.controls_enabled());
    }

    #[test]
    fn single_download_runs_to_completion() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        assert_eq!(session.download_label(), "Starting...");
        assert!(!session.controls_enabled());

        let (download, request) = started(fetched(&mut session, ticket, single(90, &[720, 1080])));
        assert_eq!(request.url, URL);
        assert_eq!(request.kind, DownloadKind::Single);
        assert_eq!(request.mode, Mode::Video);
        assert_eq!(request.quality, "max");
        assert_eq!(request.trim_start, None);
        assert_eq!(session.state(), SessionState::Downloading);
        assert_eq!(session.download_label(), "Downloading...");

        session.handle_event(frame(
            download,
            ProgressEvent::Log {
                log: "[download] 50%".to_string(),
            },
        ));
        session.handle_event(frame(
            download,
            ProgressEvent::Status {
                status: "completed".to_string(),
            },
        ));
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.controls_enabled());
        assert_eq!(session.download_label(), "Download");

        let lines = session.log().lines();
        let log_at = lines.iter().position(|l| l == "[download] 50%").unwrap();
        let done_at = lines.iter().position(|l| l == "Download Complete! ✅").unwrap();
        assert!(log_at < done_at);

        // stream EOF after the terminal frame changes nothing
        session.handle_event(SessionEvent::DownloadEnded { ticket: download });
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn outstanding_fetch_for_same_url_is_joined() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.commit_url(URL));
        assert_eq!(session.commit_url(URL), None);
        assert_eq!(session.initiate_download(URL), Ok(None));
        assert_eq!(
            session.state(),
            SessionState::Fetching {
                then_download: true
            }
        );

        let request = download_request(fetched(&mut session, ticket, single(30, &[])));
        assert_eq!(request.url, URL);
    }

    #[test]
    fn cached_metadata_skips_fetch() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.commit_url(URL));
        assert_eq!(fetched(&mut session, ticket, single(30, &[])), None);
        assert_eq!(session.state(), SessionState::Ready);

        download_request(session.initiate_download(URL).unwrap());
    }

    #[test]
    fn url_change_invalidates_cache() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.commit_url(URL));
        fetched(&mut session, ticket, single(30, &[]));

        let other = "https://example.com/watch?v=2";
        fetch_ticket(session.commit_url(other));
        assert!(session.metadata().is_none());
        assert_eq!(session.current_url(), other);
    }

    #[test]
    fn superseded_fetch_result_is_ignored() {
        let mut session = Session::default();
        let old = fetch_ticket(session.commit_url(URL));
        let new = fetch_ticket(session.commit_url("https://example.com/watch?v=2"));

        assert_eq!(fetched(&mut session, old, single(30, &[])), None);
        assert!(session.metadata().is_none());
        assert_eq!(
            session.state(),
            SessionState::Fetching {
                then_download: false
            }
        );

        fetched(&mut session, new, single(45, &[]));
        assert_eq!(session.metadata().map(|m| m.duration_seconds), Some(45));
    }

    #[test]
    fn playlist_waits_for_confirmation() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        assert_eq!(fetched(&mut session, ticket, playlist()), None);
        assert_eq!(session.state(), SessionState::ConfirmPending);
        assert!(!session.trim_available());
        assert!(!session.quality_available());

        // nothing else moves it forward
        session.handle_event(frame(
            DownloadTicket::default(),
            ProgressEvent::Log {
                log: "stray".to_string(),
            },
        ));
        assert_eq!(session.state(), SessionState::ConfirmPending);
        assert_eq!(session.initiate_download(URL), Err(SessionError::Transition(TransitionError::Busy)));

        let request = download_request(session.confirm_download(DownloadKind::Playlist).unwrap());
        assert_eq!(request.kind, DownloadKind::Playlist);
    }

    #[test]
    fn dismissed_confirmation_returns_to_ready() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        fetched(&mut session, ticket, playlist());
        session.dismiss_confirm();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.controls_enabled());
    }

    #[test]
    fn confirm_outside_confirmation_is_invalid() {
        let mut session = Session::default();
        assert!(matches!(
            session.confirm_download(DownloadKind::Single),
            Err(SessionError::Transition(TransitionError::Invalid { .. }))
        ));
    }

    #[test]
    fn fetch_failure_restores_controls_and_records() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        let effect = session.handle_event(SessionEvent::InfoFetched {
            ticket,
            result: Err("Unsupported URL".to_string()),
        });
        assert_eq!(effect, None);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.controls_enabled());
        assert!(session.metadata().is_none());
        assert_eq!(session.status_line(), "Error fetching info");
        assert_eq!(
            session.diagnostics().read().map(|e| e.message.as_str()),
            Some("Unsupported URL")
        );

        // retry issues a fresh request
        fetch_ticket(session.initiate_download(URL).unwrap());
    }

    #[test]
    fn backend_error_frame_fails_download() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        let (download, _) = started(fetched(&mut session, ticket, single(30, &[])));
        session.handle_event(frame(
            download,
            ProgressEvent::Error {
                error: "Download failed/Interrupted".to_string(),
            },
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.log().last(), Some("Error: Download failed/Interrupted"));
        assert!(session.controls_enabled());
    }

    #[test]
    fn transport_failures_fail_download() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        let (first, _) = started(fetched(&mut session, ticket, single(30, &[])));
        session.handle_event(SessionEvent::DownloadFailed {
            ticket: first,
            message: "connection reset".to_string(),
        });
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.log().last(), Some("Network Error: connection reset"));

        let (second, _) = started(session.initiate_download(URL).unwrap());
        session.handle_event(SessionEvent::DownloadEnded { ticket: second });
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            session.diagnostics().read().map(|e| e.message.as_str()),
            Some("stream ended before completion")
        );
    }

    #[test]
    fn folder_cancel_aborts_before_request() {
        let mut session = Session::default();
        session.set_options(DownloadOptions {
            choose_location: true,
            ..DownloadOptions::default()
        });
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        assert_eq!(fetched(&mut session, ticket, single(30, &[])), Some(Effect::SelectFolder));
        assert_eq!(session.state(), SessionState::SelectingFolder);

        assert_eq!(session.folder_selected(None), Ok(None));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.controls_enabled());
        assert_eq!(session.log().last(), Some("Download cancelled (no folder selected)."));
    }

    #[test]
    fn folder_choice_fills_save_path_only() {
        let mut session = Session::default();
        session.set_options(DownloadOptions {
            choose_location: true,
            log_to_file: true,
            sponsorblock: true,
            ..DownloadOptions::default()
        });
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        fetched(&mut session, ticket, single(30, &[480]));

        let request = download_request(session.folder_selected(Some("/tmp/out".to_string())).unwrap());
        assert_eq!(request.save_path.as_deref(), Some("/tmp/out"));
        assert!(request.log_to_file);
        assert_eq!(request.sponsorblock, Some(true));
    }

    #[test]
    fn trim_edits_flow_into_request() {
        let mut session = Session::default();
        session.set_options(DownloadOptions {
            trim_enabled: true,
            ..DownloadOptions::default()
        });
        let ticket = fetch_ticket(session.commit_url(URL));
        fetched(&mut session, ticket, single(300, &[]));
        assert_eq!(session.trim().end(), 300);

        session.edit_trim_text("00:30", "01:45");
        let request = download_request(session.initiate_download(URL).unwrap());
        assert_eq!(request.trim_start.as_deref(), Some("00:30"));
        assert_eq!(request.trim_end.as_deref(), Some("01:45"));
    }

    #[test]
    fn preserve_fetch_keeps_trim_and_quality_for_same_url() {
        let mut session = Session::default();
        let first = fetch_ticket(session.commit_url(URL));
        fetched(&mut session, first, single(300, &[720, 480]));
        session.drag_trim(Handle::Start, 60);
        assert!(session.select_quality("480p"));

        // user wanders to another URL and back before clicking download
        let detour = fetch_ticket(session.commit_url("https://example.com/watch?v=2"));
        let back = fetch_ticket(session.initiate_download(URL).unwrap());
        assert_eq!(fetched(&mut session, detour, single(10, &[])), None);

        let request = download_request(fetched(&mut session, back, single(300, &[1080, 480])));
        assert_eq!(session.trim().start(), 60);
        assert_eq!(request.quality, "480p");
    }

    #[test]
    fn prefetch_resets_trim_and_quality() {
        let mut session = Session::default();
        let first = fetch_ticket(session.commit_url(URL));
        fetched(&mut session, first, single(300, &[720, 480]));
        session.drag_trim(Handle::End, 100);
        session.select_quality("480p");

        let second = fetch_ticket(session.commit_url("https://example.com/watch?v=2"));
        fetched(&mut session, second, single(50, &[720, 480]));
        assert_eq!((session.trim().start(), session.trim().end()), (0, 50));
        assert_eq!(session.quality().selected_value(), "max");
    }

    #[test]
    fn zero_duration_trim_is_a_validation_error() {
        let mut session = Session::default();
        session.set_options(DownloadOptions {
            trim_enabled: true,
            ..DownloadOptions::default()
        });
        let ticket = fetch_ticket(session.commit_url(URL));
        fetched(&mut session, ticket, single(0, &[]));

        assert_eq!(
            session.initiate_download(URL),
            Err(SessionError::Validation(ValidationError::MissingTrimBounds))
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.controls_enabled());
    }

    #[test]
    fn stream_mode_skips_metadata() {
        let mut session = Session::new(Mode::Stream);
        assert!(!session.trim_available());
        assert!(!session.quality_available());
        assert_eq!(
            session.initiate_download(URL),
            Ok(Some(Effect::ResolveStream {
                url: URL.to_string()
            }))
        );
        assert!(session.metadata().is_none());
        assert_eq!(session.state(), SessionState::Streaming);

        session.handle_event(SessionEvent::StreamResolved(Ok(StreamInfo {
            title: "Live".to_string(),
            stream_url: "https://cdn/stream.m3u8".to_string(),
        })));
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.now_playing().map(|s| s.title.as_str()), Some("Live"));
    }

    #[test]
    fn playback_error_leaves_download_state_alone() {
        let mut session = Session::new(Mode::Stream);
        session.initiate_download(URL).unwrap();
        session.handle_event(SessionEvent::StreamResolved(Err("no formats".to_string())));
        assert_eq!(session.playback_error(), Some("no formats"));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.controls_enabled());
    }

    #[test]
    fn advanced_disclosure_survives_reset() {
        let mut session = Session::default();
        session.toggle_advanced();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        let (download, _) = started(fetched(&mut session, ticket, single(30, &[])));
        session.handle_event(frame(
            download,
            ProgressEvent::Error {
                error: "x".to_string(),
            },
        ));
        assert!(session.advanced_open());
    }

    #[test]
    fn late_events_from_a_finished_download_are_dropped() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        let (first, _) = started(fetched(&mut session, ticket, single(30, &[])));
        session.handle_event(frame(
            first,
            ProgressEvent::Status {
                status: "completed".to_string(),
            },
        ));
        assert_eq!(session.state(), SessionState::Completed);

        // clicked again before the first stream's close was delivered
        let (second, _) = started(session.initiate_download(URL).unwrap());
        assert_ne!(first, second);
        session.handle_event(SessionEvent::DownloadEnded { ticket: first });
        session.handle_event(SessionEvent::DownloadFailed {
            ticket: first,
            message: "connection reset".to_string(),
        });
        assert_eq!(session.state(), SessionState::Downloading);
        assert!(!session.controls_enabled());
        assert!(session.diagnostics().read().is_none());
        assert_eq!(
            session.initiate_download(URL),
            Err(SessionError::Transition(TransitionError::Busy))
        );

        session.handle_event(SessionEvent::DownloadEnded { ticket: second });
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn prefetch_landing_during_stream_resolution_keeps_stream_log() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.commit_url(URL));
        session.select_mode(Mode::Stream);
        session.initiate_download(URL).unwrap();
        assert_eq!(session.log().last(), Some("Resolving stream..."));

        assert_eq!(fetched(&mut session, ticket, single(30, &[720])), None);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.log().last(), Some("Resolving stream..."));
        assert_ne!(session.status_line(), "Ready to download");
        assert!(session.metadata().is_some());
    }

    #[test]
    fn mode_switch_is_allowed_mid_download() {
        let mut session = Session::default();
        let ticket = fetch_ticket(session.initiate_download(URL).unwrap());
        fetched(&mut session, ticket, single(30, &[]));
        session.select_mode(Mode::Stream);
        assert_eq!(session.mode(), Mode::Stream);
        assert_eq!(session.state(), SessionState::Downloading);
    }
}
