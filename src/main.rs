//! Desktop front end for the Aura Downloader backend

// Seconds <-> "MM:SS" / "H:MM:SS" conversion
mod time_codec;
// Dual-handle trim range
mod trim;
// Wire types for the backend contract
mod model;
// Quality dropdown built from the reported formats
mod quality;
// Metadata for the current URL plus in-flight fetch tracking
mod cache;
// `data:` frame parsing for progress streams
mod progress;
// Last-error slot for the debug panel
mod diagnostics;
// Capped log panel contents
mod activity_log;
// Error enums
mod error;
// The session state machine
mod session;
// Environment-driven settings
mod config;
// HTTP client for the local backend
mod backend;
// Toolchain install and debug panel state
mod setup;
// Runs session effects on the tokio runtime
mod downloader;
// Preview image fetching
mod thumbnail;

use std::{
    error::Error,
    process::Command,
    sync::{Arc, Mutex},
    time::Duration,
};

// eframe/egui for GUI application framework
use eframe::{App, Frame, egui};
use egui::{Color32, ColorImage, TextureHandle, TextureOptions, Visuals};
use log::{debug, info, warn};
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
// FileDialog for folder selection dialogs
use rfd::FileDialog;
use rust_embed::RustEmbed;
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
};

use backend::HttpBackend;
use config::Config;
use downloader::{AppEvent, Runner};
use error::{SessionError, TransitionError};
use model::{DownloadKind, Mode};
use session::{Effect, Session, SessionEvent, SessionState};
use setup::{SetupPhase, SetupState};
use trim::Handle;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

const FALLBACK_VERSION: &str = "1.0.0";

#[cfg(target_os = "windows")]
const OPENER: &str = "explorer";
#[cfg(target_os = "macos")]
const OPENER: &str = "open";
#[cfg(all(unix, not(target_os = "macos")))]
const OPENER: &str = "xdg-open";

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging, runtime and backend client, then launches the GUI
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rt = RUNTIME.get_or_try_init(|| Runtime::new().map(Arc::new))?;

    let config = Config::from_env();
    info!("Using backend at {}", config.backend_url);
    let backend = Arc::new(HttpBackend::new(&config)?);

    let (tx, rx) = unbounded_channel();
    let runner = Runner::new(backend, rt.handle().clone(), tx);

    let app_runner = runner.clone();
    eframe::run_native(
        "Aura Downloader",
        eframe::NativeOptions::default(),
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(AuraApp::new(config, app_runner, rx))
        }),
    )?;

    // window closed: take the backend down with us
    runner.shutdown_backend();
    Ok(())
}

/// Application state for the GUI. All session logic lives in `Session`; this only binds it to widgets.
struct AuraApp {
    config: Config,
    runner: Runner,
    /// Results from background tasks, drained once per frame
    events: UnboundedReceiver<AppEvent>,
    session: Session,
    setup: SetupState,
    /// Contents of the URL field
    url_input: String,
    /// Trim text fields; resynced from the session whenever they are not focused
    trim_start_input: String,
    trim_end_input: String,
    debug_url_input: String,
    /// Validation message waiting to be acknowledged
    notice: Option<String>,
    show_debug: bool,
    version: String,
    /// Texture for the current preview, keyed by its URL
    thumbnail: Option<(String, TextureHandle)>,
    thumbnail_requested: Option<String>,
    /// Incoming thumbnail fetch results (url, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
}

impl AuraApp {
    fn new(config: Config, runner: Runner, events: UnboundedReceiver<AppEvent>) -> Self {
        let mut setup = SetupState::default();
        setup.begin_check();
        runner.check_setup();

        Self {
            config,
            runner,
            events,
            session: Session::default(),
            setup,
            url_input: String::new(),
            trim_start_input: String::new(),
            trim_end_input: String::new(),
            debug_url_input: String::new(),
            notice: None,
            show_debug: false,
            version: version_label(),
            thumbnail: None,
            thumbnail_requested: None,
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Carries out effects until the session stops asking for more.
    /// Folder selection is answered here, synchronously, like the Browse button always was.
    fn dispatch(&mut self, effect: Option<Effect>) {
        let mut next = effect;
        while let Some(effect) = next.take() {
            match effect {
                Effect::SelectFolder => {
                    let picked = FileDialog::new()
                        .set_directory(&self.config.download_dir)
                        .pick_folder()
                        .map(|folder| folder.display().to_string());
                    match self.session.folder_selected(picked) {
                        Ok(effect) => next = effect,
                        Err(err) => warn!("{err}"),
                    }
                }
                other => self.runner.run(other),
            }
        }
    }

    fn report(&mut self, result: Result<Option<Effect>, SessionError>) {
        match result {
            Ok(effect) => self.dispatch(effect),
            Err(SessionError::Transition(TransitionError::Busy)) => {
                debug!("Ignoring click while busy")
            }
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::Session(event) => {
                    let resolved = matches!(event, SessionEvent::StreamResolved(Ok(_)));
                    let effect = self.session.handle_event(event);
                    self.dispatch(effect);
                    if resolved {
                        self.play_resolved_stream();
                    }
                }
                AppEvent::Setup(event) => {
                    if let Some(message) = self.setup.handle(event) {
                        self.session.record_error(message);
                    }
                }
            }
        }
    }

    fn play_resolved_stream(&mut self) {
        let Some(target) = self.session.now_playing().map(|s| s.stream_url.clone()) else {
            return;
        };
        info!("Opening stream in the system player");
        if let Err(err) = Command::new(OPENER).arg(&target).spawn() {
            self.session
                .record_error(format!("Playback error: could not launch {OPENER}: {err}"));
        }
    }

    /// Starts a fetch for a new preview image and uploads finished ones as textures.
    fn poll_thumbnails(&mut self, ctx: &egui::Context) {
        let wanted = self
            .session
            .metadata()
            .and_then(|m| m.thumbnail_url.clone());

        if let Some(url) = wanted.as_ref().filter(|url| self.thumbnail_requested.as_ref() != Some(*url)) {
            self.thumbnail_requested = Some(url.clone());
            let url = url.clone();
            let results = Arc::clone(&self.thumbnail_results);
            let ctx = ctx.clone();
            if let Some(rt) = RUNTIME.get() {
                rt.spawn_blocking(move || {
                    if let Some(img) = thumbnail::fetch_thumbnail(&url) {
                        if let Ok(mut pending) = results.lock() {
                            pending.push((url, img));
                        }
                        ctx.request_repaint();
                    }
                });
            }
        }

        if let Ok(mut pending) = self.thumbnail_results.lock() {
            for (url, img) in pending.drain(..) {
                let tex = ctx.load_texture(&url, img, TextureOptions::default());
                self.thumbnail = Some((url, tex));
            }
        }

        if self.thumbnail.as_ref().map(|(url, _)| url) != wanted.as_ref() {
            self.thumbnail = None;
        }
    }

    fn header_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Aura Downloader");
            ui.label(&self.version);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Exit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
                ui.toggle_value(&mut self.show_debug, "Debug");
            });
        });
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        let enabled = self.session.controls_enabled();

        // 1️⃣ Mode cards; switching is allowed even while busy
        ui.horizontal(|ui| {
            for mode in Mode::ALL {
                let selected = self.session.mode() == mode;
                if ui.selectable_label(selected, mode.label()).clicked() {
                    self.session.select_mode(mode);
                }
            }
        });
        ui.separator();

        // 2️⃣ URL field; leaving it prefetches metadata
        ui.label("Media URL:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.url_input)
                .hint_text("Paste a video or playlist link")
                .desired_width(f32::INFINITY),
        );
        if response.lost_focus() {
            let effect = self.session.commit_url(&self.url_input);
            self.dispatch(effect);
        }
        ui.horizontal(|ui| {
            if self.session.is_fetching() {
                ui.spinner();
            }
            ui.label(self.session.status_line());
        });

        // 3️⃣ Quality
        ui.add_enabled_ui(enabled && self.session.quality_available(), |ui| {
            let mut choice = None;
            egui::ComboBox::from_label("Quality")
                .selected_text(self.session.quality().selected().label.as_str())
                .show_ui(ui, |ui| {
                    let current = self.session.quality().selected_value();
                    for option in self.session.quality().options() {
                        if ui
                            .selectable_label(option.value == current, option.label.as_str())
                            .clicked()
                        {
                            choice = Some(option.value.clone());
                        }
                    }
                });
            if let Some(value) = choice {
                self.session.select_quality(&value);
            }
        });

        // 4️⃣ Trim
        let mut options = self.session.options();
        ui.add_enabled_ui(enabled && self.session.trim_available(), |ui| {
            ui.checkbox(&mut options.trim_enabled, "Trim");
            if options.trim_enabled {
                self.trim_ui(ui);
            }
        });

        // 5️⃣ Toggles
        ui.add_enabled_ui(enabled, |ui| {
            ui.checkbox(&mut options.choose_location, "Choose download location");
            if ui
                .selectable_label(self.session.advanced_open(), "Advanced options")
                .clicked()
            {
                self.session.toggle_advanced();
            }
            if self.session.advanced_open() {
                ui.indent("advanced", |ui| {
                    ui.checkbox(&mut options.log_to_file, "Write log file");
                    ui.checkbox(&mut options.sponsorblock, "Remove sponsor segments");
                });
            }
        });
        if options != self.session.options() {
            self.session.set_options(options);
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let button = egui::Button::new(self.session.download_label());
            if ui.add_enabled(enabled, button).clicked() {
                let result = self.session.initiate_download(&self.url_input);
                self.report(result);
            }
            if !enabled {
                ui.spinner();
            }
            if ui.button("Open downloads folder").clicked() {
                self.runner.browse(self.config.download_dir.clone());
            }
        });

        if let Some(message) = self.session.playback_error() {
            ui.colored_label(Color32::LIGHT_RED, format!("Playback error: {message}"));
        }
        if let Some(stream) = self.session.now_playing() {
            ui.label(format!("Now playing: {}", stream.title));
        }
    }

    fn trim_ui(&mut self, ui: &mut egui::Ui) {
        let bound = self.session.trim().bound();
        let mut start = self.session.trim().start();
        let mut end = self.session.trim().end();

        ui.horizontal(|ui| {
            ui.label("Start");
            if ui
                .add(egui::Slider::new(&mut start, 0..=bound).show_value(false))
                .changed()
            {
                self.session.drag_trim(Handle::Start, start);
            }
        });
        ui.horizontal(|ui| {
            ui.label("End  ");
            if ui
                .add(egui::Slider::new(&mut end, 0..=bound).show_value(false))
                .changed()
            {
                self.session.drag_trim(Handle::End, end);
            }
        });

        ui.horizontal(|ui| {
            let start_edit = ui.add(egui::TextEdit::singleline(&mut self.trim_start_input).desired_width(70.0));
            ui.label("to");
            let end_edit = ui.add(egui::TextEdit::singleline(&mut self.trim_end_input).desired_width(70.0));

            if start_edit.lost_focus() || end_edit.lost_focus() {
                self.session
                    .edit_trim_text(&self.trim_start_input, &self.trim_end_input);
            }
            if !start_edit.has_focus() {
                self.trim_start_input = self.session.trim().start_text().to_string();
            }
            if !end_edit.has_focus() {
                self.trim_end_input = self.session.trim().end_text().to_string();
            }
        });

        let trim = self.session.trim();
        ui.label(format!(
            "Selected {:.0}% of the track, from {:.0}%",
            trim.fill_width(),
            trim.fill_left()
        ));
    }

    fn preview_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Preview");
        ui.separator();
        let Some(meta) = self.session.metadata() else {
            ui.label("Nothing loaded yet");
            return;
        };

        if let Some((_, tex)) = &self.thumbnail {
            ui.add(egui::Image::new(tex).max_width(ui.available_width()));
        }
        ui.strong(&meta.title);
        for row in meta.detail_rows() {
            ui.label(row);
        }

        if let Some(entries) = meta.entries.as_ref().filter(|_| meta.is_playlist) {
            egui::ScrollArea::vertical()
                .id_source("playlist_entries")
                .show(ui, |ui| {
                    for (i, entry) in entries.iter().enumerate() {
                        ui.label(entry.describe(i + 1));
                    }
                });
        }
    }

    fn log_ui(&mut self, ui: &mut egui::Ui) {
        ui.label("Activity");
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in self.session.log().lines() {
                    ui.monospace(line);
                }
            });
    }

    fn setup_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("First-time setup");
        ui.label("The backend needs its download tools before anything can be fetched.");

        match self.setup.phase().clone() {
            SetupPhase::Installing { percent, status } => {
                ui.add(egui::ProgressBar::new(percent / 100.0).show_percentage());
                ui.label(status);
            }
            SetupPhase::Failed(message) => {
                ui.colored_label(Color32::LIGHT_RED, message);
                if ui.button("Retry install").clicked() && self.setup.begin_install() {
                    self.runner.install();
                }
            }
            _ => {
                if ui.button("Install").clicked() && self.setup.begin_install() {
                    self.runner.install();
                }
            }
        }

        egui::ScrollArea::vertical()
            .id_source("install_log")
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in self.setup.install_log() {
                    ui.monospace(line);
                }
            });
    }

    fn confirm_window(&mut self, ctx: &egui::Context) {
        if self.session.state() != SessionState::ConfirmPending {
            return;
        }
        let count = self.session.metadata().map_or(0, |m| m.entries_count);
        let mut choice = None;
        let mut open = true;
        egui::Window::new("Playlist detected")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!("This link is a playlist with {count} videos."));
                ui.horizontal(|ui| {
                    if ui.button("Download playlist").clicked() {
                        choice = Some(DownloadKind::Playlist);
                    }
                    if ui.button("Only this video").clicked() {
                        choice = Some(DownloadKind::Single);
                    }
                });
            });

        if let Some(kind) = choice {
            let result = self.session.confirm_download(kind);
            self.report(result);
        } else if !open {
            self.session.dismiss_confirm();
        }
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.notice.clone() else {
            return;
        };
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.notice = None;
                }
            });
    }

    fn debug_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_debug;
        egui::Window::new("Debug").open(&mut open).show(ctx, |ui| {
            match self.session.diagnostics().read() {
                Some(last) => {
                    ui.label(format!("Last error ({}):", last.timestamp.format("%Y-%m-%d %H:%M:%S")));
                    ui.colored_label(Color32::LIGHT_RED, &last.message);
                }
                None => {
                    ui.label("No errors recorded");
                }
            }
            ui.separator();

            if ui.button("Refresh system info").clicked() {
                self.runner.debug_report();
            }
            if let Some(report) = self.setup.debug_report() {
                egui::Grid::new("debug_report").striped(true).show(ui, |ui| {
                    for (key, value) in report.system.iter().chain(&report.dependencies) {
                        ui.label(key);
                        ui.monospace(value.to_string());
                        ui.end_row();
                    }
                });
            }
            ui.separator();

            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.debug_url_input);
                let idle = !self.setup.debug_pending();
                if ui.add_enabled(idle, egui::Button::new("Test URL")).clicked()
                    && self.setup.begin_debug_test()
                {
                    self.runner.debug_test(self.debug_url_input.trim().to_string());
                }
            });
            if let Some(test) = self.setup.debug_test() {
                let color = if test.success { Color32::LIGHT_GREEN } else { Color32::LIGHT_RED };
                ui.colored_label(color, &test.message);
                if let Some(title) = &test.title {
                    ui.label(title);
                }
            }
        });
        self.show_debug = open;
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for AuraApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply everything background tasks reported since the last frame
        self.drain_events();

        // 2️⃣ Handle completed thumbnail fetches
        self.poll_thumbnails(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| self.header_ui(ui));
        egui::TopBottomPanel::bottom("activity_log")
            .resizable(true)
            .min_height(120.0)
            .show(ctx, |ui| self.log_ui(ui));
        egui::SidePanel::right("preview_panel")
            .min_width(260.0)
            .show(ctx, |ui| self.preview_ui(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.setup.needs_install() {
                self.setup_ui(ui);
            } else {
                self.controls_ui(ui);
            }
        });

        self.confirm_window(ctx);
        self.notice_window(ctx);
        if self.show_debug {
            self.debug_window(ctx);
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

/// `v<version>` from the embedded version file
fn version_label() -> String {
    let version = Asset::get("version.txt")
        .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| FALLBACK_VERSION.to_string());
    format!("v{version}")
}
