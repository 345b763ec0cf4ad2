// Setup and debug surfaces.
// - Tracks whether the backend's toolchain is installed and drives the install stream.
// - Holds the last debug report / connectivity test for display.
// - Failures are handed back to the caller for the diagnostics slot.
use log::{debug, info};

use crate::{
    model::{DebugReport, DebugTestResult},
    progress::ProgressEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SetupPhase {
    Unknown,
    Checking,
    Installed,
    Missing,
    Installing { percent: f32, status: String },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    Checked(Result<bool, String>),
    Install(ProgressEvent),
    InstallFailed(String),
    InstallEnded,
    Browsed(Result<(), String>),
    DebugReport(Result<DebugReport, String>),
    DebugTest(Result<DebugTestResult, String>),
}

#[derive(Debug)]
pub struct SetupState {
    phase: SetupPhase,
    install_log: Vec<String>,
    debug_report: Option<DebugReport>,
    debug_test: Option<DebugTestResult>,
    debug_pending: bool,
}

impl Default for SetupState {
    fn default() -> Self {
        Self {
            phase: SetupPhase::Unknown,
            install_log: Vec::new(),
            debug_report: None,
            debug_test: None,
            debug_pending: false,
        }
    }
}

impl SetupState {
    pub fn phase(&self) -> &SetupPhase {
        &self.phase
    }

    pub fn install_log(&self) -> &[String] {
        &self.install_log
    }

    pub fn debug_report(&self) -> Option<&DebugReport> {
        self.debug_report.as_ref()
    }

    pub fn debug_test(&self) -> Option<&DebugTestResult> {
        self.debug_test.as_ref()
    }

    pub fn debug_pending(&self) -> bool {
        self.debug_pending
    }

    pub fn needs_install(&self) -> bool {
        matches!(
            self.phase,
            SetupPhase::Missing | SetupPhase::Installing { .. } | SetupPhase::Failed(_)
        )
    }

    pub fn begin_check(&mut self) {
        self.phase = SetupPhase::Checking;
    }

    /// Returns false if an install is already streaming.
    pub fn begin_install(&mut self) -> bool {
        if matches!(self.phase, SetupPhase::Installing { .. }) {
            return false;
        }
        self.install_log.clear();
        self.phase = SetupPhase::Installing {
            percent: 0.0,
            status: "Starting installer...".to_string(),
        };
        true
    }

    pub fn begin_debug_test(&mut self) -> bool {
        if self.debug_pending {
            return false;
        }
        self.debug_pending = true;
        self.debug_test = None;
        true
    }

    /// Applies one result. Returns a message for the diagnostics slot when something failed.
    pub fn handle(&mut self, event: SetupEvent) -> Option<String> {
        match event {
            SetupEvent::Checked(Ok(installed)) => {
                info!("Backend tools installed: {installed}");
                self.phase = if installed {
                    SetupPhase::Installed
                } else {
                    SetupPhase::Missing
                };
                None
            }
            SetupEvent::Checked(Err(message)) => {
                self.phase = SetupPhase::Unknown;
                Some(format!("Setup check failed: {message}"))
            }
            SetupEvent::Install(event) => self.on_install(event),
            SetupEvent::InstallFailed(message) => self.fail_install(message),
            SetupEvent::InstallEnded => match self.phase {
                SetupPhase::Installing { percent, .. } if percent >= 100.0 => {
                    self.phase = SetupPhase::Installed;
                    None
                }
                SetupPhase::Installing { .. } => {
                    self.fail_install("installer stopped before finishing".to_string())
                }
                _ => None,
            },
            SetupEvent::Browsed(result) => result.err().map(|m| format!("Browse failed: {m}")),
            SetupEvent::DebugReport(result) => match result {
                Ok(report) => {
                    self.debug_report = Some(report);
                    None
                }
                Err(message) => Some(format!("Debug info unavailable: {message}")),
            },
            SetupEvent::DebugTest(result) => {
                self.debug_pending = false;
                match result {
                    Ok(test) => {
                        let failure = (!test.success).then(|| {
                            format!(
                                "Debug test failed: {}",
                                test.error.as_deref().unwrap_or(test.message.as_str())
                            )
                        });
                        self.debug_test = Some(test);
                        failure
                    }
                    Err(message) => Some(format!("Debug test failed: {message}")),
                }
            }
        }
    }

    fn on_install(&mut self, event: ProgressEvent) -> Option<String> {
        if !matches!(self.phase, SetupPhase::Installing { .. }) {
            debug!("Install frame outside an install: {event:?}");
            return None;
        }
        match event {
            ProgressEvent::Install {
                percent,
                status,
                success,
            } => {
                self.install_log.push(status.clone());
                match success {
                    Some(true) => {
                        self.phase = SetupPhase::Installed;
                        None
                    }
                    Some(false) => self.fail_install(status),
                    None => {
                        self.phase = SetupPhase::Installing {
                            percent: percent.clamp(0.0, 100.0) as f32,
                            status,
                        };
                        None
                    }
                }
            }
            ProgressEvent::Log { log } => {
                self.install_log.push(log);
                None
            }
            ProgressEvent::Error { error } => self.fail_install(error),
            event if event.is_completed() => {
                self.phase = SetupPhase::Installed;
                None
            }
            ProgressEvent::Status { .. } => None,
        }
    }

    fn fail_install(&mut self, message: String) -> Option<String> {
        self.install_log.push(format!("Error: {message}"));
        self.phase = SetupPhase::Failed(message.clone());
        Some(format!("Install failed: {message}"))
    }
}
