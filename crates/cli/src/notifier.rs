//! Desktop notifications through `notify-send`

use engine::{LogNotifier, Notifier};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warning,
}

/// Notifier that pops up a desktop notification and logs it
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
    program: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            program: "notify-send".to_string(),
        }
    }

    fn args(&self, level: Level, title: &str, message: &str) -> Vec<String> {
        let (urgency, category) = match level {
            Level::Info => ("normal", "Info"),
            Level::Warning => ("critical", "Warning"),
        };
        vec![
            format!("--urgency={}", urgency),
            format!("--app-name={}", self.app_name),
            format!("--category={}", category),
            title.to_string(),
            message.to_string(),
        ]
    }

    fn send(&self, level: Level, title: &str, message: &str) {
        match level {
            Level::Info => LogNotifier.info(title, message),
            Level::Warning => LogNotifier.warning(title, message),
        }

        let result = Command::new(&self.program)
            .args(self.args(level, title, message))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match result {
            Ok(output) if output.status.success() => debug!(title, "Desktop notification sent"),
            Ok(output) => warn!(
                title,
                "{} failed ({}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!(title, "Could not run {}: {}", self.program, e),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn info(&self, title: &str, message: &str) {
        self.send(Level::Info, title, message);
    }

    fn warning(&self, title: &str, message: &str) {
        self.send(Level::Warning, title, message);
    }
}

/// Notifier selected by the `[notify]` settings
pub fn build(desktop: bool, app_name: &str) -> Arc<dyn Notifier> {
    if desktop {
        Arc::new(DesktopNotifier::new(app_name))
    } else {
        Arc::new(LogNotifier)
    }
}
