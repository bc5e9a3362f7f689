// SPDX-License-Identifier: GPL-3.0-only

//! Launcher screen: a single Scan control

use crate::app::state::ScreenKind;

#[derive(Debug, Default)]
pub struct LauncherScreen {
    /// Shown under the Scan control, e.g. why the scanner could not open
    notice: Option<String>,
}

impl LauncherScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label of the only control
    pub fn action_label(&self) -> &'static str {
        "Scan"
    }

    /// Activate the Scan control
    pub fn activate(&mut self) -> ScreenKind {
        self.notice = None;
        ScreenKind::Scanner
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_always_goes_to_scanner() {
        let mut launcher = LauncherScreen::new();
        launcher.set_notice("camera busy");
        assert_eq!(launcher.activate(), ScreenKind::Scanner);
        assert_eq!(launcher.notice(), None);
        assert_eq!(launcher.activate(), ScreenKind::Scanner);
    }
}
