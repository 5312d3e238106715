//! The onboarding steps and the rules for leaving each one.
use crate::config::ConfigStore;
use crate::layout::Layout;
use crate::schema::{ConfigKey, FONT_SELECTION_CUSTOM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Welcome,
    Firmware,
    Iso,
    Font,
    Driver,
    Settings,
}

impl Step {
    pub fn id(self) -> &'static str {
        match self {
            Step::Welcome => "welcome",
            Step::Firmware => "firmware",
            Step::Iso => "iso",
            Step::Font => "font",
            Step::Driver => "driver",
            Step::Settings => "settings",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Welcome => "Welcome",
            Step::Firmware => "Firmware",
            Step::Iso => "Game directory",
            Step::Font => "Font",
            Step::Driver => "GPU driver",
            Step::Settings => "Settings",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Step::Welcome => "Let's get the emulator ready. This takes a minute.",
            Step::Firmware => "Install the console firmware (PS3UPDAT.PUP). It is required.",
            Step::Iso => "Choose the directory your games are stored in. You can skip this.",
            Step::Font => "Use the built-in font or pick a custom .ttf, .ttc or .otf file.",
            Step::Driver => "Optionally use a custom Vulkan driver (.zip or .so).",
            Step::Settings => "Hardware-specific fixes have been applied. Finish to save.",
        }
    }
}

/// The ordered steps and the current position.
#[derive(Debug, Clone)]
pub struct Wizard {
    steps: Vec<Step>,
    position: usize,
}

impl Wizard {
    pub fn new(supports_custom_driver: bool) -> Self {
        let steps = [
            Step::Welcome,
            Step::Firmware,
            Step::Iso,
            Step::Font,
            Step::Driver,
            Step::Settings,
        ]
        .into_iter()
        .filter(|step| supports_custom_driver || *step != Step::Driver)
        .collect();
        Self { steps, position: 0 }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn current(&self) -> Step {
        self.steps[self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 == self.steps.len()
    }

    /// Moves forward. Returns `false` on the last step.
    pub fn advance(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.position += 1;
        true
    }

    /// Moves back. Returns `false` on the first step.
    pub fn back(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.position -= 1;
        true
    }
}

/// Whether the user may leave `step` going forward. Without a store only the
/// steps that do not read configuration can be left.
pub fn next_enabled(step: Step, config: Option<&ConfigStore>, layout: &Layout) -> bool {
    match step {
        Step::Welcome | Step::Iso | Step::Settings => true,
        Step::Firmware => layout.firmware_installed(),
        Step::Font => config.is_none_or(|config| {
            let custom = config
                .get(ConfigKey::FontFileSelection)
                .is_ok_and(|s| s == FONT_SELECTION_CUSTOM);
            !custom || !is_blank(config, ConfigKey::CustomFontFilePath)
        }),
        Step::Driver => config.is_none_or(|config| {
            let enabled = config.get_bool(ConfigKey::UseCustomDriver).unwrap_or(false);
            !enabled || !is_blank(config, ConfigKey::CustomDriverLibraryPath)
        }),
    }
}

fn is_blank(config: &ConfigStore, key: ConfigKey) -> bool {
    config.get(key).map_or(true, |v| v.trim().is_empty())
}
