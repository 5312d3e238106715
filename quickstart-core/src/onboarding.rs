//! The first-run controller.
//!
//! [`Onboarding`] owns the session's config store and the wizard. Front-ends
//! feed it [`Command`]s and drive its [`EventLoop`]; every background install
//! comes back through a task callback on the interactive thread, which is the
//! only place the store is touched.
use crate::assets::{list_installed_drivers, list_installed_fonts};
use crate::bootstrap::{self, BootstrapGate, GatedScreen, NativeRuntime, WaitIndicator};
use crate::config::{ConfigError, ConfigStore, DEFAULT_TEMPLATE};
use crate::event_loop::{EventLoop, Token};
use crate::install::{AssetInstaller, DriverPackage, FirmwareInstaller, is_font_file};
use crate::layout::Layout;
use crate::probe::HardwareProbe;
use crate::revision::Revision;
use crate::schema::{ConfigKey, FONT_SELECTION_BUILTIN, FONT_SELECTION_CUSTOM};
use crate::task::TaskFailure;
use crate::tuning;
use crate::wizard::{self, Step, Wizard};
use anyhow::{Context, bail};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a user can ask the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InstallFirmware(PathBuf),
    SelectIsoDir(PathBuf),
    SelectFont(PathBuf),
    SelectDriver(PathBuf),
    SetFontSelection(String),
    SetCustomDriver(bool),
    UseInstalledFont(String),
    UseInstalledDriver(String),
    Next,
    Prev,
    Finish,
    Quit,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the native runtime.
    Booting,
    Active,
    /// No Vulkan device. Only [`Command::Quit`] is accepted.
    Unsupported,
    /// Setup is complete and the main application takes over.
    HandedOff,
    Quit,
}

/// Transient messages for the user.
pub trait Notices {
    fn notice(&mut self, message: &str);
}

pub struct Onboarding {
    layout: Layout,
    probe: Arc<dyn HardwareProbe>,
    firmware: Arc<dyn FirmwareInstaller>,
    assets: Arc<dyn AssetInstaller>,
    notices: Box<dyn Notices>,
    template: String,
    reentry: bool,
    gate: BootstrapGate,
    phase: Phase,
    store: Option<ConfigStore>,
    wizard: Wizard,
    revision: Revision,
    tasks: Vec<Token>,
    tuned: bool,
}

impl Onboarding {
    pub fn new(
        layout: Layout,
        probe: Arc<dyn HardwareProbe>,
        firmware: Arc<dyn FirmwareInstaller>,
        assets: Arc<dyn AssetInstaller>,
        notices: Box<dyn Notices>,
    ) -> Self {
        let wizard = Wizard::new(probe.supports_custom_driver());
        Self {
            layout,
            probe,
            firmware,
            assets,
            notices,
            template: DEFAULT_TEMPLATE.to_string(),
            reentry: false,
            gate: BootstrapGate::default(),
            phase: Phase::Booting,
            store: None,
            wizard,
            revision: Revision::new(),
            tasks: Vec::new(),
            tuned: false,
        }
    }

    /// Forces onboarding even when a default configuration exists.
    pub fn with_reentry(mut self, reentry: bool) -> Self {
        self.reentry = reentry;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_gate(mut self, gate: BootstrapGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn step(&self) -> Step {
        self.wizard.current()
    }

    /// The open store, or `None` before creation, after hand-off, or when the
    /// template could not be parsed.
    pub fn store(&self) -> Option<&ConfigStore> {
        self.store.as_ref()
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn next_enabled(&self) -> bool {
        wizard::next_enabled(self.step(), self.store.as_ref(), &self.layout)
    }

    pub fn installed_fonts(&self) -> Vec<String> {
        list_installed_fonts(&self.layout.font_dir())
    }

    pub fn installed_drivers(&self) -> Vec<String> {
        list_installed_drivers(&self.layout.driver_dir())
    }

    pub fn iso_dir(&self) -> Option<PathBuf> {
        self.layout.load_iso_dir()
    }

    /// Reads a typed entry, or its default when there is no store.
    pub fn entry(&self, key: ConfigKey) -> String {
        self.store
            .as_ref()
            .and_then(|store| store.get(key).ok())
            .unwrap_or_else(|| key.default_value().to_string())
    }

    /// Enters the bootstrap gate. The screen is created now or once the
    /// runtime has loaded.
    pub fn start(
        &mut self,
        event_loop: &mut EventLoop<Self>,
        runtime: Arc<dyn NativeRuntime>,
        indicator: Box<dyn WaitIndicator>,
    ) {
        bootstrap::enter(self, event_loop, runtime, indicator, "Loading the native runtime...");
    }

    /// Handles one command and returns the resulting phase.
    pub fn handle(&mut self, command: Command, event_loop: &mut EventLoop<Self>) -> Phase {
        tracing::debug!(?command, phase = ?self.phase, "handling command");
        match (self.phase, command) {
            (Phase::HandedOff | Phase::Quit, _) => {}
            (Phase::Active, command) => self.dispatch(command, event_loop),
            (_, Command::Quit) => self.quit(event_loop),
            (phase, command) => tracing::debug!(?phase, ?command, "command ignored"),
        }
        self.phase
    }

    fn quit(&mut self, event_loop: &mut EventLoop<Self>) {
        self.teardown(event_loop);
        self.phase = Phase::Quit;
    }

    /// Cancels every pending completion and drops the store unpersisted.
    pub fn teardown(&mut self, event_loop: &mut EventLoop<Self>) {
        self.gate.teardown(event_loop);
        for token in self.tasks.drain(..) {
            event_loop.cancel(token);
        }
        if self.store.take().is_some() {
            tracing::info!("onboarding torn down; configuration not saved");
        }
    }

    fn dispatch(&mut self, command: Command, event_loop: &mut EventLoop<Self>) {
        match command {
            Command::InstallFirmware(path) => self.install_firmware(path, event_loop),
            Command::SelectIsoDir(path) => self.select_iso_dir(&path),
            Command::SelectFont(path) => self.select_font(path, event_loop),
            Command::SelectDriver(path) => self.select_driver(path, event_loop),
            Command::SetFontSelection(value) => {
                if value != FONT_SELECTION_BUILTIN && value != FONT_SELECTION_CUSTOM {
                    self.notify(&format!("Unknown font selection: {value}"));
                    return;
                }
                self.update_config(|store| store.set(ConfigKey::FontFileSelection, &value));
            }
            Command::SetCustomDriver(enabled) => {
                self.update_config(|store| store.set_bool(ConfigKey::UseCustomDriver, enabled));
            }
            Command::UseInstalledFont(name) => {
                let path = self.layout.font_dir().join(&name);
                if !path.is_file() {
                    self.notify(&format!("Font {name} is not installed"));
                    return;
                }
                self.on_font_installed(path);
            }
            Command::UseInstalledDriver(name) => {
                let path = self.layout.driver_dir().join(&name);
                if !path.is_file() {
                    self.notify(&format!("Driver {name} is not installed"));
                    return;
                }
                self.on_driver_installed(path);
            }
            Command::Next => self.next(event_loop),
            Command::Prev => {
                if self.wizard.back() {
                    self.revision.bump();
                }
            }
            Command::Finish => {
                if !self.wizard.is_last() {
                    self.notify("Finish the remaining steps first");
                    return;
                }
                self.finish(event_loop);
            }
            Command::Refresh => {
                self.revision.bump();
            }
            Command::Quit => self.quit(event_loop),
        }
    }

    fn next(&mut self, event_loop: &mut EventLoop<Self>) {
        if !self.next_enabled() {
            self.notify(&format!("Complete the {} step first", self.step().title()));
            return;
        }
        if self.wizard.is_last() {
            self.finish(event_loop);
            return;
        }
        self.wizard.advance();
        if self.step() == Step::Settings {
            self.tune_once();
        }
        self.revision.bump();
    }

    fn tune_once(&mut self) {
        if self.tuned {
            return;
        }
        self.tuned = true;
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match tuning::auto_tune(store, self.probe.as_ref()) {
            Ok(overrides) if overrides.is_empty() => {
                tracing::info!("no hardware overrides needed");
            }
            Ok(overrides) => {
                tracing::debug!(count = overrides.len(), "hardware overrides applied");
            }
            Err(e) => tracing::warn!(error = %e, "failed to apply hardware overrides"),
        }
    }

    fn finish(&mut self, event_loop: &mut EventLoop<Self>) {
        self.prune_tasks(event_loop);
        if !self.tasks.is_empty() {
            self.notify("Wait for the running installation to finish");
            return;
        }

        let Some(store) = self.store.as_mut() else {
            tracing::warn!("no configuration to save; handing off with defaults");
            self.phase = Phase::HandedOff;
            return;
        };
        // A failed close leaves the store open for another attempt.
        let text = match store.close() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize configuration");
                self.notify(&format!("Failed to save configuration: {e}"));
                return;
            }
        };
        self.store = None;

        match self.layout.write_default_config(&text) {
            Ok(()) => {
                let path = self.layout.default_config_file();
                tracing::info!(path = %path.display(), "configuration saved");
                self.phase = Phase::HandedOff;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to persist configuration");
                self.notify(&format!("Failed to save configuration: {e}"));
                // The closed store is gone; a fresh one keeps the user's edits.
                self.store = ConfigStore::open_from_string(&text).ok();
            }
        }
        self.revision.bump();
    }

    fn install_firmware(&mut self, path: PathBuf, event_loop: &mut EventLoop<Self>) {
        let installer = Arc::clone(&self.firmware);
        let marker = self.layout.firmware_installed_file();
        self.track(
            event_loop,
            "Installing firmware...",
            move || {
                let source = File::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                if !installer.install_firmware(source) {
                    bail!("could not install {}", path.display());
                }
                Ok(())
            },
            move |screen: &mut Self, ()| {
                if let Err(e) = create_marker(&marker) {
                    tracing::error!(
                        path = %marker.display(),
                        error = %e,
                        "failed to mark firmware installed"
                    );
                    screen.notify(&format!("Failed to record firmware installation: {e}"));
                }
                screen.revision.bump();
            },
            |screen: &mut Self, failure| {
                screen.notify(&format!("Failed to install firmware: {failure}"));
                screen.revision.bump();
            },
        );
    }

    fn select_iso_dir(&mut self, path: &Path) {
        if !path.is_dir() {
            self.notify(&format!("{} is not a directory", path.display()));
            return;
        }
        match self.layout.save_iso_dir(path) {
            Ok(()) => tracing::info!(path = %path.display(), "game directory selected"),
            Err(e) => self.notify(&format!("Failed to save game directory: {e}")),
        }
        self.revision.bump();
    }

    fn select_font(&mut self, path: PathBuf, event_loop: &mut EventLoop<Self>) {
        if !is_font_file(&path) {
            self.notify("Select a .ttf, .ttc or .otf font file");
            return;
        }
        let installer = Arc::clone(&self.assets);
        self.track(
            event_loop,
            "Installing font...",
            move || installer.install_custom_font(&path),
            |screen: &mut Self, installed| screen.on_font_installed(installed),
            |screen: &mut Self, failure| {
                screen.notify(&format!("Failed to install font: {failure}"));
                screen.revision.bump();
            },
        );
    }

    fn select_driver(&mut self, path: PathBuf, event_loop: &mut EventLoop<Self>) {
        let Some(package) = DriverPackage::detect(&path) else {
            self.notify("Select a .zip or .so driver file");
            return;
        };
        let installer = Arc::clone(&self.assets);
        self.track(
            event_loop,
            "Installing driver...",
            move || match package {
                DriverPackage::Zip => installer.install_custom_driver_from_zip(&path),
                DriverPackage::Library => installer.install_custom_driver_from_lib(&path),
            },
            |screen: &mut Self, installed| screen.on_driver_installed(installed),
            |screen: &mut Self, failure| {
                screen.notify(&format!("Failed to install driver: {failure}"));
                screen.revision.bump();
            },
        );
    }

    fn on_font_installed(&mut self, path: PathBuf) {
        let value = path.to_string_lossy().into_owned();
        self.update_config(|store| {
            store.set(ConfigKey::FontFileSelection, FONT_SELECTION_CUSTOM)?;
            store.set(ConfigKey::CustomFontFilePath, &value)
        });
    }

    fn on_driver_installed(&mut self, path: PathBuf) {
        let value = path.to_string_lossy().into_owned();
        self.update_config(|store| {
            store.set_bool(ConfigKey::UseCustomDriver, true)?;
            store.set(ConfigKey::CustomDriverLibraryPath, &value)
        });
    }

    fn track<T, W, D>(
        &mut self,
        event_loop: &mut EventLoop<Self>,
        message: &str,
        work: W,
        on_done: D,
        on_failed: impl FnOnce(&mut Self, TaskFailure) + 'static,
    ) where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
        D: FnOnce(&mut Self, T) + 'static,
    {
        self.prune_tasks(event_loop);
        let token = event_loop.run_task(Some(message), work, on_done, on_failed);
        self.tasks.push(token);
    }

    fn prune_tasks(&mut self, event_loop: &EventLoop<Self>) {
        self.tasks.retain(|token| event_loop.is_pending(*token));
    }

    fn update_config(&mut self, update: impl FnOnce(&mut ConfigStore) -> Result<(), ConfigError>) {
        let Some(store) = self.store.as_mut() else {
            tracing::debug!("no open configuration; change not recorded");
            return;
        };
        if let Err(e) = update(store) {
            tracing::warn!(error = %e, "failed to update configuration");
            self.notify(&format!("Failed to update configuration: {e}"));
        }
        self.revision.bump();
    }

    fn notify(&mut self, message: &str) {
        self.notices.notice(message);
    }
}

impl GatedScreen for Onboarding {
    fn gate(&mut self) -> &mut BootstrapGate {
        &mut self.gate
    }

    fn on_create(&mut self) {
        if let Some(error) = self.gate.load_error().map(str::to_string) {
            self.notify(&format!("Failed to load the native runtime: {error}"));
        }

        if !self.layout.onboarding_required(self.reentry) {
            tracing::info!("default configuration present; skipping onboarding");
            self.phase = Phase::HandedOff;
            return;
        }
        if let Err(e) = self.layout.mk_dirs() {
            tracing::warn!(
                root = %self.layout.root().display(),
                error = %e,
                "failed to create data directories"
            );
        }
        if self.probe.gpu_names().is_empty() {
            tracing::warn!("no Vulkan device found");
            self.phase = Phase::Unsupported;
            self.revision.bump();
            return;
        }

        match ConfigStore::open_from_string(&self.template) {
            Ok(store) => self.store = Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse configuration template");
                self.notify(&format!(
                    "Configuration template is invalid; defaults will be used: {e}"
                ));
            }
        }
        self.phase = Phase::Active;
        self.revision.bump();
    }
}

fn create_marker(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path).map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;
    use crate::task::NoProgress;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingNotices(Rc<RefCell<Vec<String>>>);

    impl Notices for RecordingNotices {
        fn notice(&mut self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    struct FakeFirmware {
        accept: bool,
        calls: AtomicUsize,
        release: Option<Mutex<mpsc::Receiver<()>>>,
    }

    impl FakeFirmware {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                calls: AtomicUsize::new(0),
                release: None,
            }
        }
    }

    impl FirmwareInstaller for FakeFirmware {
        fn install_firmware(&self, _source: File) -> bool {
            if let Some(release) = &self.release {
                release.lock().unwrap().recv().ok();
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept
        }
    }

    /// Hands back a path under the fake data root without touching the source.
    struct FakeAssets {
        root: PathBuf,
    }

    impl AssetInstaller for FakeAssets {
        fn install_custom_font(&self, source: &Path) -> anyhow::Result<PathBuf> {
            Ok(self.root.join("fonts").join(source.file_name().unwrap()))
        }
        fn install_custom_driver_from_zip(&self, _source: &Path) -> anyhow::Result<PathBuf> {
            Err(anyhow!("archive is corrupt"))
        }
        fn install_custom_driver_from_lib(&self, source: &Path) -> anyhow::Result<PathBuf> {
            Ok(self.root.join("drivers").join(source.file_name().unwrap()))
        }
    }

    struct Runtime {
        delay: bool,
        release: Option<Mutex<mpsc::Receiver<()>>>,
    }

    impl NativeRuntime for Runtime {
        fn should_delay_load(&self) -> bool {
            self.delay
        }
        fn load_library(&self) -> anyhow::Result<()> {
            if let Some(release) = &self.release {
                release.lock().unwrap().recv().ok();
            }
            Ok(())
        }
    }

    struct NoIndicator;

    impl WaitIndicator for NoIndicator {
        fn show(&mut self, _message: &str) {}
        fn dismiss(&mut self) {}
    }

    struct Harness {
        dir: tempfile::TempDir,
        screen: Onboarding,
        event_loop: EventLoop<Onboarding>,
        notices: Rc<RefCell<Vec<String>>>,
        firmware: Arc<FakeFirmware>,
    }

    impl Harness {
        fn new(probe: StaticProbe, firmware: FakeFirmware) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let notices = RecordingNotices::default();
            let recorded = Rc::clone(&notices.0);
            let firmware = Arc::new(firmware);
            let screen = Onboarding::new(
                Layout::new(dir.path()),
                Arc::new(probe),
                firmware.clone(),
                Arc::new(FakeAssets {
                    root: dir.path().to_path_buf(),
                }),
                Box::new(notices),
            )
            .with_gate(BootstrapGate::new(Duration::from_millis(1), Duration::from_millis(1)));
            Self {
                dir,
                screen,
                event_loop: EventLoop::new(NoProgress),
                notices: recorded,
                firmware,
            }
        }

        fn map(self, configure: impl FnOnce(Onboarding) -> Onboarding) -> Self {
            Self {
                screen: configure(self.screen),
                ..self
            }
        }

        fn adreno() -> Self {
            Self::new(
                StaticProbe::new(vec!["Adreno (TM) 7 Series".into()], vec!["cortex-a710".into()]),
                FakeFirmware::new(true),
            )
        }

        fn start(&mut self) {
            let runtime = Arc::new(Runtime {
                delay: false,
                release: None,
            });
            self.screen.start(&mut self.event_loop, runtime, Box::new(NoIndicator));
        }

        fn handle(&mut self, command: Command) -> Phase {
            self.screen.handle(command, &mut self.event_loop)
        }

        fn handle_and_wait(&mut self, command: Command) -> Phase {
            self.handle(command);
            self.event_loop.run_until_idle(&mut self.screen);
            self.screen.phase()
        }

        fn firmware_source(&self) -> PathBuf {
            let path = self.dir.path().join("PS3UPDAT.PUP");
            fs::write(&path, b"SCEUF").unwrap();
            path
        }

        fn notices(&self) -> Vec<String> {
            self.notices.borrow().clone()
        }
    }

    #[test]
    fn existing_config_skips_onboarding_unless_reentering() {
        let mut h = Harness::adreno();
        h.screen.layout().write_default_config("Core: {}\n").unwrap();
        h.start();
        assert_eq!(h.screen.phase(), Phase::HandedOff);

        let mut h2 = Harness::adreno().map(|screen| screen.with_reentry(true));
        h2.screen.layout().write_default_config("Core: {}\n").unwrap();
        h2.start();
        assert_eq!(h2.screen.phase(), Phase::Active);
        assert!(h2.screen.store().is_some());
    }

    #[test]
    fn no_gpu_means_unsupported_and_only_quit_works() {
        let mut h = Harness::new(
            StaticProbe::new(vec![], vec!["cortex-a78".into()]),
            FakeFirmware::new(true),
        );
        h.start();
        assert_eq!(h.screen.phase(), Phase::Unsupported);

        assert_eq!(h.handle(Command::Next), Phase::Unsupported);
        assert_eq!(h.handle(Command::Finish), Phase::Unsupported);
        assert_eq!(h.handle(Command::Quit), Phase::Quit);
        assert!(!h.screen.layout().default_config_file().exists());
    }

    #[test]
    fn firmware_install_unlocks_the_firmware_step() {
        let mut h = Harness::adreno();
        h.start();
        h.handle(Command::Next);
        assert_eq!(h.screen.step(), Step::Firmware);
        assert!(!h.screen.next_enabled());

        let source = h.firmware_source();
        h.handle_and_wait(Command::InstallFirmware(source));

        assert_eq!(h.firmware.calls.load(Ordering::SeqCst), 1);
        assert!(h.screen.layout().firmware_installed());
        assert!(h.screen.next_enabled());
        assert!(h.notices().is_empty());
    }

    #[test]
    fn failed_firmware_install_leaves_no_marker() {
        let mut h = Harness::new(
            StaticProbe::new(vec!["Mali-G710".into()], vec![]),
            FakeFirmware::new(false),
        );
        h.start();
        let source = h.firmware_source();
        h.handle_and_wait(Command::InstallFirmware(source));

        assert!(!h.screen.layout().firmware_installed());
        assert_eq!(h.notices().len(), 1);
        assert!(h.notices()[0].starts_with("Failed to install firmware"));
    }

    #[test]
    fn failed_reinstall_keeps_the_firmware_step_unlocked() {
        let mut h = Harness::new(
            StaticProbe::new(vec!["Mali-G710".into()], vec![]),
            FakeFirmware::new(false),
        );
        h.start();
        fs::write(h.screen.layout().firmware_installed_file(), b"").unwrap();
        h.handle(Command::Next);
        assert_eq!(h.screen.step(), Step::Firmware);

        let source = h.firmware_source();
        h.handle_and_wait(Command::InstallFirmware(source));

        assert_eq!(h.firmware.calls.load(Ordering::SeqCst), 1);
        assert!(h.notices()[0].starts_with("Failed to install firmware"));
        assert!(h.screen.layout().firmware_installed());
        assert!(h.screen.next_enabled());
    }

    #[test]
    fn unopenable_firmware_never_reaches_the_installer() {
        let mut h = Harness::adreno();
        h.start();
        let missing = h.dir.path().join("missing.pup");
        h.handle_and_wait(Command::InstallFirmware(missing));

        assert_eq!(h.firmware.calls.load(Ordering::SeqCst), 0);
        assert!(!h.screen.layout().firmware_installed());
        assert_eq!(h.notices().len(), 1);
    }

    #[test]
    fn fonts_and_drivers_update_the_store() {
        let mut h = Harness::adreno();
        h.start();

        h.handle_and_wait(Command::SelectFont(PathBuf::from("/sdcard/readme.txt")));
        assert_eq!(h.notices().len(), 1);
        assert_eq!(h.screen.entry(ConfigKey::FontFileSelection), FONT_SELECTION_BUILTIN);

        h.handle_and_wait(Command::SelectFont(PathBuf::from("/sdcard/NotoSans.ttf")));
        assert_eq!(h.screen.entry(ConfigKey::FontFileSelection), FONT_SELECTION_CUSTOM);
        assert!(h.screen.entry(ConfigKey::CustomFontFilePath).ends_with("fonts/NotoSans.ttf"));

        h.handle_and_wait(Command::SelectDriver(PathBuf::from("/sdcard/turnip.zip")));
        assert_eq!(h.notices().len(), 2);
        assert_eq!(h.screen.entry(ConfigKey::UseCustomDriver), "false");

        h.handle_and_wait(Command::SelectDriver(PathBuf::from("/sdcard/libvulkan.so")));
        assert_eq!(h.screen.entry(ConfigKey::UseCustomDriver), "true");
        assert!(
            h.screen
                .entry(ConfigKey::CustomDriverLibraryPath)
                .ends_with("drivers/libvulkan.so")
        );
    }

    #[test]
    fn step_gating_follows_the_config() {
        let mut h = Harness::adreno();
        h.start();
        fs::write(h.screen.layout().firmware_installed_file(), b"").unwrap();
        for _ in 0..3 {
            h.handle(Command::Next);
        }
        assert_eq!(h.screen.step(), Step::Font);

        h.handle(Command::SetFontSelection(FONT_SELECTION_CUSTOM.into()));
        assert!(!h.screen.next_enabled());
        h.handle(Command::Next);
        assert_eq!(h.screen.step(), Step::Font);

        h.handle(Command::SetFontSelection(FONT_SELECTION_BUILTIN.into()));
        h.handle(Command::Next);
        assert_eq!(h.screen.step(), Step::Driver);

        h.handle(Command::SetCustomDriver(true));
        assert!(!h.screen.next_enabled());
        h.handle(Command::SetCustomDriver(false));
        h.handle(Command::Next);
        assert_eq!(h.screen.step(), Step::Settings);
    }

    #[test]
    fn reaching_settings_tunes_once_and_finish_persists() {
        let mut h = Harness::adreno();
        h.start();
        fs::write(h.screen.layout().firmware_installed_file(), b"").unwrap();
        while h.screen.step() != Step::Settings {
            h.handle(Command::Next);
        }
        assert_eq!(h.screen.entry(ConfigKey::UseBgraFormat), "false");
        assert_eq!(h.screen.entry(ConfigKey::TextureUploadMode), "CPU");
        assert_eq!(h.screen.entry(ConfigKey::UseLlvmCpu), "cortex-x1");

        // Going back and forth must not reapply over user edits.
        h.handle(Command::Prev);
        h.screen
            .store
            .as_mut()
            .unwrap()
            .set(ConfigKey::TextureUploadMode, "Auto")
            .unwrap();
        h.handle(Command::Next);
        assert_eq!(h.screen.entry(ConfigKey::TextureUploadMode), "Auto");

        assert_eq!(h.handle(Command::Next), Phase::HandedOff);
        assert!(h.screen.store().is_none());
        let text = h.screen.layout().read_default_config().unwrap();
        let saved = ConfigStore::open_from_string(&text).unwrap();
        assert_eq!(saved.get(ConfigKey::UseLlvmCpu).unwrap(), "cortex-x1");
        assert!(!saved.get_bool(ConfigKey::UseBgraFormat).unwrap());
    }

    #[test]
    fn persistence_failure_keeps_onboarding_open() {
        let mut h = Harness::adreno();
        h.start();
        fs::write(h.screen.layout().firmware_installed_file(), b"").unwrap();
        while !h.screen.wizard().is_last() {
            h.handle(Command::Next);
        }
        fs::create_dir_all(h.screen.layout().default_config_file()).unwrap();

        assert_eq!(h.handle(Command::Finish), Phase::Active);
        assert_eq!(h.notices().len(), 1);
        assert_eq!(h.screen.entry(ConfigKey::UseLlvmCpu), "cortex-x1");

        fs::remove_dir(h.screen.layout().default_config_file()).unwrap();
        assert_eq!(h.handle(Command::Finish), Phase::HandedOff);
        assert!(h.screen.layout().default_config_file().is_file());
    }

    #[test]
    fn invalid_template_hands_off_without_saving() {
        let mut h = Harness::adreno().map(|screen| screen.with_template(""));
        h.start();

        assert_eq!(h.screen.phase(), Phase::Active);
        assert!(h.screen.store().is_none());
        assert_eq!(h.notices().len(), 1);

        fs::write(h.screen.layout().firmware_installed_file(), b"").unwrap();
        while !h.screen.wizard().is_last() {
            h.handle(Command::Next);
        }
        assert_eq!(h.handle(Command::Finish), Phase::HandedOff);
        assert!(!h.screen.layout().default_config_file().exists());
    }

    #[test]
    fn bootstrap_waits_for_the_runtime() {
        let mut h = Harness::adreno();
        let runtime = Arc::new(Runtime {
            delay: true,
            release: None,
        });
        h.screen.start(&mut h.event_loop, runtime, Box::new(NoIndicator));
        assert_eq!(h.screen.phase(), Phase::Booting);
        assert_eq!(h.handle(Command::Next), Phase::Booting);

        h.event_loop.run_until_idle(&mut h.screen);
        assert_eq!(h.screen.phase(), Phase::Active);
    }

    #[test]
    fn quitting_while_booting_absorbs_the_completion() {
        let (release, gate) = mpsc::channel();
        let mut h = Harness::adreno();
        let runtime = Arc::new(Runtime {
            delay: true,
            release: Some(Mutex::new(gate)),
        });
        h.screen.start(&mut h.event_loop, runtime, Box::new(NoIndicator));

        assert_eq!(h.handle(Command::Quit), Phase::Quit);
        release.send(()).unwrap();
        assert!(h.event_loop.dispatch_timeout(&mut h.screen, Duration::from_secs(5)));

        assert_eq!(h.screen.phase(), Phase::Quit);
        assert!(h.screen.store().is_none());
    }

    #[test]
    fn quitting_mid_install_discards_the_result() {
        let (release, gate) = mpsc::channel();
        let mut firmware = FakeFirmware::new(true);
        firmware.release = Some(Mutex::new(gate));
        let mut h = Harness::new(
            StaticProbe::new(vec!["Mali-G710".into()], vec![]),
            firmware,
        );
        h.start();
        let source = h.firmware_source();
        h.handle(Command::InstallFirmware(source));

        assert_eq!(h.handle(Command::Quit), Phase::Quit);
        release.send(()).unwrap();
        assert!(h.event_loop.dispatch_timeout(&mut h.screen, Duration::from_secs(5)));

        assert!(!h.screen.layout().firmware_installed());
        assert_eq!(h.event_loop.pending(), 0);
    }
}
