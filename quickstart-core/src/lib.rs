//! The core, UI-agnostic library for the `quickstart` first-run setup.
//!
//! `quickstart-core` is designed to be used as a library by any front-end, whether
//! it's a command-line interface (like `quickstart`) or a graphical one. It owns
//! the session's configuration, runs installs on background threads, defers
//! screen construction until the native runtime is loaded, and tunes the
//! configuration for the detected hardware.
//!
//! The library is structured into several key modules:
//! - [`onboarding`]: The controller front-ends drive with [`onboarding::Command`]s.
//! - [`event_loop`] and [`task`]: The interactive thread's message channel and
//!   the background task runner built on it.
//! - [`bootstrap`]: The gate that delays construction until the runtime loads.
//! - [`config`] and [`schema`]: The YAML-backed config store and its typed keys.
//! - [`tuning`]: Hardware-driven overrides for a fresh configuration.
//! - [`probe`] and [`platform`]: GPU and CPU identification.
//! - [`firmware`] and [`assets`]: Default installers for firmware, fonts and drivers.
//! - [`layout`]: Where everything lives under the data directory.
//!
//! Front-ends own the [`event_loop::EventLoop`] and pump it on their main
//! thread. Completions only ever run there, so the controller needs no locks.
//!
//! ## Example: Running Onboarding Headless
//!
//! ```rust,no_run
//! use quickstart_core::assets::FsAssetInstaller;
//! use quickstart_core::bootstrap::{NativeRuntime, WaitIndicator};
//! use quickstart_core::event_loop::EventLoop;
//! use quickstart_core::firmware::FsFirmwareInstaller;
//! use quickstart_core::layout::Layout;
//! use quickstart_core::onboarding::{Command, Notices, Onboarding, Phase};
//! use quickstart_core::probe::SystemProbe;
//! use quickstart_core::task::NoProgress;
//! use std::sync::Arc;
//!
//! struct Loaded;
//! impl NativeRuntime for Loaded {
//!     fn should_delay_load(&self) -> bool { false }
//!     fn load_library(&self) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! struct Silent;
//! impl WaitIndicator for Silent {
//!     fn show(&mut self, _message: &str) {}
//!     fn dismiss(&mut self) {}
//! }
//!
//! struct Print;
//! impl Notices for Print {
//!     fn notice(&mut self, message: &str) { eprintln!("{message}"); }
//! }
//!
//! let layout = Layout::new("quickstart-data");
//! let mut screen = Onboarding::new(
//!     layout.clone(),
//!     Arc::new(SystemProbe::new().with_gpu_names(vec!["Adreno (TM) 740".into()])),
//!     Arc::new(FsFirmwareInstaller::new(layout.firmware_dir())),
//!     Arc::new(FsAssetInstaller::new(layout.font_dir(), layout.driver_dir())),
//!     Box::new(Print),
//! );
//! let mut event_loop = EventLoop::new(NoProgress);
//! screen.start(&mut event_loop, Arc::new(Loaded), Box::new(Silent));
//!
//! screen.handle(Command::InstallFirmware("PS3UPDAT.PUP".into()), &mut event_loop);
//! event_loop.run_until_idle(&mut screen);
//!
//! while screen.phase() == Phase::Active && screen.next_enabled() {
//!     screen.handle(Command::Next, &mut event_loop);
//! }
//! ```

pub mod assets;
pub mod bootstrap;
pub mod config;
pub mod event_loop;
pub mod firmware;
pub mod install;
pub mod layout;
pub mod onboarding;
pub mod platform;
pub mod probe;
pub mod revision;
pub mod schema;
pub mod task;
pub mod tuning;
pub mod wizard;
