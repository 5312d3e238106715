use anyhow::Result;
use clap::Parser;
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use quickstart_core::assets::FsAssetInstaller;
use quickstart_core::bootstrap::{NativeRuntime, WaitIndicator};
use quickstart_core::event_loop::{EventLoop, Token};
use quickstart_core::firmware::FsFirmwareInstaller;
use quickstart_core::layout::Layout;
use quickstart_core::onboarding::{Command, Notices, Onboarding, Phase};
use quickstart_core::probe::SystemProbe;
use quickstart_core::schema::{ConfigKey, FONT_SELECTION_BUILTIN, FONT_SELECTION_CUSTOM};
use quickstart_core::task::ProgressSurface;
use quickstart_core::wizard::Step;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long the main loop waits for a completion before rechecking Ctrl+C.
const TICK: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "quickstart")]
#[command(about = "Interactive first-run setup for the emulator", version)]
struct Cli {
    /// Directory the configuration, firmware, fonts and drivers live in
    #[arg(long, value_name = "PATH", default_value = "./quickstart-data")]
    data_dir: PathBuf,

    /// Run setup again even if a configuration already exists
    #[arg(long)]
    reentry: bool,

    /// Vulkan device name, most preferred first (repeatable)
    #[arg(long = "gpu", value_name = "NAME")]
    gpus: Vec<String>,

    /// LLVM CPU target name, most preferred first (repeatable)
    #[arg(long = "cpu", value_name = "NAME")]
    cpus: Vec<String>,

    /// The device cannot load custom GPU drivers
    #[arg(long)]
    no_custom_driver: bool,

    /// Wait for the native runtime to load before showing setup
    #[arg(long)]
    delay_load: bool,
}

fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) =
        ProgressStyle::default_spinner().template("{spinner:.blue} {msg} [{elapsed_precise}]")
    {
        pb.set_style(spinner_style.tick_strings(&["■  ", " ■ ", "  ■", " ■ ", "■■■"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// One spinner per running task.
#[derive(Default)]
struct SpinnerProgress {
    bars: HashMap<Token, ProgressBar>,
}

impl ProgressSurface for SpinnerProgress {
    fn show(&mut self, task: Token, message: &str) {
        self.bars.insert(task, spinner(message));
    }

    fn hide(&mut self, task: Token) {
        if let Some(pb) = self.bars.remove(&task) {
            pb.finish_and_clear();
        }
    }
}

/// The blocking indicator shown while the runtime loads.
#[derive(Default)]
struct SpinnerWait {
    bar: Option<ProgressBar>,
}

impl WaitIndicator for SpinnerWait {
    fn show(&mut self, message: &str) {
        self.bar = Some(spinner(message));
    }

    fn dismiss(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

struct ConsoleNotices;

impl Notices for ConsoleNotices {
    fn notice(&mut self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), message);
    }
}

/// Stands in for the emulator's native library, which this front-end links
/// statically. Loading only has to happen once.
struct PreloadedRuntime {
    delay: bool,
    loaded: Once,
}

impl PreloadedRuntime {
    fn new(delay: bool) -> Self {
        Self {
            delay,
            loaded: Once::new(),
        }
    }
}

impl NativeRuntime for PreloadedRuntime {
    fn should_delay_load(&self) -> bool {
        self.delay && !self.loaded.is_completed()
    }

    fn load_library(&self) -> anyhow::Result<()> {
        self.loaded.call_once(|| tracing::debug!("native runtime loaded"));
        Ok(())
    }
}

/// What picking a menu entry does.
enum Choice {
    Run(Command),
    AskPath(&'static str, fn(PathBuf) -> Command),
    ConfirmQuit,
}

fn ask_path(prompt: &str) -> Result<PathBuf> {
    let path: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()?;
    Ok(PathBuf::from(path.trim()))
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

fn print_step(screen: &Onboarding) {
    let wizard = screen.wizard();
    let step = screen.step();
    println!();
    println!(
        "{} {}",
        style(format!("[{}/{}]", wizard.position() + 1, wizard.steps().len())).dim(),
        style(step.title()).cyan().bold()
    );
    println!("  {}", step.description());

    match step {
        Step::Firmware => {
            let status = if screen.layout().firmware_installed() {
                style("installed").green().to_string()
            } else {
                style("not installed").red().to_string()
            };
            println!("  Firmware: {status}");
        }
        Step::Iso => {
            let dir = screen
                .iso_dir()
                .map_or_else(|| "(not set)".to_string(), |d| d.display().to_string());
            println!("  Game directory: {}", style(dir).cyan());
        }
        Step::Font => {
            println!("  Font: {}", style(screen.entry(ConfigKey::FontFileSelection)).cyan());
            let path = screen.entry(ConfigKey::CustomFontFilePath);
            if !path.is_empty() {
                println!("  Custom font: {}", style(path).cyan());
            }
        }
        Step::Driver => {
            println!("  Custom driver: {}", style(screen.entry(ConfigKey::UseCustomDriver)).cyan());
            let path = screen.entry(ConfigKey::CustomDriverLibraryPath);
            if !path.is_empty() {
                println!("  Library: {}", style(path).cyan());
            }
        }
        Step::Settings => {
            println!();
            for key in ConfigKey::ALL {
                println!("  {:<42} {}", key.path(), style(screen.entry(key)).cyan());
            }
        }
        Step::Welcome => {}
    }
    println!();
}

fn menu(screen: &Onboarding) -> Vec<(String, Choice)> {
    let mut items: Vec<(String, Choice)> = Vec::new();

    match screen.step() {
        Step::Welcome => {}
        Step::Firmware => items.push((
            "Install firmware from a file...".into(),
            Choice::AskPath("Path to PS3UPDAT.PUP", Command::InstallFirmware),
        )),
        Step::Iso => items.push((
            "Choose the game directory...".into(),
            Choice::AskPath("Game directory", Command::SelectIsoDir),
        )),
        Step::Font => {
            items.push((
                "Use the built-in font".into(),
                Choice::Run(Command::SetFontSelection(FONT_SELECTION_BUILTIN.into())),
            ));
            items.push((
                "Use a custom font".into(),
                Choice::Run(Command::SetFontSelection(FONT_SELECTION_CUSTOM.into())),
            ));
            items.push((
                "Install a font file...".into(),
                Choice::AskPath("Path to a .ttf, .ttc or .otf file", Command::SelectFont),
            ));
            for font in screen.installed_fonts() {
                items.push((
                    format!("Use installed font {font}"),
                    Choice::Run(Command::UseInstalledFont(font)),
                ));
            }
        }
        Step::Driver => {
            let enabled = screen.entry(ConfigKey::UseCustomDriver) == "true";
            let toggle = if enabled {
                "Use the system driver"
            } else {
                "Use a custom driver"
            };
            items.push((toggle.into(), Choice::Run(Command::SetCustomDriver(!enabled))));
            items.push((
                "Install a driver package...".into(),
                Choice::AskPath("Path to a .zip or .so driver", Command::SelectDriver),
            ));
            for driver in screen.installed_drivers() {
                items.push((
                    format!("Use installed driver {driver}"),
                    Choice::Run(Command::UseInstalledDriver(driver)),
                ));
            }
            items.push(("Rescan installed drivers".into(), Choice::Run(Command::Refresh)));
        }
        Step::Settings => {}
    }

    let wizard = screen.wizard();
    if wizard.is_last() {
        items.push(("Finish".into(), Choice::Run(Command::Finish)));
    } else {
        let label = if screen.next_enabled() {
            "Next".to_string()
        } else {
            format!("Next {}", style("(complete this step first)").dim())
        };
        items.push((label, Choice::Run(Command::Next)));
    }
    if !wizard.is_first() {
        items.push(("Back".into(), Choice::Run(Command::Prev)));
    }
    items.push(("Quit".into(), Choice::ConfirmQuit));
    items
}

/// Renders the current step and returns the command the user picked.
fn prompt(screen: &Onboarding) -> Result<Command> {
    let items = menu(screen);
    let labels: Vec<&str> = items.iter().map(|(label, _)| label.as_str()).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let command = match &items[selection].1 {
        Choice::Run(command) => command.clone(),
        Choice::AskPath(question, make) => make(ask_path(question)?),
        Choice::ConfirmQuit => {
            if confirm_operation("Quit setup? Nothing will be saved.")? {
                Command::Quit
            } else {
                Command::Refresh
            }
        }
    };
    Ok(command)
}

/// Ctrl+C inside a prompt arrives as an interrupted read, not a signal.
fn interrupted(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<dialoguer::Error>(),
        Some(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted
    )
}

/// Pumps completions until no task is pending or the user hits Ctrl+C.
fn drain(screen: &mut Onboarding, event_loop: &mut EventLoop<Onboarding>, running: &AtomicBool) {
    while event_loop.pending() > 0 {
        if !running.load(Ordering::SeqCst) {
            screen.handle(Command::Quit, event_loop);
            return;
        }
        event_loop.dispatch_timeout(screen, TICK);
    }
}

fn main() -> Result<()> {
    init_tracing();

    // This flag allows for graceful cancellation of operations.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Set up the Ctrl+C handler to toggle the `running` flag.
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let cli = Cli::parse();

    let layout = Layout::new(&cli.data_dir);
    let probe = SystemProbe::new()
        .with_gpu_names(cli.gpus)
        .with_cpu_names(cli.cpus)
        .with_custom_driver(!cli.no_custom_driver);
    let mut screen = Onboarding::new(
        layout.clone(),
        Arc::new(probe),
        Arc::new(FsFirmwareInstaller::new(layout.firmware_dir())),
        Arc::new(FsAssetInstaller::new(layout.font_dir(), layout.driver_dir())),
        Box::new(ConsoleNotices),
    )
    .with_reentry(cli.reentry);

    let mut event_loop = EventLoop::new(SpinnerProgress::default());
    screen.start(
        &mut event_loop,
        Arc::new(PreloadedRuntime::new(cli.delay_load)),
        Box::new(SpinnerWait::default()),
    );
    drain(&mut screen, &mut event_loop, &running);

    let mut rendered = None;
    loop {
        match screen.phase() {
            Phase::Booting | Phase::Active => {}
            Phase::Unsupported => {
                println!(
                    "{} No Vulkan device was found. The emulator cannot run on this system.",
                    style("ERROR:").red().bold()
                );
                screen.handle(Command::Quit, &mut event_loop);
                continue;
            }
            Phase::HandedOff => {
                println!(
                    "\n✨ Setup complete. Configuration is in {}.",
                    style(layout.default_config_file().display()).cyan()
                );
                return Ok(());
            }
            Phase::Quit => {
                println!("Setup cancelled.");
                return Ok(());
            }
        }

        // Only redraw the step when something changed.
        let version = screen.revision().current();
        if rendered.is_none_or(|seen| screen.revision().changed_since(seen)) {
            print_step(&screen);
            rendered = Some(version);
        }

        let command = match prompt(&screen) {
            Ok(command) => command,
            Err(e) if interrupted(&e) || !running.load(Ordering::SeqCst) => Command::Quit,
            Err(e) => {
                screen.teardown(&mut event_loop);
                return Err(e);
            }
        };
        let command = if running.load(Ordering::SeqCst) {
            command
        } else {
            Command::Quit
        };
        screen.handle(command, &mut event_loop);
        drain(&mut screen, &mut event_loop, &running);
    }
}
