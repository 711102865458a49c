//! mimic: record and replay keyboard/mouse macros from the command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select, Receiver};
use mimic_core::keys::key_name;
use mimic_core::{
    create_event_bus, list_macros, load_actions, resolve_macro_path, sequence_duration,
    ActionExecutor, ActionInput, ActionRepository, Coordinator, MacroEvent, MacroStorage,
    Player, Recorder, Settings, SharedRepository,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "mimic", version, about = "Record and replay keyboard and mouse macros")]
struct Cli {
    /// Settings file (YAML). Defaults to the user config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log synthetic input instead of sending it
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install hooks and record; the record hotkey starts and stops
    Record {
        /// Macro file or name to save to
        #[arg(short, long)]
        out: String,

        /// Finer mouse-move filtering (3px / 20ms)
        #[arg(long)]
        high_precision: bool,

        /// Record buttons and wheel only
        #[arg(long)]
        no_mouse_moves: bool,
    },

    /// Replay a macro; the stop combo (default Shift+Tab) cancels
    Play {
        /// Macro file or name
        file: String,

        /// Number of times to replay
        #[arg(short, long)]
        loops: Option<u32>,

        /// Playback speed (1.0 = realtime, 2.0 = 2x)
        #[arg(short, long)]
        speed: Option<f64>,

        /// Delay before the first action, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Show action count and duration of a macro
    Info {
        /// Macro file or name
        file: String,
    },

    /// List macros saved by name
    List,

    /// Print the effective settings as YAML
    Config {
        /// Also write them to the user settings file
        #[arg(long)]
        save: bool,
    },
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mimic=info,mimic_core=info,mimic_platform=info".into()),
        )
        .try_init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => mimic_core::load_settings(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => mimic_core::load_user_settings(),
    };

    match cli.command {
        Commands::Record {
            out,
            high_precision,
            no_mouse_moves,
        } => {
            settings.recording.high_precision |= high_precision;
            settings.recording.record_mouse_moves &= !no_mouse_moves;
            record(&settings, &out, cli.dry_run)
        }
        Commands::Play {
            file,
            loops,
            speed,
            delay_ms,
        } => {
            if let Some(loops) = loops {
                settings.playback.loop_count = loops;
            }
            if let Some(speed) = speed {
                settings.playback.speed_multiplier = speed;
            }
            if let Some(delay_ms) = delay_ms {
                settings.playback.start_delay_ms = delay_ms;
            }
            settings.validate()?;
            play(&settings, &file, cli.dry_run)
        }
        Commands::Info { file } => info_cmd(&file),
        Commands::List => list(),
        Commands::Config { save } => config_cmd(&settings, save),
    }
}

/// Everything one session needs, wired around a shared repository and bus.
struct Session {
    coordinator: Arc<Coordinator>,
    repository: SharedRepository,
    events: Receiver<MacroEvent>,
}

impl Session {
    fn new(settings: &Settings, dry_run: bool) -> Result<Self> {
        let repository = ActionRepository::shared();
        let bus = create_event_bus();
        let events = bus.subscribe();

        let injector = mimic_platform::create_injector(dry_run)?;
        let executor = Arc::new(ActionExecutor::new(injector));
        let recorder = Arc::new(Recorder::new(repository.clone(), bus.clone()));
        let player = Arc::new(Player::new(repository.clone(), executor, bus.clone()));
        let coordinator = Coordinator::new(
            recorder,
            player,
            MacroStorage::new(repository.clone()),
            &bus,
            settings.hotkeys.clone(),
            &settings.recording,
        );

        Ok(Self {
            coordinator,
            repository,
            events,
        })
    }

    fn install_hooks(&self) -> Result<()> {
        mimic_platform::set_dpi_aware();
        let hooks = mimic_platform::create_hooks(self.coordinator.dispatcher());
        self.coordinator
            .initialize(hooks)
            .context("installing global input hooks")?;
        if !mimic_platform::supports_suppression() {
            warn!("This platform cannot swallow hotkeys; they reach other applications too");
        }
        Ok(())
    }
}

fn ctrl_c_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("installing Ctrl+C handler")?;
    Ok(rx)
}

enum Signal {
    Event(MacroEvent),
    Interrupted,
    Closed,
}

/// Block until either a bus event or Ctrl+C arrives.
fn next_signal(events: &Receiver<MacroEvent>, interrupted: &Receiver<()>) -> Signal {
    select! {
        recv(events) -> event => event.map_or(Signal::Closed, Signal::Event),
        recv(interrupted) -> _ => Signal::Interrupted,
    }
}

fn record(settings: &Settings, out: &str, dry_run: bool) -> Result<()> {
    let path = resolve_macro_path(out)?;
    let session = Session::new(settings, dry_run)?;
    let interrupted = ctrl_c_channel()?;
    session.install_hooks()?;

    println!(
        "Press {} to start recording and again to stop (Ctrl+C aborts).",
        key_name(settings.hotkeys.toggle_recording)
    );

    loop {
        match next_signal(&session.events, &interrupted) {
            Signal::Event(MacroEvent::RecordingStarted) => println!("Recording..."),
            Signal::Event(MacroEvent::ActionsChanged { count }) => {
                debug!(count, "actions recorded")
            }
            Signal::Event(MacroEvent::RecordingStopped) => break,
            Signal::Event(_) => {}
            Signal::Interrupted => {
                info!("Interrupted");
                session.coordinator.stop_recording();
                break;
            }
            Signal::Closed => bail!("event bus closed"),
        }
    }

    session.coordinator.shutdown();

    if session.repository.is_empty() {
        println!("Nothing recorded.");
        return Ok(());
    }
    session.coordinator.save(&path)?;
    println!(
        "Saved {} actions ({:.2}s) to {}",
        session.repository.len(),
        session.repository.duration().as_secs_f64(),
        path.display()
    );
    Ok(())
}

fn play(settings: &Settings, file: &str, dry_run: bool) -> Result<()> {
    let path = resolve_macro_path(file)?;
    let session = Session::new(settings, dry_run)?;
    let count = session.coordinator.load(&path)?;
    let interrupted = ctrl_c_channel()?;
    session.install_hooks()?;

    let playback = &settings.playback;
    println!(
        "Playing {} actions x{} at {}x ({} stops).",
        count,
        playback.loop_count,
        playback.speed_multiplier,
        stop_combo(settings)
    );
    session.coordinator.play(playback)?;

    let executed = loop {
        match next_signal(&session.events, &interrupted) {
            Signal::Event(MacroEvent::ActionExecuted { executed }) => debug!(executed, "progress"),
            Signal::Event(MacroEvent::PlaybackStopped { executed }) => break executed,
            Signal::Event(_) => {}
            Signal::Interrupted => {
                info!("Interrupted");
                session.coordinator.stop_playback();
            }
            Signal::Closed => bail!("event bus closed"),
        }
    };

    session.coordinator.shutdown();
    let failures = session.coordinator.player().executor().failure_count();
    println!("Executed {executed} actions ({failures} failed).");
    Ok(())
}

fn stop_combo(settings: &Settings) -> String {
    format!(
        "{:?}+{}",
        settings.hotkeys.stop_modifier,
        key_name(settings.hotkeys.stop_key)
    )
}

fn info_cmd(file: &str) -> Result<()> {
    let path = resolve_macro_path(file)?;
    let actions = load_actions(&path)?;
    let keyboard = actions
        .iter()
        .filter(|a| matches!(a.input, ActionInput::Keyboard { .. }))
        .count();

    println!("File:     {}", path.display());
    println!("Actions:  {}", actions.len());
    println!("Keyboard: {}", keyboard);
    println!("Mouse:    {}", actions.len() - keyboard);
    println!("Duration: {:.3}s", sequence_duration(&actions).as_secs_f64());
    Ok(())
}

fn config_cmd(settings: &Settings, save: bool) -> Result<()> {
    print!("{}", settings.to_yaml()?);
    if save {
        let path = mimic_core::save_user_settings(settings)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn list() -> Result<()> {
    let names = list_macros()?;
    if names.is_empty() {
        println!("No macros saved in {}", mimic_core::get_macros_dir().display());
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}
