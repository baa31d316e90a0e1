//! `stretch`: tempo/pitch/speed processing of a WAV file through SoundStretch.
//!
//! Features:
//! - three sliders (tempo %, pitch semitones, speed) edited in a TUI
//! - Enter: process the input file into the output file on a worker thread
//! - plays the result when processing succeeds
//! - `process` subcommand for one-shot headless runs

mod headless;
mod logging;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stretch_core::config::{
    PlayerConfig, SessionSettings, ShellConfig, engine_command_from_config,
    player_command_from_config, session_settings_from_config,
};
use stretch_core::engine::{EngineFactory, SoundStretch};
use stretch_core::gate::AdmissionPolicy;
use stretch_core::playback::{NoPlayback, PlaybackTrigger, SystemOpener};
use stretch_core::request::SpeedScaling;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "stretch.toml";

#[derive(Parser, Debug)]
#[command(name = "stretch", version = VERSION)]
struct Args {
    /// Optional config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input WAV file (default: new.wav in the working directory)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output WAV file (default: new_after.wav in the working directory)
    #[arg(long)]
    output: Option<PathBuf>,

    /// SoundStretch executable
    #[arg(long)]
    soundstretch: Option<String>,

    /// Player command used instead of the platform opener
    #[arg(long)]
    player: Option<String>,

    /// Do not play the output after processing
    #[arg(long)]
    no_play: bool,

    /// What to do when processing is requested while busy: reject or queue
    #[arg(long)]
    admission: Option<AdmissionPolicy>,

    /// How the speed value reaches the engine: raw or percent
    #[arg(long)]
    speed_scaling: Option<SpeedScaling>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Interactive terminal UI (default)
    Tui,
    /// Process the input once and exit
    Process {
        /// Tempo in percent (100 = unchanged)
        #[arg(long, allow_negative_numbers = true)]
        tempo: Option<i32>,

        /// Pitch shift in semitones
        #[arg(long, allow_negative_numbers = true)]
        pitch: Option<i32>,

        /// Speed value, interpreted per --speed-scaling
        #[arg(long, allow_negative_numbers = true)]
        speed: Option<i32>,

        /// Give up waiting for the engine after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
    /// Print program and engine versions
    Version,
}

/// Everything needed to build a session.
pub(crate) struct Setup {
    pub(crate) settings: SessionSettings,
    pub(crate) engines: Arc<dyn EngineFactory>,
    pub(crate) playback: Box<dyn PlaybackTrigger>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.clone().unwrap_or(Cmd::Tui);

    let log_rx = match command {
        Cmd::Tui => Some(logging::init_tui()),
        _ => {
            logging::init_stderr();
            None
        }
    };

    let cfg = load_config(&args)?;
    let setup = build_setup(cfg, &args)?;
    tracing::info!(
        input = %setup.settings.input.display(),
        output = %setup.settings.output.display(),
        admission = ?setup.settings.admission,
        speed_scaling = ?setup.settings.speed_scaling,
        "starting stretch"
    );

    match command {
        Cmd::Tui => ui::run_tui(setup, log_rx),
        Cmd::Process {
            tempo,
            pitch,
            speed,
            timeout_secs,
        } => {
            let overrides = headless::Overrides {
                tempo,
                pitch,
                speed,
            };
            let ok = headless::run(
                setup,
                overrides,
                std::time::Duration::from_secs(timeout_secs),
            )?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Cmd::Version => {
            println!("stretch {VERSION}");
            println!("Audio engine version = {}", setup.engines.version());
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> Result<ShellConfig> {
    if let Some(path) = args.config.as_ref() {
        return ShellConfig::load(path);
    }
    let auto_path = PathBuf::from(DEFAULT_CONFIG);
    if auto_path.exists() {
        tracing::info!(path = %auto_path.display(), "using config from working directory");
        return ShellConfig::load(&auto_path);
    }
    Ok(ShellConfig::default())
}

/// Apply CLI flags on top of the file config, then resolve everything.
fn build_setup(mut cfg: ShellConfig, args: &Args) -> Result<Setup> {
    if let Some(input) = args.input.as_ref() {
        cfg.input = Some(input.to_string_lossy().into_owned());
    }
    if let Some(output) = args.output.as_ref() {
        cfg.output = Some(output.to_string_lossy().into_owned());
    }
    if let Some(program) = args.soundstretch.as_ref() {
        cfg.engine.get_or_insert_with(Default::default).program = Some(program.clone());
    }
    if let Some(program) = args.player.as_ref() {
        let player = cfg.player.get_or_insert_with(PlayerConfig::default);
        player.program = Some(program.clone());
        player.enabled = Some(true);
    }
    if args.no_play {
        cfg.player.get_or_insert_with(PlayerConfig::default).enabled = Some(false);
    }
    if args.admission.is_some() {
        cfg.admission = args.admission;
    }
    if args.speed_scaling.is_some() {
        cfg.speed_scaling = args.speed_scaling;
    }

    let cwd = std::env::current_dir().context("resolve working directory")?;
    let settings = session_settings_from_config(&cfg, &cwd)?;

    let (program, leading) = engine_command_from_config(&cfg);
    let engines: Arc<dyn EngineFactory> =
        Arc::new(SoundStretch::new(program).with_leading_args(leading));

    let playback: Box<dyn PlaybackTrigger> = match player_command_from_config(&cfg) {
        None => Box::new(NoPlayback),
        Some((None, _)) => Box::new(SystemOpener::default()),
        Some((Some(program), args)) => Box::new(SystemOpener::with_command(program, args)),
    };

    Ok(Setup {
        settings,
        engines,
        playback,
    })
}
