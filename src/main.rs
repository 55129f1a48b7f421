//! speechctl entry point
//!
//! Small front end over the speech controller:
//! 1. `--list-voices` prints the voices the host engine offers
//! 2. otherwise the remaining arguments are spoken and the process
//!    waits until playback ends

use anyhow::{bail, Context};
use log::{debug, error, info, warn};
use speechctl::speech::{NativeEngine, SpeechController, VoiceSummary};
use speechctl::state::SpeechConfig;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    debug: bool,
    config: Option<String>,
    list_voices: bool,
    json: bool,
    voice: Option<String>,
    rate: Option<f32>,
    pitch: Option<f32>,
    volume: Option<f32>,
    text: Vec<String>,
}

fn usage() -> String {
    format!(
        "Usage: {} [-d|--debug] [--config PATH] [--list-voices [--json]]\n\
         \x20      [--voice NAME] [--rate R] [--pitch P] [--volume V] TEXT...",
        speechctl::APP_NAME
    )
}

fn parse_args(raw: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut raw = raw;

    while let Some(arg) = raw.next() {
        let mut value = |name: &str| {
            raw.next()
                .with_context(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "-d" | "--debug" => args.debug = true,
            "--list-voices" => args.list_voices = true,
            "--json" => args.json = true,
            "--config" => args.config = Some(value("--config")?),
            "--voice" => args.voice = Some(value("--voice")?),
            "--rate" => args.rate = Some(value("--rate")?.parse::<f32>().context("--rate")?),
            "--pitch" => args.pitch = Some(value("--pitch")?.parse::<f32>().context("--pitch")?),
            "--volume" => args.volume = Some(value("--volume")?.parse::<f32>().context("--volume")?),
            "-h" | "--help" => {
                println!("{}", usage());
                process::exit(0);
            }
            _ if arg.starts_with("--") => bail!("unknown option {}\n{}", arg, usage()),
            _ => args.text.push(arg),
        }
    }

    Ok(args)
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to speechctl.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("speechctl.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open speechctl.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "speechctl version {} starting (debug mode, logging to speechctl.log)",
            speechctl::VERSION
        );
    } else {
        // Normal mode: errors only unless RUST_LOG says otherwise
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    };

    init_logging(args.debug);

    if let Err(e) = run(args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => SpeechConfig::load_from(path),
        None => SpeechConfig::load(),
    }
    .context("loading configuration")?;
    debug!("Configuration from {:?}", config.path());

    // Command line overrides the file for this run only
    if let Some(voice) = &args.voice {
        config.set("speech", "voice", voice);
    }
    for (key, value) in [("rate", args.rate), ("pitch", args.pitch), ("volume", args.volume)] {
        if let Some(value) = value {
            config.set("speech", key, &value.to_string());
        }
    }

    let (done_tx, done_rx) = mpsc::sync_channel(1);
    let mut controller = SpeechController::<NativeEngine>::detect(move || {
        // Receiver may be gone if we already timed out
        let _ = done_tx.try_send(());
    });

    if !controller.supported() {
        eprintln!("Speech synthesis is not available on this system");
        process::exit(1);
    }

    let voices = controller.voices();

    if args.list_voices {
        let summaries: Vec<VoiceSummary> = voices.iter().map(VoiceSummary::from).collect();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            for voice in &summaries {
                println!("{:<40} {:<10} {}", voice.name, voice.language, voice.id);
            }
        }
        return Ok(());
    }

    if args.text.is_empty() {
        bail!("nothing to say\n{}", usage());
    }

    let voice = match config.voice() {
        Some(wanted) => {
            let found = config.select_voice(&voices, |voice| vec![voice.name(), voice.id()]);
            if found.is_none() {
                bail!("no voice matches {:?} (try --list-voices)", wanted);
            }
            found.cloned()
        }
        None => None,
    };

    let request = config.request(args.text.join(" ")).with_voice(voice);
    controller.speak(request).context("speaking")?;

    let reports_completion = controller
        .engine()
        .map(NativeEngine::reports_completion)
        .unwrap_or(false);
    if !reports_completion {
        warn!("Engine does not report completion, exiting without waiting");
        return Ok(());
    }

    let timeout = Duration::from_secs(config.wait_timeout());
    if done_rx.recv_timeout(timeout).is_err() {
        warn!("Timed out after {:?}, canceling", timeout);
        controller.cancel().context("canceling")?;
    }

    Ok(())
}
