//! Runs one tutoring session from the terminal.
//!
//! Commands on stdin: `r` toggles recording, `s` skips, `p <pace>` changes the
//! pace (0.75, 1, 1.25, 1.5), `x` pauses, `q` quits.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use tutor_realtime::types::Pace;
use tutor_realtime::utils::device;
use tutor_realtime::{
    Config, ConfigBuilder, NativeMicrophone, NativeSpeaker, SessionEngine, SessionState, Speaker,
};

const PACE_FILE: &str = ".tutor_pace";

#[derive(Parser, Debug)]
#[command(version, about = "Voice lesson with the tutoring service")]
struct Cli {
    /// Session identifier returned by the service when the session was created
    #[arg(required_unless_present = "list_devices")]
    session_id: Option<String>,
    /// Print the audio devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Speech pace; defaults to the last one used
    #[arg(long)]
    pace: Option<Pace>,
    /// `host[:port]` of the tutoring service, overrides TUTOR_HOST
    #[arg(long)]
    host: Option<String>,
    /// Connect over wss
    #[arg(long)]
    secure: bool,
    #[arg(long)]
    input_device: Option<String>,
    #[arg(long)]
    output_device: Option<String>,
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_pace(path: &Path) -> Option<Pace> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn store_pace(path: &Path, pace: Pace) {
    if let Err(e) = std::fs::write(path, pace.multiplier().to_string()) {
        tracing::warn!("failed to persist pace: {}", e);
    }
}

fn render(previous: &SessionState, state: &SessionState) {
    for entry in &state.transcript()[previous.transcript().len()..] {
        let who = match entry.speaker() {
            Speaker::Tutor => "tutor",
            Speaker::Learner => "you",
        };
        println!("{:>6}: {}", who, entry.text());
    }
    if previous.status() != state.status() {
        println!("  [{}]", state.status().label());
    }
    if previous.progress() != state.progress() {
        if let Some(progress) = state.progress() {
            println!(
                "  section {}/{} {} ({:.0}%)",
                progress.section_index() + 1,
                progress.total_sections(),
                progress.section_title(),
                progress.fraction() * 100.0
            );
        }
    }
    if previous.section_complete().is_none() {
        if let Some(section) = state.section_complete() {
            println!("  ✓ {} complete", section.section_title());
        }
    }
    if previous.error() != state.error() {
        if let Some(error) = state.error() {
            println!("  ! {}", error);
        }
    }
    if !previous.module_complete() && state.module_complete() {
        println!("  {}", state.module_message().unwrap_or("Module complete!"));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if cli.list_devices {
        println!("inputs:\n{}", device::get_available_inputs()?);
        println!("outputs:\n{}", device::get_available_outputs()?);
        return Ok(());
    }
    let session_id = cli.session_id.context("missing session id")?;

    let mut builder = ConfigBuilder::from(Config::from_env().context("invalid environment")?);
    if let Some(host) = cli.host.as_deref() {
        builder = builder.with_host(host);
    }
    if cli.secure {
        builder = builder.with_secure(true);
    }
    let config = builder.build();

    let pace_file = PathBuf::from(PACE_FILE);
    let pace = cli.pace.or_else(|| load_pace(&pace_file)).unwrap_or(Pace::Normal);

    let mic = match cli.input_device.as_deref() {
        Some(name) => NativeMicrophone::new().with_device(name),
        None => NativeMicrophone::new(),
    };
    let speaker = NativeSpeaker::new(cli.output_device.as_deref()).context("failed to open speaker")?;

    let store_file = pace_file.clone();
    let engine = SessionEngine::builder(config)
        .with_pace_store(move |pace| store_pace(&store_file, pace))
        .connect(&session_id, pace, mic, speaker)
        .context("failed to start session")?;

    let mut updates = engine.watch();
    let printer = tokio::spawn(async move {
        let mut previous = updates.borrow_and_update().clone();
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            render(&previous, &state);
            previous = state;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("r") => {
                if engine.state().recording() {
                    if !engine.stop_speaking().await? {
                        println!("  (nothing recorded)");
                    }
                } else if let Err(e) = engine.start_speaking().await {
                    println!("  {}", e);
                }
            }
            Some("s") => {
                engine.skip().await?;
            }
            Some("x") => {
                engine.pause().await?;
            }
            Some("p") => match words.next().map(str::parse::<Pace>) {
                Some(Ok(pace)) => engine.set_pace(pace).await?,
                Some(Err(e)) => println!("  {}", e),
                None => println!("  pace is {}", engine.state().pace()),
            },
            Some("q") => break,
            Some(other) => println!("  unknown command {:?}", other),
            None => {}
        }
    }

    engine.disconnect().await?;
    printer.await.context("printer task failed")?;
    Ok(())
}
