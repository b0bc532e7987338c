use clap::{Parser, Subcommand, ValueEnum};
use repcount_core::config::JointConfig;
use repcount_core::counter::{DEFAULT_LOWER_THRESHOLD, DEFAULT_UPPER_THRESHOLD};
use repcount_core::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Stderr, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "repcount")]
#[command(about = "Bicep curl rep counter driven by pose landmarks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count reps from a JSON Lines landmark stream
    Count {
        /// Landmark stream file, or '-' for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Arm to track (overrides the configured joint)
        #[arg(long, value_enum)]
        arm: Option<ArmArg>,

        /// When an extreme counts as reached (overrides config)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// How to deliver the audible cue
        #[arg(long, value_enum, default_value = "log")]
        cue: CueArg,

        /// Print one JSON line per frame to stdout
        #[arg(long)]
        emit_frames: bool,

        /// Write a per-frame CSV trace
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Dry run - do not record the session in history
        #[arg(long)]
        dry_run: bool,
    },

    /// Compute the joint angle for three points (vertex in the middle)
    Angle {
        #[arg(required = true, allow_negative_numbers = true, num_args = 6, value_names = ["X1", "Y1", "X2", "Y2", "X3", "Y3"])]
        coords: Vec<f64>,
    },

    /// Show recently recorded sessions
    History {
        /// How many days back to look
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..))]
        days: i64,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ArmArg {
    Left,
    Right,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Exact,
    Threshold,
}

#[derive(Clone, Copy, ValueEnum)]
enum CueArg {
    Bell,
    Log,
    Off,
}

/// Cue sink picked on the command line
enum CliCue {
    Bell(BellCue<Stderr>),
    Log(LogCue),
    Off,
}

impl CueSink for CliCue {
    fn alert(&mut self, event: &CueEvent) {
        match self {
            CliCue::Bell(bell) => bell.alert(event),
            CliCue::Log(log) => log.alert(event),
            CliCue::Off => {}
        }
    }
}

struct CountOptions {
    input: PathBuf,
    arm: Option<ArmArg>,
    policy: Option<PolicyArg>,
    cue: CueArg,
    emit_frames: bool,
    trace: Option<PathBuf>,
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        repcount_core::logging::init_with_level("debug");
    } else {
        repcount_core::logging::init();
    }

    run(cli).map_err(|e| {
        tracing::error!("{}", e);
        e
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Count {
            input,
            arm,
            policy,
            cue,
            emit_frames,
            trace,
            dry_run,
        } => cmd_count(
            data_dir,
            config,
            CountOptions {
                input,
                arm,
                policy,
                cue,
                emit_frames,
                trace,
                dry_run,
            },
        ),
        Commands::Angle { coords } => cmd_angle(&coords),
        Commands::History { days } => cmd_history(&data_dir, days),
        Commands::Config { write } => cmd_config(&config, cli.config.as_deref(), write),
    }
}

fn cmd_count(data_dir: PathBuf, mut config: Config, opts: CountOptions) -> Result<()> {
    if let Some(arm) = opts.arm {
        config.joint = JointConfig::for_arm(match arm {
            ArmArg::Left => Arm::Left,
            ArmArg::Right => Arm::Right,
        });
    }

    match opts.policy {
        Some(PolicyArg::Exact) => config.trigger = TriggerPolicy::Exact,
        Some(PolicyArg::Threshold) => {
            if config.trigger == TriggerPolicy::Exact {
                config.trigger = TriggerPolicy::Threshold {
                    lower: DEFAULT_LOWER_THRESHOLD,
                    upper: DEFAULT_UPPER_THRESHOLD,
                };
            }
        }
        None => {}
    }

    let cue = match opts.cue {
        CueArg::Bell => CliCue::Bell(BellCue::new(io::stderr())),
        CueArg::Log => CliCue::Log(LogCue),
        CueArg::Off => CliCue::Off,
    };

    // Configuration problems surface here, before any frame is read
    config.validate()?;
    let mut session = CountingSession::new(&config, cue)?;

    let input: Box<dyn BufRead> = if opts.input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&opts.input)?))
    };
    let frames = FrameReader::new(input, config.input.coordinate_space());

    let mut trace = match opts.trace {
        Some(ref path) => Some(TraceWriter::create(path)?),
        None => None,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    session.run(frames, |outcome| {
        if let Some(ref mut trace) = trace {
            trace.write(outcome)?;
        }
        if opts.emit_frames {
            serde_json::to_writer(&mut out, outcome)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    })?;
    out.flush()?;
    drop(out);

    if let Some(trace) = trace {
        let rows = trace.finish()?;
        tracing::info!("Wrote {} trace rows", rows);
    }

    let summary = session.finish();

    // Keep stdout pure JSON Lines when frames are emitted
    let mut report: Box<dyn Write> = if opts.emit_frames {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    display_summary(&mut report, &summary)?;

    if opts.dry_run {
        writeln!(report, "\n[Dry run - not recording session]")?;
    } else {
        let mut log = SessionLog::in_data_dir(&data_dir);
        log.append(&summary)?;
    }

    Ok(())
}

fn cmd_angle(coords: &[f64]) -> Result<()> {
    let [x1, y1, x2, y2, x3, y3] = coords else {
        return Err(Error::Input(format!(
            "expected 6 coordinates, got {}",
            coords.len()
        )));
    };

    let angle = compute_angle(
        &Landmark::new(0, *x1, *y1),
        &Landmark::new(1, *x2, *y2),
        &Landmark::new(2, *x3, *y3),
    );
    println!("{:.2}", angle);
    Ok(())
}

fn cmd_history(data_dir: &Path, days: i64) -> Result<()> {
    let log = SessionLog::in_data_dir(data_dir);
    let sessions = load_recent(log.path(), days)?;

    if sessions.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    println!("Sessions in the last {} days:", days);
    for s in &sessions {
        println!(
            "  {}  {:>3} reps  ({} frames, {})",
            s.finished_at.format("%Y-%m-%d %H:%M"),
            s.whole_reps,
            s.frames,
            s.joint.vertex.name()
        );
    }
    let total: u32 = sessions.iter().map(|s| s.whole_reps).sum();
    println!("Total: {} reps", total);
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>, write: bool) -> Result<()> {
    print!("{}", config.to_toml()?);

    if write {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_config_path);
        config.save_to(&path)?;
        println!("\n✓ Saved config to {}", path.display());
    }
    Ok(())
}

fn display_summary(out: &mut impl Write, summary: &SessionSummary) -> Result<()> {
    writeln!(out, "╭─────────────────────────────────────────╮")?;
    writeln!(out, "│  BICEP CURLS: {} reps", summary.whole_reps)?;
    writeln!(out, "╰─────────────────────────────────────────╯")?;
    writeln!(out, "  Count: {:.1}", summary.count)?;
    writeln!(out, "  Joint: {}", summary.joint)?;
    writeln!(
        out,
        "  Frames: {} ({} processed, {} without a person, {} partial)",
        summary.frames, summary.processed, summary.no_person, summary.missing_landmark
    )?;
    if summary.resets > 0 {
        writeln!(out, "  Resets: {}", summary.resets)?;
    }
    writeln!(out, "  Cues: {}", summary.cues)?;
    Ok(())
}
