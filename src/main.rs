use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scroll_capture::logging::{LogConfig, LogFormat, init_logging};
use scroll_capture::replay::{audit, load_frames, save_png};
use scroll_capture::{SmallOverlapPolicy, StitchConfig, StitchOutput, stitch_directory};

/// Stitch scrolling screenshots into one tall image:
/// - live: watch a screen region while you scroll, stitch when you're done
/// - offline: replay a directory of ordered frames (lexical filename order)
#[derive(Parser, Debug)]
#[command(name = "scrollcap")]
#[command(about = "📜 Turn a scrolling window into one seamless screenshot")]
#[command(long_about = "Capture a scrolling window frame by frame and stitch the frames into one image,
or replay and audit a directory of previously captured frames.")]
struct Cli {
    /// Log level filter (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, default_value = "pretty", help = "Log format: pretty or json")]
    log_format: LogFormat,

    /// JSON tuning file; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report small, near-perfect overlaps as found instead of as duplicates
    #[arg(long, global = true)]
    keep_small_overlaps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stitch a directory of frames into one PNG
    Stitch {
        /// Directory of frames, stitched in filename order
        dir: PathBuf,

        #[arg(short, long, default_value = "scroll.png", help = "Output PNG path")]
        output: PathBuf,

        /// Also write the stitch plan and overlaps as JSON
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// Show the overlaps and stitch plan of a frame directory without rendering
    Audit {
        dir: PathBuf,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Capture a screen region while you scroll
    #[cfg(feature = "screen-capture")]
    Capture {
        /// Region to capture as X,Y,W,H in screen pixels
        #[arg(long)]
        region: scroll_capture::CaptureRegion,

        #[arg(short, long, default_value = "scroll.png", help = "Output PNG path")]
        output: PathBuf,

        /// Stop automatically after this long
        #[arg(short, long,
              help = "Finish automatically after: 30s (30 seconds), 2m (2 minutes), 1h (1 hour)")]
        duration: Option<String>,
    },
    /// Print the default tuning as JSON
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
    })?;

    let config = load_config(cli.config.as_deref(), cli.keep_small_overlaps)?;

    match cli.command {
        Command::Stitch { dir, output, plan } => {
            let stitched = stitch_directory(&dir, &config).await?;
            write_outputs(&stitched, &output, plan.as_deref())
        }
        Command::Audit { dir, json } => {
            let frames = load_frames(&dir)?;
            let report = audit(&frames, &config.overlap)?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }
        #[cfg(feature = "screen-capture")]
        Command::Capture {
            region,
            output,
            duration,
        } => {
            let duration = duration
                .as_deref()
                .map(parse_duration)
                .transpose()?
                .map(|secs| std::time::Duration::from_secs(u64::from(secs)));
            live::run(config, region, &output, duration).await
        }
        Command::DefaultConfig => {
            println!("{}", StitchConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, keep_small_overlaps: bool) -> Result<StitchConfig> {
    let mut config = match path {
        Some(path) => StitchConfig::load(path)?,
        None => StitchConfig::default(),
    };
    if keep_small_overlaps {
        config.overlap = config.overlap.with_small_overlap(SmallOverlapPolicy::Keep);
    }
    Ok(config)
}

fn write_outputs(stitched: &StitchOutput, output: &Path, plan: Option<&Path>) -> Result<()> {
    save_png(&stitched.image, output)?;
    if let Some(plan_path) = plan {
        let json = serde_json::to_string_pretty(&stitched.summary())?;
        std::fs::write(plan_path, json)
            .with_context(|| format!("writing plan to {}", plan_path.display()))?;
    }
    println!(
        "Saved {} ({}x{}, {} frames, {} skipped as duplicates)",
        output.display(),
        stitched.image.width,
        stitched.image.height,
        stitched.plan.entries.len(),
        stitched.plan.skipped_frames()
    );
    Ok(())
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u32> {
    if let Ok(seconds) = duration.parse::<u32>() {
        return Ok(seconds);
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow::anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u32 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(num),
        "m" => Ok(num * 60),
        "h" => Ok(num * 3600),
        _ => Err(anyhow::anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

#[cfg(feature = "screen-capture")]
mod live {
    use std::path::Path;
    use std::time::Duration;

    use anyhow::Result;
    use futures_util::StreamExt;
    use scroll_capture::{
        CaptureRegion, HasRecoverySuggestion, ScrapCaptureSource, ScrollCapture,
        SessionController, SessionEvent, StitchConfig,
    };
    use tokio::io::{AsyncBufReadExt, BufReader};

    pub async fn run(
        config: StitchConfig,
        region: CaptureRegion,
        output: &Path,
        duration: Option<Duration>,
    ) -> Result<()> {
        let source = ScrapCaptureSource::primary()?;
        let controller = SessionController::new(config)?;
        let ScrollCapture {
            mut events,
            finish,
            cancel,
            outcome,
        } = controller.start(source, region)?;

        println!("Capturing {}. Scroll the window, press Enter when done (Ctrl-C cancels).", region);
        let progress = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    SessionEvent::FrameCaptured { captured_count } => {
                        println!("  {} frames", captured_count)
                    }
                    SessionEvent::StateChanged(state) => tracing::debug!(%state, "state"),
                    SessionEvent::Completed { .. } | SessionEvent::Failed { .. } => break,
                }
            }
        });

        let enter = async {
            let mut line = String::new();
            BufReader::new(tokio::io::stdin()).read_line(&mut line).await
        };
        let deadline = async {
            match duration {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = enter => { finish.finish(); }
            _ = deadline => { finish.finish(); }
            _ = tokio::signal::ctrl_c() => { cancel.cancel(); }
        }

        let result = outcome.wait().await;
        let _ = progress.await;
        match result {
            Ok(stitched) => super::write_outputs(&stitched, output, None),
            Err(e) if e.is_cancelled() => {
                println!("Cancelled, nothing saved");
                Ok(())
            }
            Err(e) => {
                if let Some(hint) = e.recovery_suggestion() {
                    eprintln!("hint: {}", hint);
                }
                Err(e.into())
            }
        }
    }
}
