#[cfg(not(feature = "export-wav"))]
fn main() {
    eprintln!(
        "The crapsynth CLI requires the \"export-wav\" feature. Rebuild with `--features export-wav` to enable rendering."
    );
}

#[cfg(feature = "export-wav")]
mod cli {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand};
    use log::{info, LevelFilter};

    use crapsynth::export::write_wav_file;
    use crapsynth::{ChipConfig, MixBuffers, Platform, QueueStats, Script, WriteLog};

    #[derive(Parser)]
    #[command(name = "crapsynth")]
    #[command(about = "Render CrapSynth register write sequences to WAV")]
    struct Args {
        /// Increase log verbosity (-v info, -vv debug)
        #[arg(short, long, action = clap::ArgAction::Count, global = true)]
        verbose: u8,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Render a JSON tick script
        Render {
            /// Script file
            script: PathBuf,

            /// Output WAV file
            #[arg(short, long)]
            output: PathBuf,

            /// Chip configuration (JSON)
            #[arg(long)]
            config: Option<PathBuf>,

            /// Dump per-channel outputs to a CSV file
            #[arg(long)]
            channels_csv: Option<PathBuf>,

            /// Save the captured write log (.json for JSON, binary otherwise)
            #[arg(long)]
            capture: Option<PathBuf>,

            /// Seconds of tail rendered after the script ends
            #[arg(long, default_value_t = 0.0)]
            extra_seconds: f64,
        },
        /// Replay a captured write log
        Replay {
            /// Write log file
            log: PathBuf,

            /// Output WAV file
            #[arg(short, long)]
            output: PathBuf,

            /// Samples to render (defaults to one past the last write)
            #[arg(long)]
            samples: Option<u64>,

            /// Chip configuration (JSON)
            #[arg(long)]
            config: Option<PathBuf>,
        },
    }

    fn init_logging(verbose: u8) {
        let level = match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .init();
    }

    fn load_config(path: Option<&Path>) -> Result<ChipConfig> {
        match path {
            Some(path) => ChipConfig::load(path)
                .with_context(|| format!("loading config {}", path.display())),
            None => Ok(ChipConfig::default()),
        }
    }

    fn write_channels_csv(path: &Path, buffers: &MixBuffers) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;

        let mut header = vec!["sample".to_string(), "master".to_string()];
        header.extend((0..buffers.channels.len()).map(|i| format!("ch{i}")));
        writer.write_record(&header)?;

        for (i, master) in buffers.master.iter().enumerate() {
            let mut row = vec![i.to_string(), master.to_string()];
            row.extend(buffers.channels.iter().map(|c| c[i].to_string()));
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn report_queue(stats: QueueStats) {
        if stats.dropped > 0 {
            eprintln!(
                "warning: {} register writes dropped in {} queue overflow episode(s)",
                stats.dropped, stats.overflow_episodes
            );
        }
        info!(
            "queue: {} accepted, high water {}",
            stats.accepted, stats.high_water
        );
    }

    fn render(
        script_path: &Path,
        output: &Path,
        config: Option<&Path>,
        channels_csv: Option<&Path>,
        capture: Option<&Path>,
        extra_seconds: f64,
    ) -> Result<()> {
        let mut config = load_config(config)?;
        if capture.is_some() {
            config = config.with_capture(true);
        }

        let script = Script::load(script_path)
            .with_context(|| format!("loading script {}", script_path.display()))?;
        let mut platform = Platform::new(config)?;

        let extra = (extra_seconds.max(0.0) * config.sample_rate as f64).round() as u64;
        let buffers = script.render(&mut platform, extra)?;

        write_wav_file(output, &buffers.master, config.sample_rate)
            .with_context(|| format!("writing {}", output.display()))?;
        println!(
            "Rendered {} samples ({:.2}s) to {}",
            buffers.len(),
            buffers.len() as f64 / config.sample_rate as f64,
            output.display()
        );

        if let Some(path) = channels_csv {
            write_channels_csv(path, &buffers)?;
        }
        if let Some(path) = capture {
            let log = platform.take_capture().unwrap_or_default();
            log.save(path)
                .with_context(|| format!("saving write log {}", path.display()))?;
            println!("Captured {} writes to {}", log.write_count(), path.display());
        }

        report_queue(platform.queue_stats());
        Ok(())
    }

    fn replay(log_path: &Path, output: &Path, samples: Option<u64>, config: Option<&Path>) -> Result<()> {
        let config = load_config(config)?;
        let log = WriteLog::load(log_path)
            .with_context(|| format!("loading write log {}", log_path.display()))?;
        let total = samples.unwrap_or_else(|| log.last_sample().map_or(0, |s| s + 1));

        let mut platform = Platform::new(config)?;
        let buffers = log.replay_into(&mut platform, total);

        write_wav_file(output, &buffers.master, config.sample_rate)
            .with_context(|| format!("writing {}", output.display()))?;
        println!(
            "Replayed {} writes over {} samples to {}",
            log.len(),
            buffers.len(),
            output.display()
        );

        report_queue(platform.queue_stats());
        Ok(())
    }

    pub fn run() -> Result<()> {
        let args = Args::parse();
        init_logging(args.verbose);

        match args.command {
            Command::Render {
                script,
                output,
                config,
                channels_csv,
                capture,
                extra_seconds,
            } => render(
                &script,
                &output,
                config.as_deref(),
                channels_csv.as_deref(),
                capture.as_deref(),
                extra_seconds,
            ),
            Command::Replay {
                log,
                output,
                samples,
                config,
            } => replay(&log, &output, samples, config.as_deref()),
        }
    }
}

#[cfg(feature = "export-wav")]
fn main() -> anyhow::Result<()> {
    cli::run()
}
