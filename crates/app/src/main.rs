use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use fakeout_core::{
    main_queue, paddle_frames, positive_duration, AppConfig, Bounce, Color, Display, Frame, Recorder,
    RecordingSettings, ScriptedSensor, SharedSpeed, WatchFace,
};
use tracing_subscriber::EnvFilter;

fn main() -> fakeout_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Live {
            seconds,
            record,
            every,
        } => run_live(config, seconds, record, every),
        Commands::Precompute { output, frames } => run_precompute(config, output, frames),
        Commands::Trace { ticks } => run_trace(&config, ticks),
    }
}

fn run_live(
    config: AppConfig,
    seconds: f64,
    record: Option<PathBuf>,
    every: u64,
) -> fakeout_core::Result<()> {
    let run_time = positive_duration(seconds, "--seconds must be a positive duration")?;
    tracing::info!(seconds, record = ?record, "starting watch face");

    let recorder = match record {
        Some(dir) => {
            let mut recorder = Recorder::new(RecordingSettings {
                every,
                ..RecordingSettings::new(dir)
            });
            recorder.start()?;
            Some(recorder)
        }
        None => None,
    };

    let sensor = ScriptedSensor::new(config.heart_rate.script.clone());
    let (queue, main_loop) = main_queue();
    let mut face = WatchFace::new(config, ConsoleDisplay::new(recorder));
    face.activate(queue, sensor)?;

    main_loop.run_for(run_time);
    face.deactivate();
    main_loop.run_pending();

    let screen = face
        .display()
        .lock()
        .map_err(|_| fakeout_core::FakeoutError::Poisoned("display"))?;
    let frames = screen.frames;
    let skipped = screen.skipped;
    let recorded = screen.recorder.as_ref().map(Recorder::written).unwrap_or(0);
    tracing::info!(frames, skipped, recorded, label = %screen.label, "watch face stopped");
    Ok(())
}

fn run_precompute(
    config: AppConfig,
    output: PathBuf,
    frames: Option<usize>,
) -> fakeout_core::Result<()> {
    let mut picker = config.picker.clone();
    if let Some(frames) = frames {
        picker.frames = frames.max(1);
    }
    tracing::info!(frames = picker.frames, ?output, "precomputing picker images");

    let mut recorder = Recorder::new(RecordingSettings {
        prefix: "picker".to_string(),
        ..RecordingSettings::new(output)
    });
    recorder.start()?;

    let images = paddle_frames(&picker, config.canvas.size, config.canvas.background);
    for (index, image) in images.iter().enumerate() {
        match image {
            Some(bitmap) => {
                let path = recorder.write(index as u64, bitmap)?;
                tracing::debug!(path = %path.display(), "wrote picker image");
            }
            None => tracing::warn!(index, "picker image could not be rendered"),
        }
    }

    tracing::info!(written = recorder.written(), dir = %recorder.output_dir().display(), "done");
    Ok(())
}

fn run_trace(config: &AppConfig, ticks: usize) -> fakeout_core::Result<()> {
    let mut bounce = Bounce::new(config.canvas.size, SharedSpeed::new(config.bounce.speed));
    let mut bounds = config.bounce.start;

    let mut points = Vec::with_capacity(ticks + 1);
    for tick in 0..=ticks {
        let direction = bounce.direction();
        points.push(serde_json::json!({
            "tick": tick,
            "x": bounds.origin.x,
            "y": bounds.origin.y,
            "horizontal": direction.horizontal,
            "vertical": direction.vertical,
        }));
        bounce.advance(&mut bounds);
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &points)?;
    writeln!(stdout)?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Terminal stand-in for the watch screen: counts frames, optionally saves
/// them, and logs label changes.
struct ConsoleDisplay {
    recorder: Option<Recorder>,
    frames: u64,
    skipped: u64,
    label: String,
    color: Color,
}

impl ConsoleDisplay {
    fn new(recorder: Option<Recorder>) -> Self {
        Self {
            recorder,
            frames: 0,
            skipped: 0,
            label: String::new(),
            color: Color::WHITE,
        }
    }
}

impl Display for ConsoleDisplay {
    fn set_background_image(&mut self, frame: Frame) {
        self.frames += 1;
        if frame.bitmap.is_none() {
            self.skipped += 1;
            return;
        }
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(err) = recorder.record(&frame) {
                tracing::warn!(%err, index = frame.index, "failed to record frame");
            }
        }
    }

    fn set_label_text(&mut self, text: &str) {
        self.label = text.to_string();
        tracing::info!(label = %self.label, color = %self.color, "label");
    }

    fn set_label_color(&mut self, color: Color) {
        self.color = color;
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Bouncing watch face driven by heart rate", long_about = None)]
struct Cli {
    /// JSON configuration file. Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the watch face with a scripted heart-rate sensor.
    Live {
        /// How long to run, in seconds.
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,
        /// Directory to save frames into as PNG files.
        #[arg(short, long)]
        record: Option<PathBuf>,
        /// Save one frame out of every N.
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
    /// Render the paddle picker images ahead of time.
    Precompute {
        /// Directory the images are written to.
        output: PathBuf,
        /// Number of picker positions; overrides the config.
        #[arg(short, long)]
        frames: Option<usize>,
    },
    /// Print the bouncing square's trajectory as JSON.
    Trace {
        /// Number of steps to simulate.
        #[arg(short, long, default_value_t = 30)]
        ticks: usize,
    },
}

#[cfg(test)]
mod tests {
    use fakeout_core::FakeoutError;

    use super::*;

    #[test]
    fn live_runs_briefly_and_reports() {
        let mut config = AppConfig::default();
        config.heart_rate.poll_interval_seconds = 0.01;

        run_live(config, 0.05, None, 1).unwrap();
    }

    #[test]
    fn live_rejects_unrepresentable_run_times() {
        for seconds in [f64::INFINITY, f64::NAN, -1.0, 0.0] {
            let err = run_live(AppConfig::default(), seconds, None, 1).unwrap_err();
            assert!(matches!(err, FakeoutError::InvalidInput(_)), "{seconds} was accepted");
        }
    }
}
