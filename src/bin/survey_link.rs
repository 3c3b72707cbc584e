//! survey_link - place annotated road assets on the survey track
//!
//! For each requested video this tool:
//! 1. Extracts detections for the video from the annotation export
//! 2. Loads `<track_dir>/<video>.gpx` (missing tracks leave detections unlocated)
//! 3. Assigns each detection a track point and summarises the result
//! 4. Writes the runs as a JSON array to stdout or `--output`
//!
//! Configuration comes from `SURVEY_CONFIG` and `SURVEY_*` variables.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::{IsTerminal, Write};

use asset_survey::frame_cache::FrameCache;
use asset_survey::{load_annotations, Summary, SurveyConfig, SurveyPipeline, SurveyRun};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video key to link (repeatable), e.g. `survey_0412`.
    #[arg(long = "video", value_name = "KEY", required = true)]
    videos: Vec<String>,
    /// Output file for the JSON result (stdout when omitted).
    #[arg(long)]
    output: Option<String>,
    /// Emit only per-video summaries, without the detection lists.
    #[arg(long, default_value_t = false)]
    summary_only: bool,
    /// Override the annotation export location.
    #[arg(long, env = "SURVEY_ANNOTATIONS")]
    annotations: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary<'a> {
    video_key: &'a str,
    track_points: usize,
    located: usize,
    summary: &'a Summary,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mode = ui::UiMode::parse(&args.ui)?;
    let ui = ui::Ui::new(
        mode,
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );

    let mut cfg = SurveyConfig::load()?;
    if let Some(annotations) = &args.annotations {
        cfg.annotations = asset_survey::SourceLocation::parse(annotations)?;
    }
    let pipeline = SurveyPipeline::new(cfg);

    let tasks = {
        let mut stage = ui.stage("Load annotations");
        let tasks = load_annotations(&pipeline.config().annotations);
        stage.set_detail(format!("{} tasks", tasks.len()));
        tasks
    };

    let runs = {
        let mut stage = ui.stage("Link detections");
        let runs = run_all(&pipeline, &args.videos, &tasks)?;
        let total: usize = runs.iter().map(|run| run.detections.len()).sum();
        stage.set_detail(format!("{} detections across {} videos", total, runs.len()));
        runs
    };

    if pipeline.config().frames.dir.is_some() {
        let mut stage = ui.stage("Prefetch frames");
        let frames = &pipeline.config().frames;
        let mut cache = FrameCache::new(frames.max_entries, frames.max_bytes);
        let available: usize = runs
            .iter()
            .map(|run| pipeline.prefetch_frames(run, &mut cache))
            .sum();
        let stats = cache.stats();
        stage.set_detail(format!(
            "{} frames available, {} cached, {} evicted",
            available,
            cache.len(),
            stats.evictions
        ));
    }

    let json = if args.summary_only {
        let summaries: Vec<RunSummary<'_>> = runs
            .iter()
            .map(|run| RunSummary {
                video_key: &run.video_key,
                track_points: run.track_points,
                located: run.located_count(),
                summary: &run.summary,
            })
            .collect();
        serde_json::to_vec_pretty(&summaries)?
    } else {
        serde_json::to_vec_pretty(&runs)?
    };

    match &args.output {
        Some(path) => {
            let _stage = ui.stage("Write results");
            std::fs::write(path, &json).with_context(|| format!("write {}", path))?;
            eprintln!("results written to {}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&json)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Runs are independent, so each video gets its own thread.
fn run_all(
    pipeline: &SurveyPipeline,
    videos: &[String],
    tasks: &[asset_survey::AnnotationTask],
) -> Result<Vec<SurveyRun>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = videos
            .iter()
            .map(|video| scope.spawn(move || pipeline.run(video, tasks)))
            .collect();
        handles
            .into_iter()
            .zip(videos)
            .map(|(handle, video)| {
                handle
                    .join()
                    .map_err(|_| anyhow!("linking video {} panicked", video))
            })
            .collect()
    })
}
