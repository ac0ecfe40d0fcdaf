use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use matome_video::config::Config;
use matome_video::image_gen::{self, ImageMethod};
use matome_video::init;
use matome_video::script::load_script;
use matome_video::script_gen;
use matome_video::subtitles::SubtitleTimeline;
use matome_video::theme_suggester::ThemeSuggester;
use matome_video::thumbnail_gen;
use matome_video::video_edit;
use matome_video::video_tracker::{VideoRecord, VideoTracker};
use matome_video::voice_gen;
use matome_video::youtube_uploader;

#[derive(Parser, Debug)]
#[command(name = "matome-video")]
#[command(about = "2ch-style narrated video generation pipeline", long_about = None)]
struct Args {
    /// Video theme, e.g. "30代で貯金1000万貯めた話"
    #[arg(long)]
    theme: Option<String>,

    /// Full pipeline: script -> images -> voices -> video
    #[arg(long)]
    auto: bool,

    /// Generate the script only
    #[arg(long)]
    script_only: bool,

    /// Build the video from existing script/voices/images
    #[arg(long)]
    generate_video: bool,

    /// Image generation backend
    #[arg(long, value_enum, default_value = "kieai")]
    image_method: ImageMethod,

    /// Render without background music
    #[arg(long)]
    no_bgm: bool,

    /// Skip scene image generation
    #[arg(long)]
    no_images: bool,

    /// Disable the batched AI reading correction
    #[arg(long)]
    no_ai_fix: bool,

    /// Suggest themes from channel and competitor analytics
    #[arg(long)]
    suggest_themes: bool,

    /// Backfill view counts for recorded videos
    #[arg(long)]
    update_stats: bool,

    /// Record the produced video to the tracking sheet
    #[arg(long)]
    record: bool,

    /// Upload to YouTube as a scheduled post
    #[arg(long)]
    upload: bool,

    /// Upload to YouTube and publish immediately
    #[arg(long)]
    upload_now: bool,

    /// Scheduled publish hour (JST): 6 or 18
    #[arg(long)]
    publish_hour: Option<u32>,
}

fn script_path() -> PathBuf {
    Path::new(init::SCRIPTS_DIR).join("script.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    init::ensure_directories().await?;
    if !init::check_ffmpeg().await {
        warn!("FFmpeg not found in PATH; video assembly will fail.");
    }

    let client = reqwest::Client::new();

    if args.suggest_themes {
        let cfg = Config::load("config.json").await?;
        info!("[mode] theme suggestion");

        let suggester = ThemeSuggester::new(&cfg, client.clone());
        let themes = suggester.suggest_themes(10).await?;

        info!("Suggested themes:");
        for (i, theme) in themes.iter().enumerate() {
            info!("  {}. {}", i + 1, theme);
        }
        if let Some(first) = themes.first() {
            info!("Example: matome-video --theme \"{}\" --auto", first);
        }
        return Ok(());
    }

    if args.update_stats {
        let cfg = Config::load("config.json").await?;
        info!("[mode] stats update");

        let tracker = VideoTracker::new(&cfg, client.clone());
        let updated = tracker.update_video_stats().await?;
        info!("Updated: {} videos", updated);

        let report = tracker.performance_report().await?;
        info!("Total videos: {}", report.total_videos);
        info!("Total views: {}", report.total_views);
        info!("Average views: {:.0}", report.avg_views_per_video);
        return Ok(());
    }

    if args.generate_video {
        info!("[mode] video assembly only");
        let path = script_path();
        if !path.exists() {
            error!("Script not found: {} (generate one first)", path.display());
            std::process::exit(1);
        }

        let turns = load_script(&path).await?;
        let timeline = load_or_fallback_timeline(&turns).await;
        let voice_map = voice_gen::load_voice_map(Path::new(init::VOICES_DIR)).await;

        video_edit::create_video_from_script(
            &path,
            &turns,
            timeline,
            voice_map,
            "output_video.mp4",
            !args.no_bgm,
        )
        .await?;
        return Ok(());
    }

    if args.script_only {
        let cfg = Config::load("config.json").await?;
        let Some(theme) = args.theme.as_deref() else {
            error!("--theme is required");
            std::process::exit(1);
        };
        info!("[mode] script only");
        info!("Theme: {}", theme);

        script_gen::generate_script(&client, &cfg, theme, &script_path(), true).await?;
        info!("Script generation done.");
        return Ok(());
    }

    if args.auto {
        let cfg = Config::load("config.json").await?;
        let Some(theme) = args.theme.clone() else {
            error!("--theme is required");
            std::process::exit(1);
        };

        let started = Instant::now();
        info!("[mode] full auto");
        info!("Theme: {}", theme);

        // Step 1: script.
        info!("Step 1/4: script generation...");
        let t0 = Instant::now();
        let script_result =
            script_gen::generate_script(&client, &cfg, &theme, &script_path(), true).await?;
        let script_secs = t0.elapsed().as_secs_f64();
        let turns = script_result.turns;

        // Step 2: scene images.
        let mut image_secs = 0.0;
        let mut image_count = 0usize;
        let mut kieai_credits = 0u32;
        if args.no_images {
            info!("Step 2/4: image generation skipped");
        } else {
            info!("Step 2/4: image generation...");
            let t0 = Instant::now();
            match image_gen::generate_images(
                &cfg,
                &client,
                &turns,
                args.image_method,
                Path::new(init::IMAGES_DIR),
            )
            .await
            {
                Ok((map, report)) => {
                    image_count = map.len();
                    if args.image_method == ImageMethod::Kieai {
                        kieai_credits += 2 * report.done_count() as u32;
                    }
                }
                Err(err) => warn!("image generation skipped: {}", err),
            }
            image_secs = t0.elapsed().as_secs_f64();
        }

        // Step 3: voices.
        info!("Step 3/4: voice generation...");
        let t0 = Instant::now();
        let voices = voice_gen::generate_voices(
            &cfg,
            &client,
            &turns,
            Path::new(init::VOICES_DIR),
            !args.no_ai_fix,
        )
        .await?;
        let voice_secs = t0.elapsed().as_secs_f64();

        // Step 4: the video itself.
        info!("Step 4/4: video assembly...");
        let output_path = video_edit::create_video_from_script(
            &script_path(),
            &turns,
            voices.timeline.clone(),
            voices.voice_map,
            "output_video.mp4",
            !args.no_bgm,
        )
        .await?;

        let generation_time = started.elapsed().as_secs_f64();
        info!("Full auto done in {:.1} min", generation_time / 60.0);
        info!(
            "Gemini tokens: {} (≈ ¥{})",
            script_result.gemini_tokens, script_result.cost_jpy
        );

        // Thumbnail, every run.
        let mut thumbnail_path = None;
        match thumbnail_gen::generate_thumbnail(&cfg, &client, &theme, &turns).await {
            Ok(result) => {
                kieai_credits += result.kieai_credits;
                thumbnail_path = Some(result.path);
            }
            Err(err) => warn!("thumbnail skipped: {}", err),
        }

        // YouTube upload.
        let mut youtube_url = None;
        if args.upload || args.upload_now {
            info!("Uploading to YouTube...");
            match youtube_uploader::upload_to_youtube(
                &cfg,
                &client,
                &output_path,
                &theme,
                !args.upload_now,
                args.publish_hour,
                thumbnail_path.as_deref(),
            )
            .await
            {
                Ok(result) => {
                    info!("YouTube: {} ({})", result.url, result.status);
                    youtube_url = Some(result.url);
                }
                Err(err) => error!("YouTube upload failed: {}", err),
            }
        }

        // Tracking row.
        if args.record && !cfg.sheets_id.is_empty() {
            info!("Recording to tracking sheet...");
            let tracker = VideoTracker::new(&cfg, client.clone());
            let record = VideoRecord {
                theme: theme.clone(),
                video_path: output_path.display().to_string(),
                video_duration: voices.timeline.total_duration,
                generation_time,
                youtube_url,
                gemini_tokens: script_result.gemini_tokens,
                gemini_cost_jpy: script_result.cost_jpy,
                kieai_credits,
                scene_count: turns.len(),
                image_count,
                script_secs,
                image_secs,
                voice_secs,
            };
            if let Err(err) = tracker.record_video(&record, true).await {
                error!("tracking record failed: {}", err);
            } else {
                info!("Recorded.");
            }
        }

        return Ok(());
    }

    // No mode chosen: behave like --help.
    use clap::CommandFactory;
    Args::command().print_help()?;
    Ok(())
}

async fn load_or_fallback_timeline(turns: &[matome_video::script::Turn]) -> SubtitleTimeline {
    let subtitles_path = Path::new(init::VOICES_DIR).join("subtitles.json");
    match SubtitleTimeline::load(&subtitles_path).await {
        Ok(timeline) => {
            info!(
                "Subtitle timeline loaded: total {:.2}s",
                timeline.total_duration
            );
            timeline
        }
        Err(_) => {
            warn!("subtitles.json not found; using a flat per-turn timeline");
            video_edit::fallback_timeline(turns)
        }
    }
}
