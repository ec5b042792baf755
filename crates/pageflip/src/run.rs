use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use flipconfig::FlipConfig;
use pagepack::LocalPack;
use pageloader::{LoaderOptions, PackSource, PageSource, SyntheticSource, ThreadedPageLoader};
use renderer::{FlipSession, RenderStyle, SessionOptions, SlideFlipEngine};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::script::ScriptStep;

/// How long the session must stay quiet before a step counts as settled.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(250);

pub fn run(args: RunArgs) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(max_pages) = args.max_pages {
        config.document.max_pages = max_pages;
    }
    if let Some(pages) = args.pages.clone() {
        config.document.pages = Some(pages);
    }
    config.validate().context("invalid pageflip configuration")?;

    let (width, height) = args.size;
    let source = build_source(&config, args.size)?;
    let max_pages = source.page_count().min(config.document.max_pages);
    if max_pages == 0 {
        bail!("document has no pages");
    }
    tracing::info!(
        max_pages,
        width,
        height,
        pages = ?config.document.pages,
        "starting pageflip session"
    );

    let loader = ThreadedPageLoader::new(
        source,
        LoaderOptions {
            workers: config.loader.workers,
            prefetch_radius: config.loader.prefetch_radius,
            cache_capacity: config.loader.cache_capacity,
        },
    )
    .context("failed to start page loader")?;

    let engine = SlideFlipEngine::new(
        config.animation.progress_step(),
        config.render.background.rgba(),
    );
    let options = SessionOptions {
        max_pages,
        start_page: args.start_page,
        style: render_style(&config),
        raster_scale: config.render.raster_scale,
    };
    let mut session = FlipSession::spawn(engine, Arc::new(loader), options)?;
    session.resize(width, height)?;
    session.run_until_idle(SETTLE_TIMEOUT)?;

    let steps = args.script.map(|script| script.0).unwrap_or_default();
    for (index, step) in steps.iter().enumerate() {
        let accepted = match *step {
            ScriptStep::Flip(direction) => session.fling(direction)?,
            ScriptStep::Cancel(direction) => {
                session.drag(direction, 0.5)? && session.release(false)?
            }
        };
        session.run_until_idle(SETTLE_TIMEOUT)?;
        if accepted {
            tracing::info!(step = index, ?step, page = session.page_index(), "step played");
        } else {
            tracing::warn!(step = index, ?step, page = session.page_index(), "step refused at document edge");
        }
    }

    let page = session.page_index();
    let frames = session.frames_seen();
    let engine = session.shutdown()?;
    println!("page {page} of {max_pages} ({frames} frames)");

    if let Some(path) = args.export.as_deref() {
        if engine.frames_composed() == 0 {
            bail!("no frame was composed; nothing to export");
        }
        export_frame(&engine, path)?;
        println!("exported {}", path.display());
    }
    Ok(())
}

pub fn show_config(config: Option<&Path>) -> Result<()> {
    let config = resolve_config(config)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(explicit: Option<&Path>) -> Result<FlipConfig> {
    match explicit {
        Some(path) => FlipConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let paths = AppPaths::discover()?;
            let path = paths.config_file();
            tracing::debug!(path = %path.display(), "resolving default config");
            FlipConfig::load_or_default(&path)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
    }
}

fn build_source(config: &FlipConfig, size: (u32, u32)) -> Result<Arc<dyn PageSource>> {
    match config.document.pages.as_deref() {
        Some(dir) => {
            let pack = LocalPack::open(dir)
                .with_context(|| format!("failed to open page pack {}", dir.display()))?;
            tracing::info!(
                name = pack.manifest().name.as_deref().unwrap_or("unnamed"),
                pages = pack.page_count(),
                "page pack loaded"
            );
            Ok(Arc::new(PackSource::new(pack)))
        }
        None => Ok(Arc::new(SyntheticSource::new(
            config.document.max_pages,
            size,
        ))),
    }
}

fn render_style(config: &FlipConfig) -> RenderStyle {
    RenderStyle {
        background: config.render.background.rgba(),
        text_color: config.render.text_color.rgba(),
        reference_width: config.render.reference_width,
        page_number_size: config.render.page_number_size,
        caption_size: config.render.caption_size,
    }
}

fn export_frame(engine: &SlideFlipEngine, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    engine
        .frame()
        .save(path)
        .with_context(|| format!("failed to write frame to {}", path.display()))?;
    let labels: Vec<&str> = engine
        .frame_labels()
        .iter()
        .map(|label| label.text.as_str())
        .collect();
    tracing::debug!(sequence = engine.frames_composed(), ?labels, "frame exported");
    Ok(())
}
