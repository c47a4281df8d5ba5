use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use flipbook::panic_handler;
use flipbook::settings::{self, Settings};

#[derive(Parser, Debug)]
#[command(name = "flipbook", version, about = "Render a document as an open two-page spread")]
struct Cli {
    /// Document to open; falls back to `document` in the settings file
    document: Option<String>,

    /// Container width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Gap between the two pages in pixels
    #[arg(long)]
    gutter: Option<u32>,

    /// Device pixel ratio
    #[arg(long)]
    dpr: Option<f32>,

    /// Open the book at this page
    #[arg(long)]
    page: Option<usize>,

    /// Resize the container to this width before exporting
    #[arg(long)]
    resize: Option<u32>,

    /// Directory the spread image is written to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Settings file instead of the one in the config directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "flipbook.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(document) = &self.document {
            settings.document = Some(document.clone());
        }
        if let Some(width) = self.width {
            settings.container_width = width;
        }
        if let Some(gutter) = self.gutter {
            settings.gutter = gutter;
        }
        if let Some(dpr) = self.dpr {
            settings.device_pixel_ratio = dpr;
        }
        if let Some(out) = &self.out {
            settings.output_dir = out.display().to_string();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {}", cli.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting flipbook");

    let mut settings = match &cli.config {
        Some(path) => settings::load_settings_from_path(path)
            .with_context(|| format!("cannot read settings from {}", path.display()))?,
        None => settings::load_settings(),
    };
    cli.apply_to(&mut settings);

    let result = run(&cli, &settings);
    if let Err(e) = &result {
        log::error!("Application error: {e:?}");
    }
    info!("Shutting down flipbook");
    result
}

#[cfg(feature = "pdf")]
fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use flipbook::flipbook::{
        HeadlessBook, MupdfEngine, Session, TurnWidget, compose_spread, save_spread, spread_pages,
    };

    const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

    let document = settings
        .document
        .as_deref()
        .context("no document given on the command line or in the settings file")?;

    let config = settings.session_config();
    let mut session = Session::create(Arc::new(MupdfEngine), HeadlessBook::new(), config);
    session
        .load(document, settings.container_width)
        .with_context(|| format!("failed to load {document}"))?;

    if let Some(page) = cli.page {
        session
            .go_to_page(page)
            .with_context(|| format!("cannot open the book at page {page}"))?;
        session.pump();
    }

    if let Some(width) = cli.resize {
        let start = Instant::now();
        session.notify_resize(width, start);
        session.tick(start + config.resize_quiet);
    }

    if !session.settle(SETTLE_TIMEOUT) {
        log::warn!(
            "{} renders still pending after {SETTLE_TIMEOUT:?}",
            session.pending_renders()
        );
    }

    let current = session.widget().current_page().unwrap_or(1);
    let (left, right) = spread_pages(current, session.page_count());
    let slots = session.slots();
    let image = compose_spread(
        left.and_then(|p| slots.surface(p)).map(|s| &**s),
        right.and_then(|p| slots.surface(p)).map(|s| &**s),
        &session.layout(),
        settings.device_pixel_ratio,
        settings.paper_color,
    );
    let path = save_spread(&image, std::path::Path::new(&settings.output_dir), left, right)
        .context("failed to write spread image")?;

    info!("Wrote {}", path.display());
    println!("{}", path.display());

    session.teardown();
    Ok(())
}

#[cfg(not(feature = "pdf"))]
fn run(_cli: &Cli, _settings: &Settings) -> Result<()> {
    anyhow::bail!("flipbook was built without the `pdf` feature; no document engine available")
}
