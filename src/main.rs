use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use docufy_region::Viewer;
use docufy_region::clipboard::SystemClipboard;
use docufy_region::extract::{OcrClient, RegionScheme};
use docufy_region::panic_handler;
use docufy_region::pdf::{
    DocumentLoader, FitMode, PixelRect, PointerButton, RenderService, Rotation, Size, SourceFile,
};
use docufy_region::settings::{self, Settings};

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "docufy-region")]
#[command(about = "Select page regions of PDFs and images and extract their text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OCR service base URL (overrides the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[arg(long, global = true, default_value = "docufy-region.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show page count, page sizes and baked rotations
    Info { file: PathBuf },

    /// Render one page to a PNG file
    Render {
        file: PathBuf,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Select a rectangle on a page and extract its text
    Extract {
        file: PathBuf,

        #[command(flatten)]
        view: ViewArgs,

        /// Selection in page view pixels: x,y,w,h
        #[arg(long, value_parser = parse_rect)]
        rect: PixelRect,

        #[arg(long)]
        lang: Option<String>,

        #[arg(long)]
        recipe: Option<String>,

        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,

        /// Copy the extracted text to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// OCR whole documents
    Ocr {
        /// One file goes to /extract, several to /extract/multi
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        dpi: Option<u32>,

        #[arg(long)]
        lang: Option<String>,
    },

    /// Check that the OCR service is up
    Health,
}

#[derive(Args)]
struct ViewArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Manual scale; disables fitting
    #[arg(long, conflicts_with = "fit")]
    scale: Option<f32>,

    #[arg(long, value_enum)]
    fit: Option<FitArg>,

    /// Quarter turns clockwise (negative for counter-clockwise)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rotate: i32,

    /// Available box for fitting: WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size, default_value = "1200x900")]
    container: Size,

    /// Device pixel ratio of the rendered raster
    #[arg(long)]
    dpr: Option<f32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FitArg {
    Page,
    Width,
}

impl From<FitArg> for FitMode {
    fn from(arg: FitArg) -> Self {
        match arg {
            FitArg::Page => FitMode::Page,
            FitArg::Width => FitMode::Width,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemeArg {
    Points,
    Fractional,
}

impl From<SchemeArg> for RegionScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Points => RegionScheme::Points,
            SchemeArg::Fractional => RegionScheme::Fractional,
        }
    }
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width: f32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: f32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    let size = Size::new(width, height);
    if !size.is_usable() {
        return Err(format!("container must be positive, got {s:?}"));
    }
    Ok(size)
}

fn parse_rect(s: &str) -> Result<PixelRect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("bad rectangle {s:?}: {e}"))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(PixelRect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected x,y,w,h, got {s:?}")),
    }
}

#[cfg(feature = "pdf")]
fn loader_for(file: &SourceFile) -> Result<Arc<dyn DocumentLoader>> {
    Ok(Arc::new(docufy_region::pdf::MupdfLoader::new(file)))
}

#[cfg(not(feature = "pdf"))]
fn loader_for(_file: &SourceFile) -> Result<Arc<dyn DocumentLoader>> {
    bail!("built without the `pdf` feature, no document backend available")
}

fn read_source(path: &Path) -> Result<SourceFile> {
    SourceFile::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn client(settings: &Settings) -> Result<OcrClient> {
    OcrClient::new(&settings.client_config()).context("Failed to create HTTP client")
}

/// Open `path`, apply the view arguments and wait for the page to render
fn open_viewer(path: &Path, view: &ViewArgs, settings: &Settings) -> Result<Viewer> {
    let source = read_source(path)?;
    let loader = loader_for(&source)?;

    let mut options = settings.viewer_options();
    if let Some(fit) = view.fit {
        options.default_fit_mode = fit.into();
    }
    if let Some(dpr) = view.dpr {
        options.device_pixel_ratio = dpr;
    }

    let mut viewer = Viewer::new(&options, client(settings)?, Box::new(SystemClipboard))
        .with_region_scheme(settings.region_scheme)
        .with_hints(settings.extraction_hints())
        .with_cache_size(settings.render_cache_size);

    viewer.resize(view.container);
    viewer
        .open_with(source, loader)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    if view.page != 1 {
        viewer.go_to_page(view.page);
    }
    let quarter_turns = view.rotate.rem_euclid(4);
    for _ in 0..quarter_turns {
        viewer.rotate_clockwise();
    }
    if let Some(scale) = view.scale {
        viewer.set_scale(scale);
    }

    if !viewer.wait_for_render(RENDER_TIMEOUT) {
        bail!(
            "{}",
            viewer
                .error()
                .unwrap_or_else(|| "page did not render".to_string())
        );
    }
    if let Some(error) = viewer.error() {
        bail!(error);
    }
    Ok(viewer)
}

fn run_info(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let service = RenderService::new(loader_for(&source)?)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let info = service.document_info();

    println!("{}: {} page(s)", source.name, info.page_count);
    for (idx, page) in info.pages.iter().enumerate() {
        let page = match page {
            Ok(page) => page,
            Err(error) => {
                println!("  page {}: unreadable ({error})", idx + 1);
                continue;
            }
        };
        let rotation = if page.baked_rotation == Rotation::R0 {
            String::new()
        } else {
            format!(", rotated {}", page.baked_rotation)
        };
        println!(
            "  page {}: {:.1} x {:.1} pt{rotation}",
            page.number, page.size.width, page.size.height
        );
    }
    Ok(())
}

fn run_render(path: &Path, view: &ViewArgs, out: &Path, settings: &Settings) -> Result<()> {
    let viewer = open_viewer(path, view, settings)?;
    let page = viewer
        .rendered_page()
        .ok_or_else(|| anyhow!("no page rendered"))?;

    let image = image::RgbImage::from_raw(
        page.image.width_px,
        page.image.height_px,
        page.image.pixels.clone(),
    )
    .ok_or_else(|| anyhow!("raster buffer does not match its dimensions"))?;
    image
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "page {} at scale {} rotation {} -> {} ({}x{} px)",
        page.page,
        page.viewport.scale,
        page.viewport.rotation,
        out.display(),
        page.image.width_px,
        page.image.height_px
    );
    Ok(())
}

struct ExtractArgs<'a> {
    rect: PixelRect,
    lang: Option<&'a str>,
    recipe: Option<&'a str>,
    scheme: Option<SchemeArg>,
    copy: bool,
}

fn run_extract(path: &Path, view: &ViewArgs, args: &ExtractArgs<'_>, settings: &Settings) -> Result<()> {
    let mut settings = settings.clone();
    if let Some(lang) = args.lang {
        settings.language = Some(lang.to_string());
    }
    if let Some(recipe) = args.recipe {
        settings.recipe = Some(recipe.to_string());
    }
    if let Some(scheme) = args.scheme {
        settings.region_scheme = scheme.into();
    }

    let mut viewer = open_viewer(path, view, &settings)?;

    let rect = args.rect;
    viewer.pointer_down(rect.top_left(), PointerButton::Primary);
    viewer.pointer_move(rect.bottom_right());
    viewer.pointer_up(Some(rect.bottom_right()));
    if !viewer.can_extract() {
        bail!("selection {rect:?} is too small or outside the page");
    }

    viewer.extract()?;
    let timeout = settings.client_config().timeout + Duration::from_secs(5);
    if !viewer.wait_for_extraction(timeout) {
        bail!("extraction did not finish within {timeout:?}");
    }
    if let Some(error) = viewer.error() {
        bail!(error);
    }

    let result = viewer
        .extraction_result()
        .ok_or_else(|| anyhow!("no extraction result"))?
        .clone();
    if let Some(method) = result.method {
        println!("[{method}]");
    }
    println!("{}", result.text);

    if args.copy && !viewer.copy_result_to_clipboard() {
        eprintln!("Could not copy to clipboard");
    }
    Ok(())
}

fn run_ocr(paths: &[PathBuf], dpi: Option<u32>, lang: Option<&str>, settings: &Settings) -> Result<()> {
    let sources = paths
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>>>()?;
    let lang = lang.map(str::to_string).or_else(|| settings.language.clone());
    let client = client(settings)?;

    if let [source] = sources.as_slice() {
        let extraction = client.extract_document(source, dpi, lang.as_deref())?;
        info!(
            "OCR of {} returned {} words",
            extraction.filename,
            extraction.words.len()
        );
        println!("{}", extraction.text);
        return Ok(());
    }

    let mut failed = 0;
    for extraction in client.extract_documents(&sources, dpi, lang.as_deref())? {
        println!("== {}", extraction.filename);
        match extraction.error {
            Some(error) => {
                failed += 1;
                eprintln!("OCR of {} failed: {error}", extraction.filename);
            }
            None => println!("{}", extraction.text),
        }
    }
    if failed > 0 {
        bail!("{failed} of {} file(s) failed", sources.len());
    }
    Ok(())
}

fn run_health(settings: &Settings) -> Result<()> {
    let client = client(settings)?;
    if !client.health()? {
        bail!("{} is not healthy", client.base_url());
    }
    let version = client.version()?;
    println!(
        "{}: ok (service {}, docuocr {})",
        client.base_url(),
        version.service,
        version.docuocr
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("Failed to create log file {}", cli.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    settings::load_settings();
    let mut settings = settings::current();
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    if let Some(timeout) = cli.timeout {
        settings.request_timeout_secs = timeout;
    }
    info!("Using OCR service at {}", settings.api_base_url);

    match &cli.command {
        Commands::Info { file } => run_info(file),
        Commands::Render { file, view, out } => run_render(file, view, out, &settings),
        Commands::Extract {
            file,
            view,
            rect,
            lang,
            recipe,
            scheme,
            copy,
        } => run_extract(
            file,
            view,
            &ExtractArgs {
                rect: *rect,
                lang: lang.as_deref(),
                recipe: recipe.as_deref(),
                scheme: *scheme,
                copy: *copy,
            },
            &settings,
        ),
        Commands::Ocr { files, dpi, lang } => run_ocr(files, *dpi, lang.as_deref(), &settings),
        Commands::Health => run_health(&settings),
    }
}
