use gloss_common::ExportConfig;
use gloss_common::telemetry::{self, TelemetryConfig};
use gloss_renderer::{
    Exporter, HighlightSpan, PandocConverter, TagColors, build_regions, strip_pdf_string_markers,
    tokenize, visible_text,
};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Gloss - compile overlapping highlights into annotated LaTeX", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a .json or .toml export config
    #[arg(long, global = true, env = "GLOSS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a document and its highlights to LaTeX
    Export {
        /// HTML document the highlights were made against
        document: PathBuf,

        /// JSON array of highlights
        highlights: PathBuf,

        /// JSON map of tag id to colour or {name, color}
        #[arg(long)]
        tags: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit a complete document instead of a body fragment
        #[arg(long)]
        standalone: bool,
    },
    /// Print the visible text that highlight offsets refer to
    Text {
        /// HTML document
        document: PathBuf,
    },
    /// Print the regions of an already converted, sentinel-bearing file
    Regions {
        /// Converter output containing highlight sentinels
        converted: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::from_env("gloss-cli"));

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Export {
            document,
            highlights,
            tags,
            output,
            standalone,
        } => {
            export(
                config,
                &document,
                &highlights,
                tags.as_deref(),
                output.as_deref(),
                standalone,
            )
            .await?;
        }
        Commands::Text { document } => print_text(&config, &document)?,
        Commands::Regions { converted } => print_regions(&converted)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    let config = match path {
        Some(path) => ExportConfig::load(path)?.with_env_overrides()?,
        None => ExportConfig::from_env()?,
    };
    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

async fn export(
    config: ExportConfig,
    document: &Path,
    highlights: &Path,
    tags: Option<&Path>,
    output: Option<&Path>,
    standalone: bool,
) -> Result<()> {
    let markup = read(document)?;
    let spans: Vec<HighlightSpan> = serde_json::from_str(&read(highlights)?)
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid highlights in {}", highlights.display()))?;
    let tags: TagColors = match tags {
        Some(path) => serde_json::from_str(&read(path)?)
            .into_diagnostic()
            .wrap_err_with(|| format!("invalid tag map in {}", path.display()))?,
        None => TagColors::new(),
    };

    let converter = PandocConverter::from_config(&config.converter);
    let exporter = Exporter::new(config, tags).standalone(standalone);
    let result = exporter.export(&markup, &spans, &converter).await?;

    for skipped in &result.skipped {
        eprintln!(
            "⚠ Skipped highlight {} [{}, {}): {:?}",
            skipped.id, skipped.start, skipped.end, skipped.reason
        );
    }

    match output {
        Some(path) => {
            std::fs::write(path, &result.latex)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "✓ {} highlights, {} regions",
                spans.len() - result.skipped.len(),
                result.region_count
            );
            eprintln!("✓ Output: {}", path.display());
        }
        None => print!("{}", result.latex),
    }
    Ok(())
}

fn print_text(config: &ExportConfig, document: &Path) -> Result<()> {
    let visible = visible_text(&read(document)?, config.text.whitespace);
    println!("{}", visible.text);
    eprintln!("{} units", visible.len());
    Ok(())
}

fn print_regions(converted: &Path) -> Result<()> {
    let converted = read(converted)?;
    let converted = strip_pdf_string_markers(&converted);
    let tokens = tokenize(&converted)?;
    let regions = build_regions(&tokens);
    let json = serde_json::to_string_pretty(&regions).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
