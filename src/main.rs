//! # sitereport CLI
//!
//! Usage:
//!   sitereport render report.json -o report.pdf [--config render.json]
//!   sitereport compose report.json --page 0 -o photos-0.png
//!   sitereport example > report.json
//!
//! Set `RUST_LOG=sitereport=debug` to trace page breaks.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sitereport::config::RenderConfig;
use sitereport::error::{ReportError, Result};
use sitereport::font::FontContext;
use sitereport::image_loader::LocalImageLoader;
use sitereport::layout::PhotoGridComposer;
use sitereport::model::PhotoSource;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compose daily site reports into paginated PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a report JSON file (or stdin) to PDF
    Render {
        /// Report JSON; reads stdin when omitted or `-`
        input: Option<PathBuf>,

        /// Output PDF path
        #[arg(short, long, default_value = "report.pdf")]
        output: PathBuf,

        /// Render configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compose one template photo page to PNG
    Compose {
        /// Report JSON with a template photo source
        input: Option<PathBuf>,

        /// Template page index
        #[arg(short, long, default_value = "0")]
        page: u32,

        /// Output PNG path
        #[arg(short, long, default_value = "photos.png")]
        output: PathBuf,

        /// Render configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print an example report JSON
    Example,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitereport=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Render {
            input,
            output,
            config,
        } => render(input.as_deref(), &output, config.as_deref()),
        Command::Compose {
            input,
            page,
            output,
            config,
        } => compose(input.as_deref(), page, &output, config.as_deref()),
        Command::Example => {
            print!("{}", example_report_json());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => Ok(fs::read_to_string(path)?),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::from_path(path),
        None => Ok(RenderConfig::default()),
    }
}

/// Relative image paths resolve next to the input file.
fn loader_for(input: Option<&Path>) -> LocalImageLoader {
    let base = input
        .filter(|p| *p != Path::new("-"))
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    match base {
        Some(dir) => LocalImageLoader::new().with_base_dir(dir),
        None => LocalImageLoader::new(),
    }
}

fn render(input: Option<&Path>, output: &Path, config: Option<&Path>) -> Result<()> {
    let doc = sitereport::parse_report(&read_input(input)?)?;
    let config = load_config(config)?;
    let bytes = sitereport::render(&doc, &config, &loader_for(input))?;
    fs::write(output, &bytes)?;
    eprintln!("✓ Written {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn compose(input: Option<&Path>, page: u32, output: &Path, config: Option<&Path>) -> Result<()> {
    let doc = sitereport::parse_report(&read_input(input)?)?;
    let config = load_config(config)?;
    let PhotoSource::Template {
        template: Some(template),
        entries,
    } = &doc.photos
    else {
        return Err(ReportError::Template(
            "the report has no photo template to compose".to_string(),
        ));
    };

    let fonts = FontContext::with_entries(&config.fonts.custom)?;
    let scale = config.photos.compose_scale;
    let (w, h) = config.page.size.dimensions();
    let composed = PhotoGridComposer::new(&fonts, &config).compose(
        entries,
        template,
        (w * scale).round() as u32,
        (h * scale).round() as u32,
        config.page.margin.scaled(scale),
        page,
        &loader_for(input),
    )?;
    let png = composed.encode_png()?;
    fs::write(output, &png)?;
    eprintln!(
        "✓ Composed {} slots into {}x{} px at {}",
        composed.slots.len(),
        composed.bitmap.width(),
        composed.bitmap.height(),
        output.display()
    );
    Ok(())
}

fn example_report_json() -> &'static str {
    r##"{
  "organization": "Northgate Builders",
  "project": "Harbor View Residences, Tower B",
  "owner": "Harbor View Development LLC",
  "contractor": "Northgate Builders",
  "consultant": "Arcline Engineering",
  "reportNumber": "DR-0142",
  "date": "2024-03-18",
  "temperature": "14 °C",
  "weather": "Overcast, light wind",
  "createdBy": "S. Haddad",
  "location": "Pier Road, Block 7",
  "mapLink": "https://maps.example.com/?q=pier+road+block+7",
  "activities": [
    "Poured the level 6 slab, zones A and B. 84 m³ placed, cylinders taken for 7 and 28 day breaks.",
    "Stripped formwork on the east stair core up to level 5.",
    "صب بلاطة الطابق السادس في المنطقتين A و B"
  ],
  "equipment": [
    "Tower crane TC-2 (Liebherr 280 EC-H)",
    "Concrete pump, 42 m boom"
  ],
  "obstacles": [
    "Pump arrived 50 minutes late; pour started at 08:20 instead of 07:30."
  ],
  "labor": {
    "skilled": "18",
    "unskilled": "11",
    "total": "29"
  },
  "photos": {
    "kind": "template",
    "template": {
      "id": "grid-2x2",
      "columns": 2,
      "rows": 2,
      "slots": [
        { "row": 0, "col": 0 },
        { "row": 0, "col": 1 },
        { "row": 1, "col": 0, "colSpan": 2 }
      ]
    },
    "entries": [
      { "templateId": "grid-2x2", "pageIndex": 0, "slotIndex": 0, "imageRef": "photos/slab-pour.jpg", "caption": "Level 6 slab pour, zone A" },
      { "templateId": "grid-2x2", "pageIndex": 0, "slotIndex": 2, "imageRef": "photos/stair-core.jpg", "caption": "East stair core after stripping" }
    ]
  }
}
"##
}
