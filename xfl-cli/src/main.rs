use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use xfl_model::{open, NullObserver, ParseError, ParseOptions};

#[derive(Parser)]
#[command(name = "xfl", about = "Inspect XFL/FLA archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an archive and print a summary of its scene graph.
    Inspect(InspectArgs),
}

#[derive(Parser)]
struct InspectArgs {
    /// Path to the .xfl or .fla archive.
    path: PathBuf,

    /// Resolve and print the flattened element list for this frame.
    #[arg(long)]
    frame: Option<u32>,

    /// Timeline to resolve `--frame` against; defaults to the document's
    /// first timeline.
    #[arg(long)]
    timeline: Option<String>,

    /// Skip decoding `.dat` bitmap payloads.
    #[arg(long)]
    skip_bitmaps: bool,
}

const EXIT_MALFORMED_ARCHIVE: u8 = 2;
const EXIT_MALFORMED_XML: u8 = 3;
const EXIT_BITMAP_DECODE_FAILED: u8 = 4;
const EXIT_CANCELLED: u8 = 5;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_inspect(args: InspectArgs) -> ExitCode {
    let bytes = match fs::read(&args.path) {
        Ok(b) => b,
        Err(e) => {
            error!("could not read {}: {e}", args.path.display());
            return ExitCode::from(EXIT_MALFORMED_ARCHIVE);
        }
    };

    let options = ParseOptions {
        skip_bitmaps: args.skip_bitmaps,
        ..ParseOptions::default()
    };
    let mut observer = NullObserver;

    let document = match open(bytes, &options, &mut observer) {
        Ok(doc) => doc,
        Err(ParseError::Archive(e)) => {
            error!("{e}");
            return ExitCode::from(EXIT_MALFORMED_ARCHIVE);
        }
        Err(ParseError::Malformed { reason }) => {
            error!("{reason}");
            return ExitCode::from(EXIT_MALFORMED_XML);
        }
        Err(ParseError::Cancelled) => {
            error!("parsing cancelled");
            return ExitCode::from(EXIT_CANCELLED);
        }
    };

    println!(
        "{}x{} @ {} fps, background {}",
        document.width, document.height, document.frame_rate, document.background_color
    );
    println!("timelines: {}", document.timelines.len());
    println!("symbols: {}", document.symbols.len());
    println!("bitmaps: {}", document.bitmaps.len());
    println!("sounds: {}", document.sounds.len());
    println!("videos: {}", document.videos.len());

    let failed_bitmaps = document
        .bitmaps
        .values()
        .filter(|b| !args.skip_bitmaps && b.bitmap_data_href.is_some() && b.raster.is_none())
        .count();
    if failed_bitmaps > 0 {
        error!("{failed_bitmaps} bitmap(s) failed to decode after recovery");
    }

    if let Some(frame_index) = args.frame {
        let timeline_name = args
            .timeline
            .clone()
            .or_else(|| document.timelines.first().map(|t| t.name.clone()))
            .unwrap_or_default();
        let resolved = xfl_resolve::resolve_frame(&document, &timeline_name, frame_index);
        println!(
            "frame {frame_index} of '{timeline_name}': {} elements",
            resolved.elements.len()
        );
        for (i, element) in resolved.elements.iter().enumerate() {
            println!(
                "  [{i}] matrix=({:.2},{:.2},{:.2},{:.2},{:.2},{:.2}) blend={}",
                element.matrix.a,
                element.matrix.b,
                element.matrix.c,
                element.matrix.d,
                element.matrix.tx,
                element.matrix.ty,
                element.blend_mode
            );
        }
    }

    if failed_bitmaps > 0 {
        ExitCode::from(EXIT_BITMAP_DECODE_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}
