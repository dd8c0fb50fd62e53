//! fwimage-inspect: verify a factory image and print its metadata block and section layout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fwimage::{ImageReader, StaticAssets, DEFAULT_ASSET_DIR};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Image produced by build-factory-image
    image: PathBuf,
    /// Directory holding the static blobs the image was built with
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    assets: PathBuf,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let assets = StaticAssets::load(&args.assets)?;
    let reader = ImageReader::open(&args.image, &assets)?;
    let report = reader.report();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "image: {} ({} bytes)",
        args.image.display(),
        report.image_len
    );
    println!(
        "metadata at 0x{:x}, crc32 0x{:08x} (ok)",
        report.metadata_offset,
        report.metadata.crc32_checksum
    );
    for span in &report.sections {
        println!(
            "  {:<8} offset 0x{:08x}  size {} / 0x{:x}",
            span.section.display_name(),
            span.offset,
            span.len,
            span.len
        );
    }
    println!("sha256: {}", report.sha256);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
