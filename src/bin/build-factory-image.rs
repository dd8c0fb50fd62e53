//! build-factory-image: assemble a factory flash image from rootfs, kernel and optional ramdisk.
//!
//! Static blobs (header, u-boot, metadata templates) are read from `--assets` (default `static/`).
//! Output: one image file, written atomically.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fwimage::{build_factory_image, BuildOptions, DEFAULT_ASSET_DIR};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Output file
    output: PathBuf,
    /// Kernel image
    #[arg(short, long)]
    kernel: PathBuf,
    /// Rootfs image
    #[arg(short, long)]
    rootfs: PathBuf,
    /// Kernel + ramdisk image used as 2nd kernel/system (empty reuses the kernel)
    #[arg(long)]
    ramdisk: Option<OsString>,
    /// Directory holding header.bin, uboot.bin, metadata_header.bin and metadata_footer.bin
    #[arg(long, default_value = DEFAULT_ASSET_DIR)]
    assets: PathBuf,
    /// Also print the build summary as JSON
    #[arg(long)]
    json: bool,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let options = BuildOptions {
        output: args.output,
        kernel: args.kernel,
        rootfs: args.rootfs,
        ramdisk: args.ramdisk.filter(|p| !p.is_empty()).map(PathBuf::from),
        asset_dir: args.assets,
    };
    let summary = build_factory_image(&options)?;

    for line in summary.sizes.report_lines() {
        println!("{}", line);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
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
