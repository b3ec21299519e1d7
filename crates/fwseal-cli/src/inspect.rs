//! `inspect` subcommand

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;
use fwseal::SealedImage;

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let image_path = args
        .get_one::<PathBuf>("image")
        .with_context(|| "image arg not specified")?;

    let image = SealedImage::open(image_path)
        .with_context(|| format!("Failed to parse image {}", image_path.display()))?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(image.metadata())?);
    } else {
        println!("Metadata of {}:", image_path.display());
        println!("{}", image.metadata());
    }

    Ok(())
}
