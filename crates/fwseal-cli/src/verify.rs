//! `verify` subcommand

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::ArgMatches;
use fwseal::Verifier;

use crate::config::KeyConfig;

/// Run the command
///
/// Returns whether the image is authentic.
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<bool> {
    let start = Instant::now();

    let image_path = args
        .get_one::<PathBuf>("image")
        .with_context(|| "image arg not specified")?;

    let keys = KeyConfig::from_args(args)?;
    let verifying_key = keys.verifying_key()?;
    let symmetric_key = keys.symmetric_key()?;

    let image = std::fs::read(image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;

    let report = Verifier::new(&verifying_key, &symmetric_key)
        .verify(&image)
        .with_context(|| format!("Failed to parse image {}", image_path.display()))?;

    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }

    let authentic = report.is_authentic();
    if let Some(out_path) = args.get_one::<PathBuf>("out") {
        if authentic {
            report
                .write_firmware(out_path)
                .with_context(|| format!("Failed to write firmware {}", out_path.display()))?;
            if !args.get_flag("json") {
                println!("Recovered firmware: {}", out_path.display());
            }
        } else {
            tracing::warn!(path = %out_path.display(), "image not authentic, firmware not written");
        }
    }

    if !args.get_flag("json") {
        println!(
            "Result: {} ({:.3} ms)",
            if authentic { "AUTHENTIC" } else { "REJECTED" },
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(authentic)
}
