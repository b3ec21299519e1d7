//! `package` subcommand

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::ArgMatches;
use fwseal::Packager;

use crate::config::KeyConfig;

/// Run the command
pub(crate) fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let start = Instant::now();

    let firmware_path = args
        .get_one::<PathBuf>("firmware")
        .with_context(|| "firmware arg not specified")?;
    let out_path = args
        .get_one::<PathBuf>("out")
        .with_context(|| "out arg not specified")?;

    let keys = KeyConfig::from_args(args)?;
    let signing_key = keys.signing_key()?;
    let symmetric_key = keys.symmetric_key()?;

    let firmware = std::fs::read(firmware_path)
        .with_context(|| format!("Failed to read firmware {}", firmware_path.display()))?;

    let summary = Packager::new(&signing_key, &symmetric_key)
        .package_to_file(firmware, out_path)
        .with_context(|| format!("Failed to package {}", firmware_path.display()))?;

    if args.get_flag("json") {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
        println!("Output image            : {}", out_path.display());
        println!(
            "Time taken              : {:.3} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(())
}
