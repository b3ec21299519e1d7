//! `fwseal` command-line tool
//!
//! Packages raw firmware into encrypted, signed images and verifies them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{arg, value_parser, Arg, ArgMatches, Command};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod inspect;
mod package;
mod verify;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
/// Exit status for an image that parsed but is not authentic
const EXIT_NOT_AUTHENTIC: u8 = 2;

fn key_config_arg() -> Arg {
    arg!(--"key-config" <FILE> "Key configuration file (TOML)")
        .required(false)
        .value_parser(value_parser!(PathBuf))
}

fn symmetric_key_arg() -> Arg {
    arg!(--"symmetric-key" <FILE> "AES-128 key file (16 raw bytes)")
        .required(false)
        .value_parser(value_parser!(PathBuf))
}

fn json_arg() -> Arg {
    arg!(--json "Print machine-readable JSON instead of text")
}

fn cli() -> Command {
    let sub_cmds = vec![
        Command::new("package")
            .about("Encrypt and sign a firmware binary into an image")
            .arg(
                arg!(--"firmware" <FILE> "Raw firmware binary")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"out" <FILE> "Output image file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"signing-key" <FILE> "ECDSA P-256 private key (PEM, DER or raw scalar)")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(symmetric_key_arg())
            .arg(key_config_arg())
            .arg(json_arg()),
        Command::new("verify")
            .about("Decrypt an image and check its digest and signature")
            .arg(
                arg!(--"image" <FILE> "Packaged image file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"verifying-key" <FILE> "ECDSA P-256 public key (PEM, DER or SEC1 point)")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(symmetric_key_arg())
            .arg(key_config_arg())
            .arg(
                arg!(--"out" <FILE> "Write the recovered firmware here if the image is authentic")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(json_arg()),
        Command::new("inspect")
            .about("Decode and print the metadata block of an image")
            .arg(
                arg!(--"image" <FILE> "Packaged image file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(json_arg()),
    ];

    Command::new("fwseal")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommands(sub_cmds)
        .about("Firmware image packaging and verification tools")
}

/// Entry point
fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let result = dispatch(&cli().get_matches());

    if let Err(err) = &result {
        eprintln!("Error: {err:#}");
        if let Some(hint) = err
            .downcast_ref::<fwseal::FwSealError>()
            .and_then(fwseal::FwSealError::suggestion)
        {
            eprintln!("Hint: {hint}");
        }
    }

    ExitCode::from(exit_status(&result))
}

/// Run the selected subcommand; `Ok(false)` means the image was rejected
fn dispatch(matches: &ArgMatches) -> anyhow::Result<bool> {
    match matches.subcommand() {
        Some(("package", args)) => package::run_cmd(args).map(|()| true),
        Some(("verify", args)) => verify::run_cmd(args),
        Some(("inspect", args)) => inspect::run_cmd(args).map(|()| true),
        _ => unreachable!("subcommand_required is set"),
    }
}

/// Process exit status for a subcommand outcome
fn exit_status(result: &anyhow::Result<bool>) -> u8 {
    match result {
        Ok(true) => EXIT_SUCCESS,
        Ok(false) => EXIT_NOT_AUTHENTIC,
        Err(_) => EXIT_FAILURE,
    }
}
