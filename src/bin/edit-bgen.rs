//! edit-bgen: rewrite header metadata of existing BGEN files in place.

use std::path::PathBuf;

use anyhow::{bail, Result};

use bgenkit::cli::OptionSet;
use bgenkit::edit::{edit_free_data, remove_sample_identifiers};

const PROGRAM: &str = "edit-bgen";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("!! {e:#}");
        std::process::exit(-1);
    }
}

fn declare_options() -> OptionSet {
    let mut options = OptionSet::new(PROGRAM);
    options
        .group("Input / output file options")
        .multi("-g", "Path of bgen file(s) to edit.")
        .required();
    options.group("Actions").single(
        "-set-free-data",
        "Set new 'free data' field. The argument must be a string with length exactly \
         equal to the length of the existing free data field in each edited file.",
    );
    options.flag(
        "-remove-sample-identifiers",
        "Remove sample identifiers from the file. This zeroes out the sample ID block, \
         if present.",
    );
    options.flag(
        "-really",
        "Really make changes (without this option a dry run is performed with no changes \
         to files.)",
    );
    options
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut options = declare_options();
    options.parse(&args)?;
    if options.check("-help") {
        print!("{}", options.usage());
        return Ok(());
    }

    let files: Vec<PathBuf> = options.values("-g").iter().map(PathBuf::from).collect();
    for file in &files {
        if !file.exists() {
            bail!("Input file \"{}\" does not exist.", file.display());
        }
    }
    let really = options.check("-really");
    let outcome = if really {
        "ok."
    } else {
        "ok (dry run; use -really to really make this change)."
    };

    let mut something_done = false;
    if let Some(free_data) = options.get("-set-free-data") {
        something_done = true;
        for file in &files {
            eprint!(
                "Setting free data for \"{}\" to \"{free_data}\"...",
                file.display()
            );
            edit_free_data(file, free_data.as_bytes(), really)?;
            eprintln!("{outcome}");
        }
    }

    if options.check("-remove-sample-identifiers") {
        something_done = true;
        for file in &files {
            eprint!("Checking sample identifiers for \"{}\"...", file.display());
            if remove_sample_identifiers(file, really)? {
                eprintln!("removing...{outcome}");
            } else {
                eprintln!("no identifiers present; skipping this file.");
            }
        }
    }

    if !something_done {
        eprintln!("!! Nothing to do.");
    }
    Ok(())
}
