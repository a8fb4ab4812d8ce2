//! cat-bgen: concatenate BGEN files that share a sample set and flags.

use std::path::PathBuf;

use anyhow::{bail, Result};

use bgenkit::cat::{concatenate, CatOptions};
use bgenkit::cli::OptionSet;

const PROGRAM: &str = "cat-bgen";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("!! {e:#}");
        std::process::exit(-1);
    }
}

fn declare_options() -> OptionSet {
    let mut options = OptionSet::new(PROGRAM);
    options.group("Input / output file options").multi(
        "-g",
        "Path of bgen file(s) to concatenate. These must all be bgen files containing the \
         same set of samples (in the same order), stored with the same flags.",
    );
    options
        .single("-og", "Path of bgen file to output.")
        .required();
    options.single(
        "-set-free-data",
        "Set free data in the resulting file to the given string value.",
    );
    options.flag(
        "-omit-sample-identifier-block",
        "Omit the sample identifier block in the output, even if one is present in the \
         first input file.",
    );
    options.flag(
        "-clobber",
        "Overwrite existing output file if it exists.",
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

    let output = PathBuf::from(options.get("-og").expect("-og is required"));
    if output.exists() && !options.check("-clobber") {
        bail!(
            "Output file \"{}\" exists. Use -clobber if you want me to overwrite it.",
            output.display()
        );
    }

    let inputs: Vec<PathBuf> = options.values("-g").iter().map(PathBuf::from).collect();
    if inputs.is_empty() {
        bail!("No input files specified; quitting.");
    }
    for input in &inputs {
        if !input.exists() {
            bail!("Input file \"{}\" does not exist.", input.display());
        }
    }

    let cat_options = CatOptions {
        set_free_data: options.get("-set-free-data").map(String::into_bytes),
        omit_sample_identifier_block: options.check("-omit-sample-identifier-block"),
    };
    let result = concatenate(&inputs, &output, &cat_options)?;
    eprintln!(
        "Finished writing \"{}\" ({} samples, {} variants).",
        output.display(),
        result.number_of_samples,
        result.number_of_variants
    );
    Ok(())
}
