//! bgenix: index a BGEN file, then query and transcode selections of it.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use bgenkit::cli::{collect_unique_ids, OptionError, OptionSet};
use bgenkit::index::store::default_index_path;
use bgenkit::index::IndexQuery;
use bgenkit::transcode;
use bgenkit::View;

const PROGRAM: &str = "bgenix";

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
        .single(
            "-g",
            "Path of bgen file to operate on. (An optional form where \"-g\" is omitted and \
             the filename is specified as the first argument, i.e. bgenix <filename>, can \
             also be used).",
        )
        .required();
    options.single(
        "-i",
        "Path of index file to use. If not specified, bgenix will look for a file of the \
         form '<filename>.bgen.bgi' where '<filename>.bgen' is the bgen file name specified \
         by the -g option.",
    );
    options
        .single(
            "-table",
            "Specify the table (or view) that bgenix should read the file index from. The \
             named table or view should have the same schema as the Variant table written \
             by bgenix on index creation.",
        )
        .default_value("Variant");

    options
        .group("Indexing options")
        .flag(
            "-index",
            "Specify that bgenix should build an index for the BGEN file specified by the \
             -g option.",
        );
    options.flag(
        "-clobber",
        "Specify that bgenix should overwrite existing index file if it exists.",
    );
    options.flag(
        "-with-rowid",
        "Create an index file that does not use the 'WITHOUT ROWID' feature. These are \
         suitable for use with sqlite versions < 3.8.2, but may be less efficient.",
    );

    options
        .group("Variant selection options")
        .multi(
            "-incl-range",
            "Include variants in the specified genomic interval in the output. Each \
             interval must be of the form <chr>:<pos1>-<pos2>; either position may be \
             omitted. Ranges are closed. May be repeated; variants in any range are \
             included. (If the argument is the name of a valid readable file, \
             whitespace-separated values are read from it instead.)",
        );
    options.multi(
        "-excl-range",
        "Exclude variants in the specified genomic interval from the output. See \
         -incl-range for details.",
    );
    options.multi(
        "-incl-rsids",
        "Include variants with the specified rsid(s) in the output. (If the argument is \
         the name of a valid readable file, whitespace-separated rsids are read from it \
         instead.)",
    );
    options.multi(
        "-excl-rsids",
        "Exclude variants with the specified rsid(s) from the output. See -incl-rsids \
         for details.",
    );

    options
        .group("Output options")
        .flag("-list", "Suppress BGEN output; instead output a list of variants.");
    options.flag(
        "-v11",
        "Transcode to BGEN v1.1 format. (Currently, this is only supported if the input \
         is in BGEN v1.2 format with 8 bits per probability, all samples are diploid, and \
         all variants biallelic).",
    );
    options
        .single(
            "-compression-level",
            "Zlib compression level to use when transcoding to BGEN v1.1 format.",
        )
        .default_value("9");
    options.flag(
        "-vcf",
        "Transcode to VCF format. VCFs will have a GP field and a GT field inferred from \
         the probabilities by threshholding.",
    );

    options.positional_alias("-g");
    options.option_excludes_group("-index", "Variant selection options");
    options.option_excludes_group("-index", "Output options");
    options.option_excludes_option("-list", "-v11");
    options.option_excludes_option("-vcf", "-list");
    options.option_excludes_option("-vcf", "-v11");
    options.option_implies_option("-clobber", "-index");
    options.option_implies_option("-compression-level", "-v11");
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

    let bgen_filename = PathBuf::from(options.get("-g").expect("-g is required"));
    let index_filename = options
        .get("-i")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_index_path(&bgen_filename));

    if !bgen_filename.exists() {
        bail!(
            "Error, the BGEN file \"{}\" does not exist!",
            bgen_filename.display()
        );
    }

    if options.check("-index") {
        if index_filename.exists() && !options.check("-clobber") {
            bail!(
                "Error, the index file \"{}\" already exists, use -clobber if you want to \
                 overwrite it.",
                index_filename.display()
            );
        }
        create_bgen_index(&options, &bgen_filename, &index_filename)
    } else {
        process_selection(&options, &bgen_filename, &index_filename)
    }
}

fn create_bgen_index(
    options: &OptionSet,
    bgen_filename: &std::path::Path,
    index_filename: &std::path::Path,
) -> Result<()> {
    eprintln!(
        "{PROGRAM}: creating index for \"{}\" in \"{}\"...",
        bgen_filename.display(),
        index_filename.display()
    );
    let bar = progress_bar("Building BGEN index");
    let count = bgenkit::index::create_index(
        bgen_filename,
        index_filename,
        options.check("-clobber"),
        options.check("-with-rowid"),
        |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        },
    )?;
    bar.finish_and_clear();
    eprintln!("{PROGRAM}: indexed {count} variants.");
    Ok(())
}

fn process_selection(
    options: &OptionSet,
    bgen_filename: &std::path::Path,
    index_filename: &std::path::Path,
) -> Result<()> {
    let mut view = View::open(bgen_filename)?;
    let table = options.get("-table").expect("-table has a default");
    let mut query = IndexQuery::open(index_filename, &table).map_err(|e| {
        anyhow!(
            "Error opening index file \"{}\": {e}\nUse \"{PROGRAM} -g {} -index\" to \
             create the index file.",
            index_filename.display(),
            bgen_filename.display()
        )
    })?;

    for spec in collect_unique_ids(&options.values("-incl-range"))? {
        query.include_range(spec.parse()?);
    }
    for spec in collect_unique_ids(&options.values("-excl-range"))? {
        query.exclude_range(spec.parse()?);
    }
    let incl_rsids = collect_unique_ids(&options.values("-incl-rsids"))?;
    if !incl_rsids.is_empty() {
        query.include_rsids(&incl_rsids);
    }
    let excl_rsids = collect_unique_ids(&options.values("-excl-rsids"))?;
    if !excl_rsids.is_empty() {
        query.exclude_rsids(&excl_rsids);
    }

    {
        let bar = spinner("Building query");
        query.initialise(|found| bar.set_position(found as u64))?;
        bar.finish_and_clear();
    }
    query.verify_metadata(view.file_metadata())?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if options.check("-list") {
        view.set_query(query.plan());
        list_variants(&mut view, &mut out)?;
    } else if options.check("-vcf") {
        view.set_query(query.plan());
        let bar = progress_bar(&format!(
            "Processing {} variants",
            view.number_of_variants()
        ));
        transcode::vcf::transcode_vcf(&mut view, &mut out, |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        })?;
        bar.finish_and_clear();
    } else if options.check("-v11") {
        let level: u32 = {
            let text = options.get("-compression-level").expect("has a default");
            text.parse().map_err(|_| OptionError::InvalidValue {
                option: "-compression-level".into(),
                value: text.clone(),
                reason: "expected an integer in 0..=9".into(),
            })?
        };
        view.set_query(query.plan());
        let bar = progress_bar(&format!(
            "Processing {} variants",
            view.number_of_variants()
        ));
        let count = transcode::v11::transcode_v11(&mut view, &mut out, level, |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        })?;
        bar.finish_and_clear();
        out.flush()?;
        eprintln!("# {PROGRAM}: success, total {count} variants.");
    } else {
        // no transcode: raw byte-range copy directed by the plan
        let plan = query.plan();
        let bar = progress_bar(&format!("Processing {} variants", plan.number_of_variants()));
        let count = transcode::copy_selected(bgen_filename, &plan, &mut out, |done, total| {
            bar.set_length(total);
            bar.set_position(done);
        })?;
        bar.finish_and_clear();
        out.flush()?;
        eprintln!("{PROGRAM}: wrote data for {count} variants to stdout.");
    }
    out.flush()?;
    Ok(())
}

fn list_variants<W: Write>(view: &mut View, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "# {PROGRAM}: started {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(
        out,
        "alternate_ids\trsid\tchromosome\tposition\tnumber_of_alleles\tfirst_allele\talternative_alleles"
    )?;
    let mut count = 0u64;
    while let Some(v) = view.read_variant()? {
        let snp_id = if v.snp_id.is_empty() { "." } else { v.snp_id.as_str() };
        let rsid = if v.rsid.is_empty() { "." } else { v.rsid.as_str() };
        write!(
            out,
            "{snp_id}\t{rsid}\t{}\t{}\t{}\t{}\t",
            v.chromosome,
            v.position,
            v.alleles.len(),
            v.alleles[0]
        )?;
        for (i, allele) in v.alleles[1..].iter().enumerate() {
            if i > 0 {
                write!(out, ",")?;
            }
            write!(out, "{allele}")?;
        }
        writeln!(out)?;
        view.ignore_genotype_data_block()?;
        count += 1;
    }
    writeln!(out, "# {PROGRAM}: success, total {count} variants.")?;
    Ok(())
}

fn progress_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg}: [{bar:40}] {pos}/{len}")
            .expect("static template")
            .progress_chars("=> "),
    );
    bar.set_message(label.to_string());
    bar
}

fn spinner(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(label.to_string());
    bar
}
