use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};
use colored::Colorize;
use const_format::str_repeat;
use crate::{
    Error,
    err::{validate_param, add_path},
    ext,
    covar::{Params, Pipeline, TestResults},
    reads::{AlnSource, BamLocation},
    seq,
};
use super::{
    paths,
    common::{self, InputArgs},
};

struct Args {
    input: InputArgs,
    output: Option<PathBuf>,
    tests: Option<PathBuf>,
    params: Params,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: Default::default(),
            output: None,
            tests: None,
            params: Default::default(),
        }
    }
}

impl Args {
    fn validate(mut self) -> Result<Self, Error> {
        self.input.validate()?;
        validate_param!(self.output.is_some(), "Output directory is not provided (see -o/--output)");
        self.params = self.params.validate()?;
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 18;
    const VAL: usize = 5;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Args::default();
    println!("{}", "Find covarying sites and estimate the error model.".yellow());

    println!("\n{} {} covar -a reads.bam -o out [arguments]",
        "Usage:".bold(), common::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Sorted and indexed BAM file. Only reads aligned\n\
        {EMPTY}  to the first reference sequence are used.",
        "-a, --alignment".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Index of the BAM file [{}].",
        "-x, --index".green(), "FILE".yellow(), "<FILE>.bai|csi".cyan());
    println!("    {:KEY$} {:VAL$}  Output directory.",
        "-o, --output".green(), "DIR".yellow());
    println!("    {:KEY$} {:VAL$}  Optional: load covariation tests from this CSV file\n\
        {EMPTY}  instead of running them.",
        "    --tests".green(), "FILE".yellow());

    println!("\n{}", "Covariation analysis:".bold());
    println!("    {:KEY$} {:VAL$}  False discovery rate [{}].",
        "    --fdr".green(), "FLOAT".yellow(), common::fmt_def_f64(defaults.params.fdr));
    println!("    {:KEY$} {:VAL$}  Allele counts are compared against the 1 - {} quantile\n\
        {EMPTY}  of the background error distribution [{}].",
        "    --err-thresh".green(), "FLOAT".yellow(), "FLOAT".yellow(),
        common::fmt_def_f64(defaults.params.error_threshold));
    println!("    {:KEY$} {:VAL$}  Ignore covarying sites within this distance\n\
        {EMPTY}  from reference ends [{}].",
        "    --end-corr".green(), "INT".yellow(), common::fmt_def(defaults.params.end_correction));
    println!("    {:KEY$} {:VAL$}  Test position pairs in blocks of this size [{}].",
        "    --block-size".green(), "INT".yellow(), common::fmt_def(defaults.params.block_size));

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Number of threads [{}].",
        "-@, --threads".green(), "INT".yellow(), defaults.params.threads.to_string().cyan());

    println!("\n{}", "Other parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Show this help message.", "-h, --help".green(), "");
    println!("    {:KEY$} {:VAL$}  Show version.", "-V, --version".green(), "");
}

fn parse_args(argv: &[String]) -> Result<Args, lexopt::Error> {
    if argv.is_empty() {
        print_help();
        std::process::exit(1);
    }
    use lexopt::prelude::*;
    let mut args = Args::default();
    let mut parser = lexopt::Parser::from_args(argv);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('a') | Long("aln") | Long("alignment") => args.input.alignment = Some(parser.value()?.parse()?),
            Short('x') | Long("index") => args.input.index = Some(parser.value()?.parse()?),
            Short('o') | Long("output") => args.output = Some(parser.value()?.parse()?),
            Long("tests") => args.tests = Some(parser.value()?.parse()?),

            Long("fdr") => args.params.fdr = parser.value()?.parse()?,
            Long("err-thresh") | Long("error-threshold") => args.params.error_threshold = parser.value()?.parse()?,
            Long("end-corr") | Long("end-correction") => args.params.end_correction = parser.value()?.parse()?,
            Long("block-size") => args.params.block_size = parser.value()?.parse()?,
            Short('@') | Long("threads") => args.params.threads = parser.value()?.parse()?,

            Short('V') | Long("version") => {
                common::print_version();
                std::process::exit(0);
            }
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            _ => Err(arg.unexpected())?,
        }
    }
    Ok(args)
}

/// Writes all analysis results into the output directory.
fn write_results(pipeline: &Pipeline<BamLocation>, out_dir: &Path, imported_tests: bool) -> Result<(), Error> {
    let tally = pipeline.tally()?;
    let tests = pipeline.tests()?;
    let sites = pipeline.covarying_sites()?;
    let error_model = pipeline.error_model()?;

    let counts_path = out_dir.join(paths::COUNTS);
    let mut counts_file = ext::sys::create_gzip(&counts_path).map_err(add_path!(counts_path))?;
    tally.write(&mut counts_file, Some(sites)).map_err(add_path!(counts_path))?;
    counts_file.flush().map_err(add_path!(counts_path))?;

    let consensus_path = out_dir.join(paths::CONSENSUS);
    let mut consensus_file = ext::sys::create(&consensus_path).map_err(add_path!(consensus_path))?;
    seq::write_fasta(&mut consensus_file, "consensus", None, &tally.consensus_seq())
        .map_err(add_path!(consensus_path))?;
    consensus_file.flush().map_err(add_path!(consensus_path))?;

    if !imported_tests {
        tests.save(&out_dir.join(paths::TESTS))?;
    }

    let sites_path = out_dir.join(paths::SITES);
    let mut sites_file = ext::sys::create(&sites_path).map_err(add_path!(sites_path))?;
    sites.write(&mut sites_file).map_err(add_path!(sites_path))?;
    sites_file.flush().map_err(add_path!(sites_path))?;

    let errors_path = out_dir.join(paths::ERRORS);
    let mut errors_file = ext::sys::create(&errors_path).map_err(add_path!(errors_path))?;
    error_model.write(&mut errors_file).map_err(add_path!(errors_path))?;
    errors_file.flush().map_err(add_path!(errors_path))?;

    let params = pipeline.params();
    let summary = json::object!{
        reference: pipeline.source().ref_name(),
        ref_len: pipeline.source().ref_len(),
        reads: tally.n_reads(),
        max_read_len: tally.max_read_len(),
        interesting: tally.interesting().count(),
        tests: tests.len(),
        imported_tests: imported_tests,
        covarying_sites: sites.len(),
        error_rate: error_model.rate(),
        significant_alleles: error_model.covarying_errors().iter().filter(|rec| rec.significant).count(),
        params: json::object!{
            fdr: params.fdr,
            err_thresh: params.error_threshold,
            end_corr: params.end_correction,
            block_size: params.block_size,
        },
    };
    let summary_path = out_dir.join(paths::SUMMARY);
    let mut summary_file = ext::sys::create_uncompressed(&summary_path).map_err(add_path!(summary_path))?;
    summary.write_pretty(&mut summary_file, 4).map_err(add_path!(summary_path))?;
    summary_file.flush().map_err(add_path!(summary_path))?;
    Ok(())
}

/// Creates the covariation pipeline, optionally with previously calculated tests.
pub(super) fn create_pipeline(
    input: &InputArgs,
    tests: Option<&Path>,
    params: Params,
) -> Result<Pipeline<BamLocation>, Error>
{
    let pipeline = Pipeline::new(input.location()?, params);
    Ok(match tests {
        Some(path) => pipeline.with_tests(TestResults::load(path)?),
        None => pipeline,
    })
}

pub(super) fn run(argv: &[String]) -> Result<(), Error> {
    let timer = Instant::now();
    let args = parse_args(argv)?.validate()?;
    let out_dir = args.output.as_ref().unwrap();
    ext::sys::mkdir(out_dir).map_err(add_path!(out_dir))?;

    let pipeline = create_pipeline(&args.input, args.tests.as_deref(), args.params.clone())?;
    write_results(&pipeline, out_dir, args.tests.is_some())?;
    log::info!("Success. Total time: {}", ext::fmt::Duration(timer.elapsed()));
    Ok(())
}
