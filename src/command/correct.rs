use std::{
    path::PathBuf,
    time::Instant,
};
use colored::Colorize;
use const_format::str_repeat;
use crate::{
    Error,
    err::validate_param,
    ext,
    covar::Params,
};
use super::common::{self, InputArgs};

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
        validate_param!(self.output.is_some(), "Output BAM file is not provided (see -o/--output)");
        validate_param!(self.output != self.input.alignment, "Output BAM file must differ from the input file");
        self.params = self.params.validate()?;
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 18;
    const VAL: usize = 5;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Args::default();
    println!("{}", "Replace calls at non-covarying positions with the consensus.".yellow());

    println!("\n{} {} correct -a reads.bam -o corrected.bam [arguments]",
        "Usage:".bold(), common::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Sorted and indexed BAM file. Only reads aligned\n\
        {EMPTY}  to the first reference sequence are used.",
        "-a, --alignment".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Index of the BAM file [{}].",
        "-x, --index".green(), "FILE".yellow(), "<FILE>.bai|csi".cyan());
    println!("    {:KEY$} {:VAL$}  Output BAM file with corrected reads. Will be indexed.",
        "-o, --output".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Optional: load covariation tests from this CSV file\n\
        {EMPTY}  instead of running them.",
        "    --tests".green(), "FILE".yellow());

    println!("\n{}", "Covariation analysis:".bold());
    println!("    {:KEY$} {:VAL$}  False discovery rate [{}].",
        "    --fdr".green(), "FLOAT".yellow(), common::fmt_def_f64(defaults.params.fdr));
    println!("    {:KEY$} {:VAL$}  Replace calls within this distance from reference ends\n\
        {EMPTY}  with the consensus [{}].",
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

pub(super) fn run(argv: &[String]) -> Result<(), Error> {
    let timer = Instant::now();
    let args = parse_args(argv)?.validate()?;
    let out_path = args.output.as_ref().unwrap();

    let pipeline = super::covar::create_pipeline(&args.input, args.tests.as_deref(), args.params.clone())?;
    let corrector = pipeline.corrector()?;
    log::info!("Correcting reads");
    pipeline.source().rewrite(out_path, |read| corrector.corrected_record(read).map(Some))?;
    log::info!("Success. Total time: {}", ext::fmt::Duration(timer.elapsed()));
    Ok(())
}
