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
    /// Use covariation test instead of the frequency threshold to find sites.
    covar: bool,
    params: Params,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: Default::default(),
            output: None,
            tests: None,
            covar: false,
            params: Default::default(),
        }
    }
}

impl Args {
    fn validate(mut self) -> Result<Self, Error> {
        self.input.validate()?;
        validate_param!(self.output.is_some(), "Output BAM file is not provided (see -o/--output)");
        validate_param!(self.output != self.input.alignment, "Output BAM file must differ from the input file");
        if self.tests.is_some() {
            self.covar = true;
        }
        self.params = self.params.validate()?;
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 18;
    const VAL: usize = 5;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Args::default();
    println!("{}", "Discard reads with rare allele combinations at covarying sites.".yellow());

    println!("\n{} {} filter -a reads.bam -o filtered.bam [arguments]",
        "Usage:".bold(), common::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Sorted and indexed BAM file. Only reads aligned\n\
        {EMPTY}  to the first reference sequence are used.",
        "-a, --alignment".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Index of the BAM file [{}].",
        "-x, --index".green(), "FILE".yellow(), "<FILE>.bai|csi".cyan());
    println!("    {:KEY$} {:VAL$}  Output BAM file with filtered reads. Will be indexed.",
        "-o, --output".green(), "FILE".yellow());

    println!("\n{}", "Read filtering:".bold());
    println!("    {:KEY$} {:VAL$}  Number of consecutive covarying sites in a k-mer [{}].",
        "-k, --kmer".green(), "INT".yellow(), common::fmt_def(defaults.params.kmer_size));
    println!("    {:KEY$} {:VAL$}  Discard reads with k-mers, observed in fewer reads [{}].",
        "-c, --cutoff".green(), "INT".yellow(), common::fmt_def(defaults.params.kmer_cutoff));
    println!("    {:KEY$} {:VAL$}  Discard reads with query length not exceeding this [{}].",
        "-m, --min-len".green(), "INT".yellow(), common::fmt_def(defaults.params.min_length));

    println!("\n{}", "Covarying sites:".bold());
    println!("    {:KEY$} {:VAL$}  By default, a site is covarying if at least two nucleotides\n\
        {EMPTY}  have frequency over {} [{}].",
        "    --freq-thresh".green(), "FLOAT".yellow(), "FLOAT".yellow(),
        common::fmt_def_f64(defaults.params.freq_threshold));
    println!("    {:KEY$} {:VAL$}  Find covarying sites using the covariation test.",
        "    --covar".green(), common::flag());
    println!("    {:KEY$} {:VAL$}  Load covariation tests from this CSV file (implies {}).",
        "    --tests".green(), "FILE".yellow(), "--covar".green());
    println!("    {:KEY$} {:VAL$}  False discovery rate for the covariation test [{}].",
        "    --fdr".green(), "FLOAT".yellow(), common::fmt_def_f64(defaults.params.fdr));
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

            Short('k') | Long("kmer") => args.params.kmer_size = parser.value()?.parse()?,
            Short('c') | Long("cutoff") => args.params.kmer_cutoff = parser.value()?.parse()?,
            Short('m') | Long("min-len") | Long("min-length") => args.params.min_length = parser.value()?.parse()?,

            Long("freq-thresh") | Long("freq-threshold") => args.params.freq_threshold = parser.value()?.parse()?,
            Long("covar") => args.covar = true,
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
    let filter = pipeline.kmer_filter(args.covar)?;
    log::info!("Filtering reads");
    pipeline.source().rewrite(out_path,
        |read| Ok(if filter.keep(read.name(), read.query_len()) { Some(read.record().clone()) } else { None }))?;
    log::info!("Success. Total time: {}", ext::fmt::Duration(timer.elapsed()));
    Ok(())
}
