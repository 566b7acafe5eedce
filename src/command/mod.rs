mod common;
mod paths;
mod covar;
mod correct;
mod filter;

use colored::Colorize;

use crate::{Error, err::error};
use common::print_version;

fn print_help() {
    print_version();
    println!("\n{} {} command [arguments]",
        "Usage:".bold(), common::PKG_NAME);

    println!("\n{}", "[ Covariation analysis ]".bold());
    println!("    {:<7}  Find covarying sites and estimate the error model.", "covar".red());

    println!("\n{}", "[ Read processing ]".bold());
    println!("    {:<7}  Replace non-covarying calls with the consensus.", "correct".red());
    println!("    {:<7}  Discard reads with rare allele combinations at covarying sites.", "filter".red());

    println!("\n{}", "[ General help ]".bold());
    println!("    {:<7}  Show this help message.", "help".red());
    println!("    {:<7}  Show version.", "version".red());
}

pub fn run(argv: &[String]) -> Result<(), Error> {
    if argv.len() <= 1 {
        print_help();
        std::process::exit(1);
    }
    match &argv[1] as &str {
        "covar" | "covariation" => covar::run(&argv[2..])?,
        "correct" => correct::run(&argv[2..])?,
        "filter" => filter::run(&argv[2..])?,
        "help" | "h" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-V" => print_version(),
        cmd => {
            print_help();
            return Err(error!(InvalidInput, "Unknown command `{}`", cmd));
        }
    }
    Ok(())
}
