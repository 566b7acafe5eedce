use std::{
    fmt::Display,
    path::PathBuf,
};
use colored::{Colorize, ColoredString};
use crate::{
    Error,
    err::validate_param,
    ext,
    reads::BamLocation,
};

pub(super) const PKG_NAME: &'static str = env!("CARGO_PKG_NAME");

/// Print tool version and authors.
pub(super) fn print_version() {
    println!("{} {}", PKG_NAME.underline(), format!("v{}", env!("CARGO_PKG_VERSION")).green());
    let authors: Vec<_> = env!("CARGO_PKG_AUTHORS").split(':').collect();
    let n = authors.len();
    if n == 0 {
        return;
    }
    print!("Created by ");
    for (i, author) in authors.iter().enumerate() {
        if i == 0 {
            print!("{}", author.bright_blue());
        } else if i < n - 1 {
            print!(", {}", author.bright_blue());
        } else {
            print!(" and {}", author.bright_blue());
        }
    }
    println!();
}

/// Formats default value for the help message.
pub(super) fn fmt_def(defval: impl Display) -> ColoredString {
    defval.to_string().cyan()
}

/// Formats default float value for the help message, without trailing zeros.
pub(super) fn fmt_def_f64(defval: f64) -> ColoredString {
    let s = format!("{:.10}", defval);
    let s = s.trim_end_matches('0');
    let s = s.strip_suffix('.').unwrap_or(s);
    s.cyan()
}

/// Value placeholder for flags without values.
pub(super) fn flag() -> ColoredString {
    "".yellow()
}

/// Input alignment file and its optional index.
#[derive(Default)]
pub(super) struct InputArgs {
    pub alignment: Option<PathBuf>,
    pub index: Option<PathBuf>,
}

impl InputArgs {
    pub fn validate(&self) -> Result<(), Error> {
        validate_param!(self.alignment.is_some(), "Input alignment file is not provided (see -a/--alignment)");
        Ok(())
    }

    /// Opens input alignment file and finds its index.
    pub fn location(&self) -> Result<BamLocation, Error> {
        let path = self.alignment.as_ref().expect("Input alignment file must be present");
        let location = BamLocation::new(path, self.index.clone())?;
        log::info!("Using alignments {} (index {})", ext::fmt::path(location.path()), ext::fmt::path(location.index()));
        log::info!("    Reference {}, {} bp", location.ref_name(), crate::reads::AlnSource::ref_len(&location));
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_defaults() {
        colored::control::set_override(false);
        assert_eq!(fmt_def_f64(0.001).to_string(), "0.001");
        assert_eq!(fmt_def_f64(1e-3).to_string(), "0.001");
        assert_eq!(fmt_def_f64(250.0).to_string(), "250");
        assert_eq!(fmt_def(20).to_string(), "20");
    }
}
