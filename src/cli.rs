// Command-line flags: --verbose, --help, --backend <name>, --output <name>
//
// Hand-rolled over `std::env::args()` rather than pulling in an
// argument-parsing crate - this process has exactly four flags, not
// enough surface to justify a dependency.

use std::fmt;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub verbose: bool,
    pub help: bool,
    pub backend: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

pub const USAGE: &str = "\
usage: squall [options]

options:
  --verbose          enable verbose logging (overrides SQUALL_LOG)
  --backend <name>    select a backend implementation
  --output <name>      select a specific output by name
  --help               print this message and exit
";

/// Parses argv (excluding argv[0]). Unknown flags and missing values
/// for --backend/--output are rejected with ParseError.
pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Args, ParseError> {
    let mut parsed = Args::default();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--verbose" => parsed.verbose = true,
            "--help" => parsed.help = true,
            "--backend" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ParseError("--backend requires a value".to_string()))?;
                parsed.backend = Some(value);
            }
            "--output" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ParseError("--output requires a value".to_string()))?;
                parsed.output = Some(value);
            }
            other => return Err(ParseError(format!("unrecognized argument: {}", other))),
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_args_is_all_defaults() {
        assert_eq!(parse(args(&[])).unwrap(), Args::default());
    }

    #[test]
    fn verbose_and_help_are_flags() {
        let parsed = parse(args(&["--verbose", "--help"])).unwrap();
        assert!(parsed.verbose);
        assert!(parsed.help);
    }

    #[test]
    fn backend_and_output_take_values() {
        let parsed = parse(args(&["--backend", "headless", "--output", "HDMI-1"])).unwrap();
        assert_eq!(parsed.backend.as_deref(), Some("headless"));
        assert_eq!(parsed.output.as_deref(), Some("HDMI-1"));
    }

    #[test]
    fn backend_without_value_is_an_error() {
        assert!(parse(args(&["--backend"])).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse(args(&["--bogus"])).is_err());
    }
}
