use clap::Parser;
use std::path::PathBuf;

/// Turn Banca Etica and PayPal exports into one clean transaction list.
#[derive(Parser, Debug)]
#[command(name = "bepp", version)]
pub struct Args {
    /// Directory holding the .xls/.xlsx/.ods and .csv exports
    pub directory: PathBuf,

    /// Where to write results [default: DIRECTORY/bepp_export]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write a single merged BEPP.csv instead of one file per source
    #[arg(short, long)]
    pub merge: bool,

    /// Also write the concatenated original exports
    #[arg(short, long)]
    pub backup: bool,

    /// Convert foreign-currency amounts to the reporting currency
    #[arg(short, long)]
    pub convert: bool,

    /// Process everything but write nothing
    #[arg(short, long)]
    pub dry_run: bool,

    /// Keep ledger rows that duplicate PayPal transactions
    #[arg(short = 'p', long)]
    pub keep_pp_dupes: bool,

    /// Reporting currency for --convert
    #[arg(long, value_name = "CODE")]
    pub currency: Option<String>,

    /// Local ECB rate history to use instead of downloading rates
    #[arg(long, value_name = "FILE")]
    pub rates: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.directory.join("bepp_export"))
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags() {
        let args = Args::try_parse_from(["bepp", "in", "-m", "-b", "-c", "-d", "-p"]).unwrap();
        assert!(args.merge && args.backup && args.convert && args.dry_run && args.keep_pp_dupes);
        assert_eq!(args.output_dir(), PathBuf::from("in").join("bepp_export"));
    }

    #[test]
    fn explicit_output_and_currency() {
        let args = Args::try_parse_from([
            "bepp",
            "in",
            "-o",
            "out",
            "--currency",
            "chf",
            "--rates",
            "eurofxref-hist.csv",
        ])
        .unwrap();
        assert_eq!(args.output_dir(), PathBuf::from("out"));
        assert_eq!(args.currency.as_deref(), Some("chf"));
        assert_eq!(args.rates, Some(PathBuf::from("eurofxref-hist.csv")));
        assert!(!args.merge);
    }

    #[test]
    fn directory_is_required() {
        assert!(Args::try_parse_from(["bepp"]).is_err());
    }
}
