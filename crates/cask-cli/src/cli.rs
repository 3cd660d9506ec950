use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cask_store::{CheckoutStrategy, PutStrategy};

#[derive(Parser)]
#[command(
    name = "cask",
    about = "Cask — content-addressable file storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root directory
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new store
    Init(InitArgs),
    /// Store a file under its content address
    Put(PutArgs),
    /// Store every regular file in a directory
    PutDir(PutDirArgs),
    /// Look up a checksum and print its stored path
    Get(GetArgs),
    /// Write stored content to stdout
    Cat(CatArgs),
    /// Materialize stored content at a destination path
    Checkout(CheckoutArgs),
    /// Remove stored content (absence is not an error)
    Delete(DeleteArgs),
    /// List all stored files
    List,
    /// Count stored files
    Count,
    /// Total size in bytes of stored files
    Size,
    /// Report misfiled entries without touching them
    Scan(ScanArgs),
    /// Move or delete misfiled entries back to their addresses
    Repair,
}

/// CLI-facing put strategy names, mapped onto [`PutStrategy`].
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum PutStrategyArg {
    /// Rename into scratch first, checksum after (most corruption-resistant)
    Early,
    /// Checksum in place, rename at the end
    Late,
    /// Stream-copy while checksumming (source untouched, works across volumes)
    Copy,
}

impl From<PutStrategyArg> for PutStrategy {
    fn from(arg: PutStrategyArg) -> Self {
        match arg {
            PutStrategyArg::Early => PutStrategy::EarlyAtomicRename,
            PutStrategyArg::Late => PutStrategy::LateAtomicRename,
            PutStrategyArg::Copy => PutStrategy::Copy,
        }
    }
}

#[derive(Args)]
pub struct InitArgs {
    /// Number of shard-directory levels
    #[arg(long, default_value_t = 1)]
    pub prefix_depth: u32,

    /// Checksum characters per shard level
    #[arg(long, default_value_t = 2)]
    pub prefix_width: u32,

    /// File permission bits, octal
    #[arg(long, default_value = "400", value_parser = parse_octal)]
    pub fmode: u32,

    /// Directory permission bits, octal
    #[arg(long, default_value = "700", value_parser = parse_octal)]
    pub dmode: u32,

    /// Default put strategy
    #[arg(long, value_enum, default_value_t = PutStrategyArg::Copy)]
    pub strategy: PutStrategyArg,
}

#[derive(Args)]
pub struct PutArgs {
    /// File to store
    pub source: PathBuf,

    /// Override the store's default put strategy
    #[arg(long, value_enum)]
    pub strategy: Option<PutStrategyArg>,

    /// Print progress while hashing
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args)]
pub struct PutDirArgs {
    /// Directory whose files to store
    pub dir: PathBuf,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Override the store's default put strategy
    #[arg(long, value_enum)]
    pub strategy: Option<PutStrategyArg>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Content checksum
    pub checksum: String,
}

#[derive(Args)]
pub struct CatArgs {
    /// Content checksum
    pub checksum: String,
}

#[derive(Args)]
pub struct CheckoutArgs {
    /// Content checksum
    pub checksum: String,

    /// Destination path
    pub dest: PathBuf,

    /// Create a symbolic link instead of a verified copy
    #[arg(long)]
    pub link: bool,

    /// Compute what would happen without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl CheckoutArgs {
    pub fn strategy(&self) -> CheckoutStrategy {
        if self.link {
            CheckoutStrategy::SymbolicLink
        } else {
            CheckoutStrategy::Copy
        }
    }
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Content checksum
    pub checksum: String,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Trust the checksum implied by each file's location instead of
    /// rehashing content (fast, assumes shard structure is correct)
    #[arg(long)]
    pub trust_paths: bool,
}

fn parse_octal(raw: &str) -> Result<u32, String> {
    u32::from_str_radix(raw, 8).map_err(|err| format!("not an octal mode: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_modes_parse() {
        assert_eq!(parse_octal("400").unwrap(), 0o400);
        assert_eq!(parse_octal("750").unwrap(), 0o750);
        assert!(parse_octal("9z").is_err());
    }

    #[test]
    fn cli_parses_put_with_strategy() {
        let cli = Cli::try_parse_from([
            "cask", "--root", "/tmp/store", "put", "file.bin", "--strategy", "early",
        ])
        .unwrap();
        match cli.command {
            Command::Put(args) => {
                assert_eq!(args.source, PathBuf::from("file.bin"));
                assert!(matches!(args.strategy, Some(PutStrategyArg::Early)));
            }
            _ => panic!("expected put"),
        }
    }
}
