use std::io::Write;
use std::path::Path;

use colored::Colorize;

use cask_store::{ProgressCallback, Store, StoreConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init(args) => cmd_init(&cli.root, args),
        Command::Put(args) => cmd_put(&open(&cli.root)?, args),
        Command::PutDir(args) => cmd_put_dir(&open(&cli.root)?, args),
        Command::Get(args) => cmd_get(&open(&cli.root)?, args),
        Command::Cat(args) => cmd_cat(&open(&cli.root)?, args),
        Command::Checkout(args) => cmd_checkout(&open(&cli.root)?, args),
        Command::Delete(args) => cmd_delete(&open(&cli.root)?, args),
        Command::List => cmd_list(&open(&cli.root)?),
        Command::Count => cmd_count(&open(&cli.root)?),
        Command::Size => cmd_size(&open(&cli.root)?),
        Command::Scan(args) => cmd_scan(&open(&cli.root)?, args),
        Command::Repair => cmd_repair(&open(&cli.root)?),
    }
}

fn open(root: &Path) -> anyhow::Result<Store> {
    Ok(Store::open_root(root)?)
}

fn cmd_init(root: &Path, args: InitArgs) -> anyhow::Result<()> {
    let config = StoreConfig {
        prefix_depth: args.prefix_depth,
        prefix_width: args.prefix_width,
        fmode: args.fmode,
        dmode: args.dmode,
        default_put_strategy: args.strategy.into(),
    };
    let store = Store::init(root, config)?;
    println!(
        "{} Initialized store in {}",
        "✓".green().bold(),
        store.root().display().to_string().bold()
    );
    println!("  Default strategy: {}", store.config().default_put_strategy.to_string().cyan());
    Ok(())
}

fn cmd_put(store: &Store, args: PutArgs) -> anyhow::Result<()> {
    let progress = progress_printer(args.progress);
    let entry = store.put(
        &args.source,
        args.strategy.map(Into::into),
        progress.as_deref(),
    )?;
    if args.progress {
        eprintln!();
    }
    let mark = if entry.is_duplicate() {
        "duplicate".yellow()
    } else {
        "stored".green()
    };
    println!("{} {} {}", mark, entry.checksum().bold(), entry.path().display());
    Ok(())
}

fn cmd_put_dir(store: &Store, args: PutDirArgs) -> anyhow::Result<()> {
    let results = store.put_dir(&args.dir, args.recursive, args.strategy.map(Into::into), None)?;
    for (source, entry) in &results {
        let mark = if entry.is_duplicate() { "=".yellow() } else { "+".green() };
        println!("  {} {}  {}", mark, entry.checksum(), source.display());
    }
    println!("{} {} file(s) processed", "✓".green().bold(), results.len());
    Ok(())
}

fn cmd_get(store: &Store, args: GetArgs) -> anyhow::Result<()> {
    match store.get(&args.checksum)? {
        Some(entry) => {
            println!("{}", store.root().join(entry.path()).display());
            Ok(())
        }
        None => {
            println!("{} not found: {}", "✗".red(), args.checksum);
            std::process::exit(1);
        }
    }
}

fn cmd_cat(store: &Store, args: CatArgs) -> anyhow::Result<()> {
    let mut file = store.open(&args.checksum, "rb")?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    std::io::copy(&mut file, &mut handle)?;
    handle.flush()?;
    Ok(())
}

fn cmd_checkout(store: &Store, args: CheckoutArgs) -> anyhow::Result<()> {
    let verified = store.checkout(args.strategy(), &args.checksum, &args.dest, None, args.dry_run)?;
    let action = if args.dry_run { "would check out" } else { "checked out" };
    match verified {
        Some(checksum) => println!(
            "{} {} {} (verified {})",
            "✓".green().bold(),
            action,
            args.dest.display(),
            checksum.dimmed()
        ),
        None => println!("{} {} {}", "✓".green().bold(), action, args.dest.display()),
    }
    Ok(())
}

fn cmd_delete(store: &Store, args: DeleteArgs) -> anyhow::Result<()> {
    store.delete(&args.checksum)?;
    println!("{} deleted {}", "✓".green(), args.checksum);
    Ok(())
}

fn cmd_list(store: &Store) -> anyhow::Result<()> {
    for path in store.files() {
        println!("{}", path?.display());
    }
    Ok(())
}

fn cmd_count(store: &Store) -> anyhow::Result<()> {
    println!("{}", store.count()?);
    Ok(())
}

fn cmd_size(store: &Store) -> anyhow::Result<()> {
    println!("{}", store.size()?);
    Ok(())
}

fn cmd_scan(store: &Store, args: ScanArgs) -> anyhow::Result<()> {
    let mut misfiled = 0usize;
    for item in store.scan(args.trust_paths) {
        let (actual, expected) = item?;
        misfiled += 1;
        println!(
            "  {} {}  expected {}",
            "!".red().bold(),
            actual.display(),
            expected.path().display()
        );
    }
    if misfiled == 0 {
        println!("{} store is clean", "✓".green().bold());
    } else {
        println!("{} {} misfiled file(s)", "✗".red().bold(), misfiled);
    }
    Ok(())
}

fn cmd_repair(store: &Store) -> anyhow::Result<()> {
    let repaired = store.repair()?;
    for (old, entry) in &repaired {
        println!("  {} {} -> {}", "~".yellow(), old.display(), entry.path().display());
    }
    println!("{} {} file(s) repaired", "✓".green().bold(), repaired.len());
    Ok(())
}

/// Progress callback writing a carriage-return updated line to stderr.
fn progress_printer(enabled: bool) -> Option<Box<ProgressCallback<'static>>> {
    if !enabled {
        return None;
    }
    Some(Box::new(|path: &Path, (processed, total): (u64, Option<u64>)| {
        match total {
            Some(total) => eprint!("\r{}: {processed}/{total} bytes", path.display()),
            None => eprint!("\r{}: {processed} bytes", path.display()),
        }
    }))
}
