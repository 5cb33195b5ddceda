use anyhow::{Result, bail};
use clap::Parser;
use lnpkg::link::LinkFlags;
use lnpkg::runtime::{RealRuntime, Runtime, resolve_relative_path};
use lnpkg::{Config, Options, build_entries};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// lnpkg - install local packages by copy
///
/// Copies the files a package would publish into the `node_modules` of
/// dependent projects, and keeps them in sync in watch mode.
///
/// Examples:
///   lnpkg ../lib                 # Install ../lib into ./node_modules/<name>
///   lnpkg ../lib -d app -w       # Install into app and watch for changes
///   lnpkg ../lib --unlink        # Remove the installed files again
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source package directories
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Destination package directory (repeatable, defaults to the working directory)
    #[arg(short = 'd', long = "dest", value_name = "PATH")]
    dest: Vec<PathBuf>,

    /// Resolve paths as if started in PATH
    #[arg(short = 'C', long = "cwd", value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Log operations without touching the filesystem
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,

    /// Link even if the source is not a dependency of the destination
    #[arg(short = 'f', long, conflicts_with = "skip")]
    force: bool,

    /// Skip links whose source is not a dependency of the destination
    #[arg(short = 's', long)]
    skip: bool,

    /// Remove previously installed files instead of copying
    #[arg(short = 'u', long)]
    unlink: bool,

    /// Watch source packages for changes after linking
    #[arg(short = 'w', long)]
    watch: bool,

    /// Skip linking and only watch for changes
    #[arg(short = 'W', long = "watch-only")]
    watch_only: bool,

    /// Debounce window for file events in milliseconds
    #[arg(
        long = "debounce-ms",
        env = "LNPKG_DEBOUNCE_MS",
        value_name = "MS",
        default_value_t = 200
    )]
    debounce_ms: u64,

    /// Resolve package files with `npm pack --dry-run` (also via LNPKG_NPM_PACK)
    #[arg(long = "npm-pack", env = "LNPKG_NPM_PACK")]
    npm_pack: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            dry_run: self.dry_run,
            watch: self.watch,
            watch_only: self.watch_only,
            flags: LinkFlags {
                force: self.force,
                skip: self.skip,
                unlink: self.unlink,
            },
            debounce: Duration::from_millis(self.debounce_ms),
            npm_pack: self.npm_pack,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let runtime = Arc::new(RealRuntime);

    let cwd = runtime.current_dir()?;
    let cwd = match &cli.cwd {
        Some(path) => resolve_relative_path(&cwd, path),
        None => cwd,
    };

    let options = cli.options();
    let entries = build_entries(&cwd, &cli.paths, &cli.dest, options.flags);
    let summary = lnpkg::run(Config::new(runtime, options), entries).await?;
    if summary.errors > 0 {
        bail!("Finished with {} error(s)", summary.errors);
    }
    Ok(())
}
