use anyhow::Context;
use clap::{Parser, Subcommand};
use nftdoc::Config;
use nftdoc_exec::{NftCommand, Settings};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nftdoc")]
#[command(version, about = "Build, apply and compare nftables JSON documents", long_about = None)]
struct Cli {
    /// Executor settings (YAML); defaults to /etc/nftdoc/settings.yaml if present
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the live ruleset, or the objects selected by FILTER
    List {
        /// e.g. `table inet filter`
        filter: Vec<String>,
    },
    /// Apply a JSON document
    Apply {
        file: PathBuf,
        /// Print what the kernel accepted, handles included
        #[arg(long)]
        echo: bool,
    },
    /// Strip handles and metainfo, sort, and print a document
    Normalize { file: PathBuf },
    /// Compare a desired document with a saved one or the live ruleset
    Diff {
        desired: PathBuf,
        actual: Option<PathBuf>,
    },
    /// Flush the entire live ruleset
    Flush,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;
    debug!(binary = %settings.binary, timeout_secs = settings.timeout_secs, "loaded settings");
    let nft = NftCommand::new(settings);

    match cli.command {
        Commands::List { filter } => {
            let filters: Vec<&str> = filter.iter().map(String::as_str).collect();
            let config = tokio::runtime::Runtime::new()?
                .block_on(async { nftdoc_exec::read_config(&nft, &filters).await })?;
            print_config(&config)?;
        }
        Commands::Apply { file, echo } => {
            let config = read_document(&file)?;
            let runtime = tokio::runtime::Runtime::new()?;
            if echo {
                let applied = runtime
                    .block_on(async { nftdoc_exec::apply_config_echo(&nft, &config).await })?;
                print_config(&applied)?;
            } else {
                runtime.block_on(async { nftdoc_exec::apply_config(&nft, &config).await })?;
                eprintln!("Applied {} entries from {}", config.len(), file.display());
            }
        }
        Commands::Normalize { file } => {
            let mut config = read_document(&file)?;
            nftdoc::normalize(&mut config);
            print_config(&config)?;
        }
        Commands::Diff { desired, actual } => {
            let desired = read_document(&desired)?;
            let actual = match actual {
                Some(path) => read_document(&path)?,
                None => tokio::runtime::Runtime::new()?
                    .block_on(async { nftdoc_exec::read_config(&nft, &[]).await })?,
            };

            match nftdoc::diff(&desired, &actual)? {
                Some(diff) => {
                    print!("{diff}");
                    std::process::exit(1);
                }
                None => eprintln!("No differences"),
            }
        }
        Commands::Flush => {
            let mut config = Config::new();
            config.flush_ruleset();
            tokio::runtime::Runtime::new()?
                .block_on(async { nftdoc_exec::apply_config(&nft, &config).await })?;
            eprintln!("Flushed ruleset");
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<Config> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Config::from_json(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", config.to_json_pretty()?)?;
    Ok(())
}
