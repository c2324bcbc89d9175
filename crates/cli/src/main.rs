use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use medley_core::config;
use medley_core::scanner::{ScanOutcome, Scanner};
use medley_core::share::{resolve_source, ShareConfig, ShareKind};
use medley_core::Catalog;
use sources::RemoteSource;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;
    let catalog = Catalog::new(pool);

    match cli.command {
        Commands::Shares { command } => run_shares(catalog, command).await,
        Commands::Ls { share, path, json } => run_ls(catalog, &share, path.as_deref(), json).await,
        Commands::Url { share, path } => run_url(catalog, &share, &path).await,
        Commands::Scan { json } => run_scan(catalog, &cfg.scan.exclude, json).await,
        Commands::Media { share } => run_media(catalog, &share).await,
    }
}

#[derive(Parser)]
#[command(name = "medley")]
#[command(about = "Browse and index media shares", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved shares
    Shares {
        #[command(subcommand)]
        command: SharesCommand,
    },
    /// List a directory on a share
    Ls {
        /// Share id or name
        share: String,
        /// Directory path within the share (defaults to the root)
        path: Option<String>,
        /// Output JSON rows
        #[arg(long)]
        json: bool,
    },
    /// Print a playable URL for a file on a share
    Url {
        /// Share id or name
        share: String,
        /// File path within the share
        path: String,
    },
    /// Scan every share and index what is found
    Scan {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// List indexed media for a share
    Media {
        /// Share id or name
        share: String,
    },
}

#[derive(Subcommand)]
enum SharesCommand {
    /// Save a local folder share
    AddLocal {
        name: String,
        root: String,
    },
    /// Save an FTP share
    AddFtp {
        name: String,
        host: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Save an SMB share
    AddSmb {
        name: String,
        host: String,
        #[arg(long)]
        share: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Save a WebDAV share
    AddWebdav {
        name: String,
        url: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// List saved shares
    List {
        /// Output JSON rows
        #[arg(long)]
        json: bool,
    },
    /// Remove a share and its indexed media
    Rm {
        /// Share id or name
        share: String,
    },
}

async fn run_shares(catalog: Catalog, command: SharesCommand) -> Result<()> {
    match command {
        SharesCommand::AddLocal { name, root } => {
            add_share(
                &catalog,
                ShareConfig::new(name, ShareKind::LocalFolder { root, bookmark: None }),
            )
            .await
        }
        SharesCommand::AddFtp {
            name,
            host,
            port,
            username,
            password,
        } => {
            add_share(
                &catalog,
                ShareConfig::new(
                    name,
                    ShareKind::Ftp {
                        host,
                        port,
                        username,
                        password,
                        passive: Some(true),
                    },
                ),
            )
            .await
        }
        SharesCommand::AddSmb {
            name,
            host,
            share,
            username,
            password,
        } => {
            add_share(
                &catalog,
                ShareConfig::new(
                    name,
                    ShareKind::Smb {
                        host,
                        share,
                        username,
                        password,
                    },
                ),
            )
            .await
        }
        SharesCommand::AddWebdav {
            name,
            url,
            username,
            password,
        } => {
            add_share(
                &catalog,
                ShareConfig::new(
                    name,
                    ShareKind::Webdav {
                        url,
                        username,
                        password,
                    },
                ),
            )
            .await
        }
        SharesCommand::List { json } => {
            let shares = catalog.read_shares().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&shares)?);
            } else {
                for share in shares {
                    println!(
                        "{}  {:<12} {}  ({})",
                        share.id,
                        share.kind.kind_name(),
                        share.name,
                        share.kind.subtitle()
                    );
                }
            }
            Ok(())
        }
        SharesCommand::Rm { share } => {
            let found = find_share(&catalog, &share).await?;
            catalog.remove_share(&found.id).await?;
            println!("removed {}", found.name);
            Ok(())
        }
    }
}

async fn add_share(catalog: &Catalog, share: ShareConfig) -> Result<()> {
    catalog.add_share(&share).await?;
    println!("{}", share.id);
    Ok(())
}

async fn run_ls(catalog: Catalog, share: &str, path: Option<&str>, json: bool) -> Result<()> {
    let share = find_share(&catalog, share).await?;
    let source = resolve_source(&share)?;
    let entries = source.list(path.unwrap_or("/")).await?;
    catalog
        .touch_share(&share.id, Utc::now().timestamp())
        .await?;

    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "path": e.path,
                    "name": e.name,
                    "dir": e.is_directory,
                    "size": e.size,
                    "modified": e.modified_at.map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for entry in entries {
            let marker = if entry.is_directory { "d" } else { "-" };
            let size = entry
                .size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{marker} {size:>12}  {}", entry.name);
        }
    }
    Ok(())
}

async fn run_url(catalog: Catalog, share: &str, path: &str) -> Result<()> {
    let share = find_share(&catalog, share).await?;
    let source = resolve_source(&share)?;
    let url = source.open_file(path).await?;
    catalog
        .touch_share(&share.id, Utc::now().timestamp())
        .await?;
    println!("{url}");
    Ok(())
}

async fn run_scan(catalog: Catalog, excludes: &[String], json: bool) -> Result<()> {
    let scanner = Scanner::new(catalog, excludes)?;
    match scanner.scan_all_shares().await? {
        ScanOutcome::Completed(summary) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "shares": summary.shares,
                        "skipped_shares": summary.skipped_shares,
                        "indexed": summary.indexed,
                    })
                );
            } else {
                println!(
                    "scanned {} share(s), {} skipped, {} item(s) indexed",
                    summary.shares, summary.skipped_shares, summary.indexed
                );
            }
        }
        ScanOutcome::Skipped => println!("a scan is already running"),
    }
    Ok(())
}

async fn run_media(catalog: Catalog, share: &str) -> Result<()> {
    let share = find_share(&catalog, share).await?;
    for item in catalog.media_for_share(&share.id).await? {
        let extra = match (item.season, item.episode) {
            (Some(s), Some(e)) => format!(" S{s:02}E{e:02}"),
            _ => item
                .year_guess
                .map(|y| format!(" ({y})"))
                .unwrap_or_default(),
        };
        println!(
            "{:<10} {}{}  [{}]",
            item.kind.as_str(),
            item.title_guess.as_deref().unwrap_or(&item.path),
            extra,
            item.path
        );
    }
    Ok(())
}

/// Look a share up by exact id first, then by name.
async fn find_share(catalog: &Catalog, needle: &str) -> Result<ShareConfig> {
    let shares = catalog.read_shares().await?;
    if let Some(share) = shares.iter().find(|s| s.id == needle) {
        return Ok(share.clone());
    }
    if let Some(share) = shares.iter().find(|s| s.name == needle) {
        return Ok(share.clone());
    }
    bail!("no share matches '{needle}'")
}
