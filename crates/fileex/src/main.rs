//! FileEX
//!
//! Local file browser service with a recoverable trash.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fileex::config::{default_config_path, Config};
use fileex::ipc::{get_socket_path, IpcClient, IpcRequest, IpcResponse};
use fileex::logging::init_logging;
use fileex::protocol::{ArchiveListing, DirectoryPage, DriveStats, EntryKind, TrashItem};
use fileex::{FileServer, FileService, RequestRouter};

/// Timeout for connecting to a running server.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// FileEX - local file browser service with a recoverable trash.
#[derive(Parser, Debug)]
#[command(name = "fileex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Socket of the running server
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Run the operation in-process instead of through the server
    #[arg(long, global = true)]
    pub local: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server on the Unix socket
    Serve,

    /// List a directory, or the drives when no path is given
    Ls {
        /// Directory to list
        path: Option<String>,

        /// Entries to skip
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Maximum entries to return
        #[arg(long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Move a file or directory to the trash
    Rm {
        /// Path to delete
        path: String,
    },

    /// Manage the trash
    #[command(subcommand)]
    Trash(TrashCommands),

    /// List the members of an archive
    Archive {
        /// Archive file
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print a file's contents
    Cat {
        /// File to read
        path: String,

        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Extract one archive member
    ArchiveCat {
        /// Archive file
        path: String,

        /// Member name inside the archive
        entry: String,

        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Render an image thumbnail
    Thumbnail {
        /// Image file
        path: String,

        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Subcommands for trash management.
#[derive(Subcommand, Debug, Clone)]
pub enum TrashCommands {
    /// List trashed items, newest first
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Restore an item to its original location
    Restore {
        /// Trash id
        id: String,
    },

    /// Permanently delete an item
    Purge {
        /// Trash id
        id: String,
    },
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    let _log_guard = init_logging(&config.daemon, cli.verbose)?;

    let socket_path = cli
        .socket
        .clone()
        .or_else(|| config.daemon.socket_path.clone())
        .unwrap_or_else(get_socket_path);

    match cli.command.clone() {
        Commands::Serve => {
            tracing::info!(config = %config_path.display(), "FileEX starting");
            let server = FileServer::bind(&config, &socket_path).await?;
            server.run_until_signal().await?;
            tracing::info!("FileEX stopped");
        }
        Commands::Ls {
            path,
            skip,
            limit,
            json,
        } => {
            let request = IpcRequest::ListDirectory { path, skip, limit };
            match dispatch(&cli, &config, &socket_path, request).await? {
                IpcResponse::Directory(page) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&page)?);
                    } else {
                        print_directory(&page);
                    }
                }
                other => return unexpected(other),
            }
        }
        Commands::Rm { path } => {
            let request = IpcRequest::MoveToTrash { path: path.clone() };
            match dispatch(&cli, &config, &socket_path, request).await? {
                IpcResponse::Trashed { id } => println!("Moved {} to trash ({})", path, id),
                other => return unexpected(other),
            }
        }
        Commands::Trash(cmd) => match cmd {
            TrashCommands::List { json } => {
                match dispatch(&cli, &config, &socket_path, IpcRequest::ListTrash).await? {
                    IpcResponse::Trash { items } => {
                        if json {
                            println!("{}", serde_json::to_string_pretty(&items)?);
                        } else {
                            print_trash(&items);
                        }
                    }
                    other => return unexpected(other),
                }
            }
            TrashCommands::Restore { id } => {
                let request = IpcRequest::RestoreFromTrash { id };
                match dispatch(&cli, &config, &socket_path, request).await? {
                    IpcResponse::Restored { path } => println!("Restored {}", path),
                    other => return unexpected(other),
                }
            }
            TrashCommands::Purge { id } => {
                let request = IpcRequest::PurgeFromTrash { id };
                match dispatch(&cli, &config, &socket_path, request).await? {
                    IpcResponse::Purged { id } => println!("Permanently deleted {}", id),
                    other => return unexpected(other),
                }
            }
        },
        Commands::Archive { path, json } => {
            let request = IpcRequest::ListArchive { path };
            match dispatch(&cli, &config, &socket_path, request).await? {
                IpcResponse::Archive(listing) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&listing)?);
                    } else {
                        print_archive(&listing);
                    }
                }
                other => return unexpected(other),
            }
        }
        Commands::Cat { path, output } => {
            let request = IpcRequest::ViewFile { path };
            let response = dispatch(&cli, &config, &socket_path, request).await?;
            write_blob(response, output.as_deref())?;
        }
        Commands::ArchiveCat {
            path,
            entry,
            output,
        } => {
            let request = IpcRequest::ReadArchiveEntry { path, entry };
            let response = dispatch(&cli, &config, &socket_path, request).await?;
            write_blob(response, output.as_deref())?;
        }
        Commands::Thumbnail { path, output } => {
            let request = IpcRequest::Thumbnail { path };
            let response = dispatch(&cli, &config, &socket_path, request).await?;
            write_blob(response, output.as_deref())?;
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "Config file already exists: {} (use --force to overwrite)",
                        config_path.display()
                    );
                }
                Config::default().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
            }
        },
    }

    Ok(())
}

/// Send a request to the server, or handle it in-process with `--local`.
///
/// Error responses are turned into an `Err` so callers only match on success.
async fn dispatch(
    cli: &Cli,
    config: &Config,
    socket_path: &Path,
    request: IpcRequest,
) -> anyhow::Result<IpcResponse> {
    let response = if cli.local {
        let router = RequestRouter::new(Arc::new(FileService::new(config)));
        router.handle(request).await
    } else {
        let mut client = IpcClient::connect_with_timeout(
            socket_path,
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Server is not running (cannot connect to {}); \
                 start it with `fileex serve` or pass --local",
                socket_path.display()
            )
        })?;
        client.send(request).await.context("Request failed")?
    };

    match response {
        IpcResponse::Error(err) => anyhow::bail!("{} ({:?})", err.message, err.code),
        response => Ok(response),
    }
}

fn unexpected(response: IpcResponse) -> anyhow::Result<()> {
    anyhow::bail!("Unexpected response from server: {:?}", response)
}

/// Write a blob response to a file or stdout.
fn write_blob(response: IpcResponse, output: Option<&Path>) -> anyhow::Result<()> {
    let mime = match &response {
        IpcResponse::Blob { mime, .. } => mime.clone(),
        _ => anyhow::bail!("Unexpected response from server: {:?}", response),
    };
    let data = response
        .blob_bytes()
        .context("Response carried no data")?
        .context("Invalid base64 payload")?;

    match output {
        Some(path) => {
            std::fs::write(path, &data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes ({}) to {}", data.len(), mime, path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Print a directory page as a table.
fn print_directory(page: &DirectoryPage) {
    match &page.path {
        Some(path) => println!("{}", path),
        None => println!("Drives"),
    }

    if page.entries.is_empty() {
        println!("  (empty)");
    }

    for entry in &page.entries {
        match (&entry.kind, &entry.stats) {
            (
                EntryKind::Drive,
                Some(DriveStats::Known {
                    used_percent,
                    total_fmt,
                    free_fmt,
                    ..
                }),
            ) => {
                println!(
                    "  {:<30} {:>10} free of {:>10} ({:.1}% used)",
                    entry.path, free_fmt, total_fmt, used_percent
                );
            }
            (EntryKind::Drive, _) => println!("  {:<30} (capacity unknown)", entry.path),
            _ => {
                let marker = if entry.is_dir { "d" } else { "-" };
                println!(
                    "  {} {:>10}  {:<19}  {}",
                    marker,
                    entry.size_fmt,
                    entry.modified_fmt.as_deref().unwrap_or(""),
                    entry.name
                );
            }
        }
    }

    let shown = page.entries.len();
    if shown < page.total {
        println!(
            "Showing {}-{} of {}",
            page.skip + 1,
            page.skip + shown,
            page.total
        );
    }
    let next = page.skip + page.limit;
    if shown > 0 && next < page.total {
        println!("Next page: --skip {} --limit {}", next, page.limit);
    }
}

/// Print trash items as a table.
fn print_trash(items: &[TrashItem]) {
    if items.is_empty() {
        println!("Trash is empty.");
        return;
    }

    println!(
        "{:<36}  {:<19}  {:>10}  ORIGINAL PATH",
        "ID", "DELETED", "SIZE"
    );
    for item in items {
        println!(
            "{:<36}  {:<19}  {:>10}  {}",
            item.id, item.deleted_at_fmt, item.size_fmt, item.original_path
        );
    }
}

/// Print an archive listing as a table.
fn print_archive(listing: &ArchiveListing) {
    println!(
        "{}: {} files, {} directories",
        listing.filename, listing.total_files, listing.total_dirs
    );
    for entry in &listing.entries {
        let marker = if entry.is_dir { "d" } else { "-" };
        println!(
            "  {} {:>10} {:>10}  {}",
            marker, entry.size_fmt, entry.compressed_fmt, entry.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ls() {
        let cli = Cli::try_parse_from(["fileex", "ls", "/home", "--skip", "10", "--limit", "5"])
            .unwrap();
        match cli.command {
            Commands::Ls {
                path, skip, limit, ..
            } => {
                assert_eq!(path.as_deref(), Some("/home"));
                assert_eq!(skip, 10);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["fileex", "trash", "list", "--local", "-v", "--json"]).unwrap();
        assert!(cli.local);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Trash(TrashCommands::List { json: true })
        ));
    }

    #[test]
    fn test_cli_requires_archive_entry() {
        assert!(Cli::try_parse_from(["fileex", "archive-cat", "a.zip"]).is_err());
        assert!(Cli::try_parse_from(["fileex", "archive-cat", "a.zip", "docs/readme.md"]).is_ok());
    }

    #[tokio::test]
    async fn test_local_cat_writes_file_contents() {
        let temp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap();
        let source = root.join("notes.txt");
        std::fs::write(&source, "local notes").unwrap();
        let out = root.join("copy.txt");

        let mut config = Config::default();
        config.daemon.data_dir = root.join("data");
        config.files.restricted_paths = Vec::new();

        let cli = Cli::try_parse_from([
            "fileex",
            "--local",
            "cat",
            source.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let (path, output) = match &cli.command {
            Commands::Cat { path, output } => (path.clone(), output.clone()),
            other => panic!("unexpected command: {other:?}"),
        };

        let request = IpcRequest::ViewFile { path };
        let response = dispatch(&cli, &config, &root.join("unused.sock"), request)
            .await
            .unwrap();
        write_blob(response, output.as_deref()).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "local notes");

        let request = IpcRequest::ViewFile {
            path: root.to_string_lossy().into_owned(),
        };
        let err = dispatch(&cli, &config, &root.join("unused.sock"), request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NotFound"));
    }

    #[test]
    fn test_write_blob_to_file() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("thumb.png");

        write_blob(IpcResponse::blob("image/png", b"png-bytes"), Some(&out)).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_write_blob_rejects_other_responses() {
        assert!(write_blob(IpcResponse::Pong, None).is_err());
    }
}
