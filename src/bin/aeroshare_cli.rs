//! AeroShare CLI — browse an AList host and create password-locked share links
//!
//! Usage:
//!   aeroshare-cli ls [path] [--all]          List a directory
//!   aeroshare-cli share <paths...>           Create a share link
//!   aeroshare-cli open <link>                Unlock a share link and print direct URLs
//!   aeroshare-cli rm <paths...>              Delete files or folders
//!   aeroshare-cli put <local> <remote_dir>   Upload a file
//!   aeroshare-cli mkdir <parent> <name>      Create a folder
//!   aeroshare-cli config ...                 Show or change settings

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};

use aeroshare::browser::{ListFailure, PaginatedBrowser};
use aeroshare::config::{config_path, AppConfig};
use aeroshare::providers::{AuthDetails, ConnectionConfig, RemoteClient};
use aeroshare::resolver::{resolve, ListingContext, SelectionSet};
use aeroshare::share::{LinkConsumer, ShareBundleCodec, ShareLinkComposer, UnlockState};
use aeroshare::{AListClient, DirectoryPasswordStore};

const MAX_PASSWORD_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(
    name = "aeroshare-cli",
    about = "AeroShare CLI — password-locked image share links for AList hosts",
    version
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a remote directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Directory password (prompted for if needed)
        #[arg(long)]
        password: Option<String>,
        /// Fetch the whole directory in one request
        #[arg(long)]
        all: bool,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Create a share link for files and folders (folders expand one level)
    Share {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Share password (default: configured default password, else prompt)
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Page that opens links (overrides config)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Unlock a share link and print direct URLs
    Open {
        link: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete remote files or folders
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Upload a local file
    Put { local: PathBuf, remote_dir: String },
    /// Create a remote folder
    Mkdir { parent: String, name: String },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print current settings (secrets masked)
    Show,
    /// Set the backend connection
    SetServer {
        url: String,
        #[arg(long, conflicts_with_all = ["username", "password"])]
        token: Option<String>,
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
        #[arg(long)]
        custom_domain: Option<String>,
    },
    /// Set share-link defaults
    SetShare {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        default_password: Option<String>,
        #[arg(long)]
        passwordless: Option<bool>,
    },
}

fn prompt_line(label: &str) -> anyhow::Result<String> {
    eprint!("{}: ", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn connection(config: &AppConfig) -> anyhow::Result<&ConnectionConfig> {
    config
        .connection
        .as_ref()
        .ok_or_else(|| anyhow!("No server configured. Run: aeroshare-cli config set-server <url>"))
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

async fn cmd_ls(
    config: &AppConfig,
    store: &mut DirectoryPasswordStore,
    path: &str,
    password: Option<String>,
    all: bool,
    pages: u32,
) -> anyhow::Result<()> {
    let client = AListClient::new(connection(config)?.clone())?;
    let mut browser = PaginatedBrowser::with_page_sizes(&client, config.page_size, config.load_all_page_size);

    let mut result = browser.open(path, store).await;
    let mut supplied = password;
    let mut attempts = 0;
    while let Err(ListFailure::PasswordRequired { path, incorrect }) = &result {
        if attempts >= MAX_PASSWORD_ATTEMPTS {
            break;
        }
        attempts += 1;
        if *incorrect {
            eprintln!("Incorrect password for {}", path);
        }
        let pw = match supplied.take() {
            Some(pw) => pw,
            None => prompt_line(&format!("Password for {}", path))?,
        };
        result = browser.submit_password(&pw, store).await;
    }
    result?;

    if all {
        browser.load_all(store).await?;
    } else {
        for _ in 1..pages {
            if !browser.load_more(store).await? {
                break;
            }
        }
    }

    let state = browser.state();
    println!("{}  ({} of {} entries)", state.path, state.items.len(), state.total);
    for item in &state.items {
        let modified = item
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        if item.is_dir {
            println!("  {:<16} {:>10}  {}/", modified, "-", item.name);
        } else {
            println!("  {:<16} {:>10}  {}", modified, human_size(item.size), item.name);
        }
    }
    if state.has_more() {
        println!("  ... more available (use --pages or --all)");
    }
    Ok(())
}

async fn cmd_share(
    config: &AppConfig,
    store: &mut DirectoryPasswordStore,
    paths: Vec<String>,
    password: Option<String>,
    title: Option<String>,
    base_url: Option<String>,
) -> anyhow::Result<()> {
    let conn = connection(config)?;
    let client = AListClient::new(conn.clone())?;

    let mut settings = config.share.clone();
    if base_url.is_some() {
        settings.base_url = base_url;
    }
    let composer = ShareLinkComposer::from_settings(&settings)?;

    let selection: SelectionSet = paths.iter().collect();
    let context = ListingContext::new("/", &[]).with_load_all_page_size(config.load_all_page_size);
    let resolution = resolve(&client, &selection, context, store).await;
    for warning in &resolution.warnings {
        eprintln!("warning: {}", warning);
    }
    if resolution.is_empty() {
        bail!("Nothing to share: no images found in the selection");
    }

    let password = match password.or_else(|| settings.default_password.clone()) {
        Some(pw) => pw,
        None => prompt_line("Share password")?,
    };
    let link = composer.share_link(&ShareBundleCodec::new(), conn, &resolution.paths, title, &password)?;

    eprintln!(
        "Shared {} image(s) from {} folder(s){}",
        resolution.paths.len(),
        resolution.folders_expanded,
        if resolution.folders_failed() > 0 {
            format!(", {} folder(s) skipped", resolution.folders_failed())
        } else {
            String::new()
        }
    );
    println!("{}", link);
    Ok(())
}

async fn cmd_open(link: &str, password: Option<String>) -> anyhow::Result<()> {
    let mut consumer = LinkConsumer::open(link, ShareBundleCodec::new())?;
    let mut supplied = password;

    for _ in 0..MAX_PASSWORD_ATTEMPTS {
        match consumer.prompt().clone() {
            UnlockState::Prompting { error } => {
                if let Some(error) = error {
                    eprintln!("{}", error);
                }
                let pw = match supplied.take() {
                    Some(pw) => pw,
                    None => prompt_line("Share password")?,
                };
                consumer.submit(&pw);
            }
            _ => break,
        }
    }

    match consumer.state() {
        UnlockState::Unlocked(_) => {}
        UnlockState::Failed(reason) => bail!("{}", reason),
        UnlockState::Prompting { error } => {
            bail!("{}", error.clone().unwrap_or_else(|| "Share is locked".to_string()))
        }
        UnlockState::Locked => bail!("Share is locked"),
    }

    let client = consumer.hydrate()?;
    if let Some(title) = consumer.bundle().and_then(|b| b.title.as_deref()) {
        println!("# {}", title);
    }
    let mut failed = 0;
    for item in consumer.fetch_items(&client).await {
        match (&item.direct_url, &item.error) {
            (Some(url), _) => println!("{}\t{}", item.name, url),
            (None, error) => {
                failed += 1;
                eprintln!("{}\t{}", item.path, error.as_deref().unwrap_or("unavailable"));
            }
        }
    }
    if failed > 0 {
        bail!("{} item(s) could not be resolved", failed);
    }
    Ok(())
}

async fn cmd_rm(config: &AppConfig, paths: Vec<String>) -> anyhow::Result<()> {
    let client = AListClient::new(connection(config)?.clone())?;
    let report = client.delete_many(&paths).await;
    for failure in report.failures() {
        eprintln!("failed: {} ({})", failure.path, failure.error.as_deref().unwrap_or("unknown error"));
    }
    println!("Deleted {}, failed {}", report.success_count(), report.fail_count());
    if !report.success() {
        bail!("{} path(s) could not be deleted", report.fail_count());
    }
    Ok(())
}

async fn cmd_put(config: &AppConfig, local: PathBuf, remote_dir: &str) -> anyhow::Result<()> {
    let client = AListClient::new(connection(config)?.clone())?;
    let name = local
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid local file name: {:?}", local))?
        .to_string();
    let content = tokio::fs::read(&local)
        .await
        .with_context(|| format!("Failed to read {:?}", local))?;
    let size = content.len();
    client.upload_file(remote_dir, &name, content, None).await?;
    println!("Uploaded {} ({}) to {}", name, human_size(size as u64), remote_dir);
    Ok(())
}

async fn cmd_mkdir(config: &AppConfig, parent: &str, name: &str) -> anyhow::Result<()> {
    let client = AListClient::new(connection(config)?.clone())?;
    client.create_folder(parent, name).await?;
    println!("Created {}", aeroshare::providers::join_path(parent, name));
    Ok(())
}

fn cmd_config(config: &mut AppConfig, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Config file: {:?}", config_path());
            match &config.connection {
                Some(conn) => {
                    println!("Server:        {}", conn.server_url);
                    println!(
                        "Auth:          {}",
                        conn.auth_details.as_ref().map_or("anonymous".to_string(), |a| a.to_string())
                    );
                    if let Some(domain) = &conn.custom_domain_override {
                        println!("Custom domain: {}", domain);
                    }
                }
                None => println!("Server:        (not set)"),
            }
            println!("Share base:    {}", config.share.base_url.as_deref().unwrap_or("(not set)"));
            println!(
                "Default pass:  {}",
                if config.share.default_password.is_some() { "(set)" } else { "(not set)" }
            );
            println!("Passwordless:  {}", config.share.passwordless_enabled);
            println!("Page size:     {}", config.page_size);
            return Ok(());
        }
        ConfigAction::SetServer { url, token, username, password, custom_domain } => {
            let auth = match (token, username, password) {
                (Some(token), _, _) => Some(AuthDetails::Token { token }),
                (None, Some(username), Some(password)) => Some(AuthDetails::Credentials { username, password }),
                _ => None,
            };
            let mut conn = ConnectionConfig::new(&url, auth);
            if let Some(domain) = custom_domain {
                conn = conn.with_custom_domain(&domain);
            }
            config.connection = Some(conn);
        }
        ConfigAction::SetShare { base_url, default_password, passwordless } => {
            if let Some(base) = base_url {
                config.share.base_url = Some(base).filter(|b| !b.trim().is_empty());
            }
            if let Some(pw) = default_password {
                config.share.default_password = Some(pw).filter(|p| !p.is_empty());
            }
            if let Some(enabled) = passwordless {
                config.share.passwordless_enabled = enabled;
            }
        }
    }
    config.validate()?;
    config.save()?;
    println!("Saved {:?}", config_path());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    aeroshare::init_logging(cli.verbose);

    let mut config = AppConfig::load();
    let store_path = DirectoryPasswordStore::default_path();
    let mut store = DirectoryPasswordStore::load_from(&store_path);
    let store_before = store.clone();

    let result = match cli.command {
        Commands::Ls { path, password, all, pages } => {
            cmd_ls(&config, &mut store, &path, password, all, pages).await
        }
        Commands::Share { paths, password, title, base_url } => {
            cmd_share(&config, &mut store, paths, password, title, base_url).await
        }
        Commands::Open { link, password } => cmd_open(&link, password).await,
        Commands::Rm { paths } => cmd_rm(&config, paths).await,
        Commands::Put { local, remote_dir } => cmd_put(&config, local, &remote_dir).await,
        Commands::Mkdir { parent, name } => cmd_mkdir(&config, &parent, &name).await,
        Commands::Config { action } => cmd_config(&mut config, action),
    };

    if store != store_before {
        if let Err(e) = store.save_to(&store_path) {
            eprintln!("Warning: could not save directory passwords: {}", e);
        }
    }

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
