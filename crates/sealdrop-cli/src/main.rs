//! sealdrop: one-time, end-to-end encrypted share links
//!
//! Commands:
//!   send text [MESSAGE]  - encrypt a message (stdin when omitted), print its link
//!   send file <path>     - encrypt and upload a file, print its link
//!   receive <link>       - fetch, decrypt and burn a shared item
//!   status               - check the server and show its limits
//!   config show          - display current configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use sealdrop_api::HttpShareApi;
use sealdrop_core::config::SealdropConfig;
use sealdrop_core::ShareError;
use sealdrop_flow::{
    FileOptions, ProgressFn, RetrievalController, Revealed, SendSettings, Sender, ShareLink,
    TextOptions, TokioClock,
};

/// Password prompts before `receive` gives up
const MAX_PASSWORD_ATTEMPTS: u32 = 3;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealdrop",
    version,
    about = "One-time encrypted share links",
    long_about = "sealdrop: encrypt text or files locally, share them as a link whose key \
                  never reaches the server, and burn them after the first read"
)]
struct Cli {
    /// Path to sealdrop.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SEALDROP_CONFIG",
        default_value = "~/.config/sealdrop/config.toml"
    )]
    config: PathBuf,

    /// Server base URL (overrides server.base_url)
    #[arg(long, env = "SEALDROP_SERVER")]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error); defaults to logging.level
    #[arg(long, env = "SEALDROP_LOG")]
    log: Option<String>,

    /// Log format (json, text); defaults to logging.format
    #[arg(long, env = "SEALDROP_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and share a message or a file
    Send {
        #[command(subcommand)]
        what: SendWhat,
    },

    /// Open a share link: fetch, decrypt, then burn the stored copy
    Receive {
        /// Full share link, including the #key fragment
        link: String,
        /// Where to write a received file (default: its original name)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Password for protected items (prompted when omitted)
        #[arg(long, env = "SEALDROP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Overwrite the output file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Check the server and show its limits
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum SendWhat {
    /// Share a text message
    Text {
        /// Message to share (read from stdin when omitted)
        message: Option<String>,
        #[command(flatten)]
        opts: SendArgs,
    },

    /// Share a file
    File {
        path: PathBuf,
        #[command(flatten)]
        opts: SendArgs,
    },
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Protect the link with a password (prompted)
    #[arg(long)]
    protect: bool,
    /// Password to protect the link with (implies --protect)
    #[arg(long, env = "SEALDROP_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Requested lifetime, e.g. 1h or 7d (honoured only if the server allows it)
    #[arg(long)]
    expire: Option<String>,
    /// Content type recorded with the item
    #[arg(long)]
    content_type: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let mut config = load_config(&config_path)?;
    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.logging.format));
    init_logging(level, format);
    debug!(config = %config_path.display(), server = %config.server.base_url, "sealdrop starting");

    match cli.command {
        Commands::Send {
            what: SendWhat::Text { message, opts },
        } => cmd_send_text(&config, message, &opts).await,
        Commands::Send {
            what: SendWhat::File { path, opts },
        } => cmd_send_file(&config, &path, &opts).await,
        Commands::Receive {
            link,
            output,
            password,
            force,
        } => cmd_receive(&config, &link, output.as_deref(), password, force).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for links and received text
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<SealdropConfig> {
    SealdropConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn build_api(config: &SealdropConfig) -> Result<HttpShareApi> {
    sealdrop_api::build_from_core_config(&config.server).context("building server client")
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}% {msg}",
        )
        .context("progress bar template")?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn make_spinner(prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .context("spinner template")?,
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn progress_to(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `sealdrop send` ───────────────────────────────────────────────────────────

/// `--password` wins; `--protect` alone prompts twice.
fn resolve_password(opts: &SendArgs) -> Result<Option<SecretString>> {
    if let Some(password) = &opts.password {
        return Ok(Some(SecretString::from(password.clone())));
    }
    if !opts.protect {
        return Ok(None);
    }

    let first = rpassword::prompt_password("Password: ").context("reading password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("reading password")?;
    if first != confirm {
        anyhow::bail!("passwords do not match");
    }
    Ok(Some(SecretString::from(first)))
}

async fn cmd_send_text(
    config: &SealdropConfig,
    message: Option<String>,
    opts: &SendArgs,
) -> Result<()> {
    let text = match message {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading message from stdin")?;
            buf
        }
    };
    let password = resolve_password(opts)?;

    let api = build_api(config)?;
    let clock = TokioClock;
    let pb = make_spinner("send")?;
    let sender = Sender::new(&api, &clock, SendSettings::from_config(config))
        .with_progress(progress_to(&pb));

    let link = sender
        .send_text(
            &text,
            TextOptions {
                content_type: opts.content_type.clone(),
                password,
                expire: opts.expire.clone(),
            },
        )
        .await
        .context("sending text")?;

    pb.finish_and_clear();
    info!(id = %link.id(), "share link created");
    println!("{link}");
    Ok(())
}

async fn cmd_send_file(config: &SealdropConfig, path: &Path, opts: &SendArgs) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let password = resolve_password(opts)?;

    let api = build_api(config)?;
    let clock = TokioClock;
    let pb = make_progress_bar(bytes.len() as u64, "send")?;
    pb.set_message(name.clone());
    let sender = Sender::new(&api, &clock, SendSettings::from_config(config))
        .with_progress(progress_to(&pb));

    let link = sender
        .send_file(
            &name,
            &bytes,
            FileOptions {
                content_type: opts.content_type.clone(),
                password,
                expire: opts.expire.clone(),
            },
        )
        .await
        .with_context(|| format!("sending {}", path.display()))?;

    pb.finish_and_clear();
    eprintln!("Sent {name} ({})", fmt_bytes(bytes.len() as u64));
    println!("{link}");
    Ok(())
}

// ── `sealdrop receive` ────────────────────────────────────────────────────────

async fn cmd_receive(
    config: &SealdropConfig,
    link: &str,
    output: Option<&Path>,
    password: Option<String>,
    force: bool,
) -> Result<()> {
    let link = ShareLink::parse(link).context("parsing share link")?;
    let api = build_api(config)?;
    let mut controller = RetrievalController::new(&api, link);

    controller.fetch().await.context("fetching shared item")?;

    if controller.requires_password() {
        let mut given = password.map(SecretString::from);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let candidate = match given.take() {
                Some(pw) => pw,
                None => SecretString::from(
                    rpassword::prompt_password("Password: ").context("reading password")?,
                ),
            };
            match controller.submit_password(&candidate).await {
                Ok(()) => break,
                Err(ShareError::Password) if attempt < MAX_PASSWORD_ATTEMPTS => {
                    eprintln!("Incorrect password, try again.");
                }
                Err(e) => return Err(e).context("verifying password"),
            }
        }
    }

    let pb = make_spinner("receive")?;
    pb.set_message("decrypting");
    let content = controller.decrypt().await.context("decrypting shared item")?;
    pb.finish_and_clear();

    let burned = deliver(&mut controller, content, output, force).await?;
    if !burned {
        eprintln!("warning: the server did not confirm deletion; the item may still be stored");
    }
    Ok(())
}

/// Print or store decrypted content, then burn it. If the file cannot be
/// written the item is left on the server.
async fn deliver(
    controller: &mut RetrievalController<'_>,
    content: Revealed,
    output: Option<&Path>,
    force: bool,
) -> Result<bool> {
    match content {
        Revealed::Text { text, .. } => {
            println!("{text}");
        }
        Revealed::File { name, bytes, .. } => {
            let dest = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| safe_file_name(&name));
            if let Err(e) = write_received(&dest, &bytes, force).await {
                controller.abandon(format!("could not write {}", dest.display()));
                return Err(e.context("item was not burned, the link can be opened again"));
            }
            eprintln!("Saved {} ({})", dest.display(), fmt_bytes(bytes.len() as u64));
        }
    }

    controller.burn().await.context("burning shared item")
}

/// Write a received file. An existing file is refused unless `force`; a
/// partial file is removed when the write fails.
async fn write_received(dest: &Path, bytes: &[u8], force: bool) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(dest).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            anyhow::bail!("{} already exists; pass --force to overwrite", dest.display())
        }
        Err(e) => return Err(e).with_context(|| format!("creating {}", dest.display())),
    };

    let written = match file.write_all(bytes).await {
        Ok(()) => file.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(dest).await {
            debug!(path = %dest.display(), error = %rm, "could not remove partial file");
        }
        return Err(e).with_context(|| format!("writing {}", dest.display()));
    }
    Ok(())
}

/// Keep only the final path component of a sender-supplied name, without
/// leading dots so a share cannot land as a hidden dotfile.
fn safe_file_name(name: &str) -> PathBuf {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().trim_start_matches('.').to_string())
        .filter(|n| !n.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("download"))
}

// ── `sealdrop status` ─────────────────────────────────────────────────────────

async fn cmd_status(config: &SealdropConfig) -> Result<()> {
    let api = build_api(config)?;
    let server = sealdrop_api::check_health(&api)
        .await
        .with_context(|| format!("server at {} is unreachable", config.server.base_url))?;

    println!("sealdrop v{}", env!("CARGO_PKG_VERSION"));
    println!("  server:        {} [ok]", config.server.base_url);
    println!("  share links:   {}", config.server.share_base());
    println!(
        "  max file size: {} MB{}",
        server.effective_max_file_size_mb(),
        if server.max_file_size_mb.is_none() {
            " (default)"
        } else {
            ""
        }
    );
    match (server.expiration.enabled, &server.expiration.default_duration) {
        (true, Some(default)) => println!("  expiration:    enabled (default {default})"),
        (true, None) => println!("  expiration:    enabled"),
        (false, _) => println!("  expiration:    disabled"),
    }
    println!("  chunk size:    {}", fmt_bytes(config.upload.chunk_size_bytes as u64));
    Ok(())
}

// ── `sealdrop config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SealdropConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
