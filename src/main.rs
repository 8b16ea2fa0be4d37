//! devicefm: file manager and WebREPL terminal for a MicroPython device.

mod client;
mod config;
mod editor;
mod mime;
mod platform;
mod protocol;
mod terminal;
mod ui;
mod upload;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::client::DeviceClient;
use crate::config::Config;
use crate::editor::EditSession;
use crate::protocol::StopTarget;
use crate::terminal::console::{stdin_keystrokes, ConsoleDisplay};
use crate::terminal::transport::WebSocketConnector;
use crate::terminal::HandshakeRules;
use crate::ui::ConsoleDashboard;
use crate::upload::UploadPipeline;

#[derive(Parser, Debug)]
#[command(name = "devicefm", version, about)]
struct Cli {
    /// Device hostname or IP
    #[arg(long, global = true, env = "DEVICEFM_HOST")]
    host: Option<String>,

    /// HTTP port of the file server
    #[arg(long, global = true, env = "DEVICEFM_HTTP_PORT")]
    http_port: Option<u16>,

    /// WebREPL port
    #[arg(long, global = true, env = "DEVICEFM_SHELL_PORT")]
    shell_port: Option<u16>,

    /// HTTP Basic auth user
    #[arg(long, global = true, env = "DEVICEFM_USER")]
    user: Option<String>,

    /// HTTP Basic auth password
    #[arg(long, global = true, env = "DEVICEFM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// WebREPL password
    #[arg(long, global = true, env = "DEVICEFM_REPL_PASSWORD", hide_env_values = true)]
    repl_password: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List apps and websites on the device
    Ls,
    /// Print a file
    Cat { name: String },
    /// Edit a file in $EDITOR and save it back
    Edit { name: String },
    /// Replace a file with the contents of a local file
    Save {
        name: String,
        #[arg(long)]
        from: PathBuf,
    },
    /// Start a script
    Run { name: String },
    /// Stop a script, or everything when no name is given
    Stop { name: Option<String> },
    /// Delete a file or website
    Rm {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Upload files and folders, one at a time
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show filesystem usage
    Stats {
        /// Poll every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Open the device shell (Ctrl+] to exit)
    Term,
    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

impl Cli {
    /// Config file values overridden by flags and environment.
    fn resolve_config(&self) -> Config {
        self.apply_overrides(config::load_config().unwrap_or_default())
    }

    fn apply_overrides(&self, mut cfg: Config) -> Config {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.http_port {
            cfg.http_port = port;
        }
        if let Some(port) = self.shell_port {
            cfg.shell_port = port;
        }
        if let Some(user) = &self.user {
            cfg.username = user.clone();
        }
        if let Some(password) = &self.password {
            cfg.password = password.clone();
        }
        if let Some(password) = &self.repl_password {
            cfg.repl_password = password.clone();
        }
        cfg
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "devicefm=debug" } else { "devicefm=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.resolve_config();

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{} {}", "✗".red(), e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = DeviceClient::new(&config);

    match command {
        Commands::Ls => {
            let files = client.list_files().await?;
            print!("{}", ui::render_listing(&files, client.base_url()));
        }
        Commands::Cat { name } => {
            print!("{}", client.read_file(&name).await?);
        }
        Commands::Edit { name } => edit(&client, &name).await?,
        Commands::Save { name, from } => {
            let code = std::fs::read_to_string(&from)?;
            EditSession::new(name, "").save(&client, &code).await?;
            ui::toast("Saved!");
        }
        Commands::Run { name } => {
            ui::toast(&format!("Starting {}...", name));
            client.run_file(&name).await?;
        }
        Commands::Stop { name } => {
            let target = StopTarget::from(name);
            client.stop(&target).await?;
            match target {
                StopTarget::All => ui::toast("Stopping Everything..."),
                StopTarget::File(_) => ui::toast("Stop Signal Sent!"),
            }
        }
        Commands::Rm { name, yes } => {
            if !yes && !confirm(&format!("Delete {}?", name))? {
                return Ok(());
            }
            client.delete_file(&name).await?;
            ui::toast("Deleted");
            ui::refresh_listing(&client).await;
            ui::refresh_stats(&client).await;
        }
        Commands::Upload { paths } => {
            let files = upload::collect_selection(&paths);
            if files.is_empty() {
                return Err("nothing to upload".into());
            }
            let mut pipeline = UploadPipeline::new(client.clone(), ConsoleDashboard::new(client))
                .with_settle_delay(config.upload_settle_delay());
            let result = pipeline.run(files).await;
            if result.failed() > 0 {
                eprintln!(
                    "{} {} of {} files failed",
                    "!".yellow(),
                    result.failed(),
                    result.total
                );
            }
        }
        Commands::Stats { watch: None } => {
            println!("{}", ui::render_stats(&client.stats().await?));
        }
        Commands::Stats { watch: Some(secs) } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => ui::refresh_stats(&client).await,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Commands::Term => term(&config).await?,
        Commands::Config(cmd) => config_command(cmd, &config)?,
    }
    Ok(())
}

async fn edit(client: &DeviceClient, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = EditSession::open(client, name).await?;
    let edited = editor::edit_text(session.file(), session.original())?;
    if !session.is_modified(&edited) {
        ui::toast("No changes");
        return Ok(());
    }
    session.save(client, &edited).await?;
    ui::toast("Saved!");
    Ok(())
}

async fn term(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let connector = WebSocketConnector::new(config.shell_url());
    let rules = HandshakeRules::webrepl(&config.repl_password);
    let mut display = ConsoleDisplay::new();

    eprintln!(
        "{} {} {}",
        "Connecting to".dimmed(),
        config.shell_url().cyan(),
        "(Ctrl+] to exit)".dimmed()
    );
    let Some(session) = terminal::init(&mut display, &connector, rules).await? else {
        return Ok(());
    };
    let result = session.run(stdin_keystrokes()).await;
    if display.is_raw() {
        print!("\r\n");
    }
    drop(display);
    result?;
    Ok(())
}

fn confirm(question: &str) -> std::io::Result<bool> {
    eprint!("{} [y/N] ", question);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn config_command(cmd: ConfigCommand, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            shown.password = mask(&shown.password);
            shown.repl_password = mask(&shown.repl_password);
            println!("{}", serde_json::to_string_pretty(&shown)?);
            println!(
                "{} {}",
                "File:".dimmed(),
                config::config_file().display()
            );
        }
        ConfigCommand::Init => {
            let path = config::config_file();
            if path.exists() {
                println!(
                    "{} Config already present at {}",
                    "·".dimmed(),
                    path.display().to_string().dimmed()
                );
            } else {
                config::save_config(&Config::default())?;
                println!(
                    "{} Wrote default config to {}",
                    "✓".green(),
                    path.display().to_string().cyan()
                );
            }
        }
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
