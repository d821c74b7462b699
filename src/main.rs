use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{info, warn};

use prompt_lens::config::{Config, Mode};
use prompt_lens::envelope::{self, Reply, Strategy, Upstream, UpstreamResponse};
use prompt_lens::{Error, Language, Result};

const DEFAULT_CONFIG: &str = "prompt-lens.toml";

#[derive(Parser)]
#[command(
    name = "prompt-lens",
    about = "Score image-generation prompts and suggest improvements",
    version
)]
struct Cli {
    /// Config file (defaults to ./prompt-lens.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suggestion language (en or es)
    #[arg(long, global = true)]
    lang: Option<Language>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze prompts from files (reads stdin if none provided)
    Analyze {
        files: Vec<PathBuf>,

        /// Captured provider reply to use when the config selects remote mode
        #[arg(long)]
        upstream: Option<PathBuf>,

        /// Content type of the captured provider reply
        #[arg(long, default_value = "application/json")]
        content_type: String,
    },
    /// Normalize a captured provider reply (reads stdin if no file given)
    Normalize {
        /// The prompt that was sent to the provider
        #[arg(long)]
        prompt: String,

        #[arg(long, default_value = "application/json")]
        content_type: String,

        file: Option<PathBuf>,
    },
}

/// A provider reply saved to disk, replayed in place of the network call.
struct CapturedReply {
    body: String,
    content_type: String,
}

impl Upstream for CapturedReply {
    fn forward(&self, _prompt: &str) -> Result<UpstreamResponse> {
        Ok(UpstreamResponse {
            status: 200,
            content_type: self.content_type.clone(),
            body: self.body.clone(),
        })
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("reading {}: {e}", path.display()),
            ))
        }),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    if cli.config.is_some() && !path.exists() {
        return Err(Error::Config(format!("{} not found", path.display())));
    }
    let mut config = Config::load(&path)?;
    config.apply_env()?;
    if let Some(lang) = cli.lang {
        config.language = lang;
    }
    config.validate()?;
    Ok(config)
}

fn print_reply(reply: &Reply) -> Result<()> {
    if !reply.is_success() {
        warn!("upstream answered with status {}", reply.status);
    }
    println!("{}", reply.render()?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Analyze {
            files,
            upstream,
            content_type,
        } => {
            let captured = match (config.mode, upstream) {
                (Mode::Remote, Some(path)) => {
                    if let Some(target) = config.webhook_target() {
                        info!(
                            "replaying {} in place of {} (timeout {}s)",
                            path.display(),
                            target.url,
                            target.timeout.as_secs()
                        );
                    }
                    Some(CapturedReply {
                        body: read_input(Some(path.as_path()))?,
                        content_type: content_type.clone(),
                    })
                }
                (Mode::Remote, None) => {
                    return Err(Error::Config(
                        "remote mode needs --upstream with a captured provider reply".to_string(),
                    ))
                }
                (Mode::Local, _) => None,
            };
            let strategy = config.strategy(captured.as_ref().map(|c| c as &dyn Upstream))?;

            if files.is_empty() {
                let input = read_input(None)?;
                print_reply(&envelope::handle(&strategy, Some(input.as_str()))?)?;
            }
            for path in files {
                let input = read_input(Some(path.as_path()))?;
                print_reply(&envelope::handle(&strategy, Some(input.as_str()))?)?;
            }
        }
        Command::Normalize {
            prompt,
            content_type,
            file,
        } => {
            let captured = CapturedReply {
                body: read_input(file.as_deref())?,
                content_type: content_type.clone(),
            };
            let reply = envelope::handle(&Strategy::Remote(&captured), Some(prompt.as_str()))?;
            print_reply(&reply)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
