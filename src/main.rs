use anyhow::{Context, Result};
use clap::Parser;
use facetrail::app::{Stores, build_pipeline, open_stores};
use facetrail::cli::{Cli, Commands, ConfigAction};
use facetrail::config::Config;
use facetrail::pipeline::{FaceStatus, FinalResult};
use facetrail::vision::prune_scratch;
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!(version = %facetrail::version_string(), "starting");

    match cli.command {
        Commands::Process { video, json } => {
            let config = load_config(cli.config.as_deref())?;
            let stores = open_stores(&config)?;
            handle_process(&config, &stores, &video, json).await?;
        }
        Commands::People => {
            let config = load_config(cli.config.as_deref())?;
            list_people(&config)?;
        }
        Commands::History { name } => {
            let config = load_config(cli.config.as_deref())?;
            show_history(&config, &name)?;
        }
        Commands::Enroll { name, image } => {
            let config = load_config(cli.config.as_deref())?;
            let stores = open_stores(&config)?;
            let person = tokio::task::spawn_blocking(move || {
                stores.enrollments.enroll(&name, &image)
            })
            .await??;
            println!(
                "{} {} ({})",
                "Enrolled".green(),
                person.name,
                config.storage.faces_dir().join(&person.image).display()
            );
        }
        Commands::PruneCrops { older_than } => {
            let config = load_config(cli.config.as_deref())?;
            prune_crops(&config, older_than)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the verbosity flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("facetrail={level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from custom path or default location.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

async fn handle_process(config: &Config, stores: &Stores, video: &Path, json: bool) -> Result<()> {
    let pipeline = build_pipeline(config, stores)
        .await
        .context("cannot set up the pipeline")?;
    let result = pipeline
        .process(video)
        .await
        .with_context(|| format!("cannot process {}", video.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &FinalResult) {
    let name = result.face_name.as_deref().unwrap_or("-");
    let status = match result.face_status {
        FaceStatus::Old => "known".green().to_string(),
        FaceStatus::New => "new".yellow().to_string(),
        FaceStatus::NoFace => "no face".dimmed().to_string(),
        FaceStatus::Error => "error".red().to_string(),
    };
    println!("{}     {} ({})", "Face:".dimmed(), name, status);
    if let Some(similarity) = result.similarity {
        println!("{} {:.1}", "Similarity:".dimmed(), similarity);
    }
    if result.auto_enrolled {
        println!("{} {}", "Enrolled:".dimmed(), "yes".green());
    }
    if let Some(guess) = &result.guessed_name {
        println!("{}  {}", "Guessed:".dimmed(), guess);
    }
    if !result.conversation.is_empty() {
        println!("{}", "Conversation:".dimmed());
        for turn in &result.conversation {
            println!("  {}: {}", turn.speaker.bold(), turn.text);
        }
    }
    if let Some(error) = &result.face_error {
        eprintln!("{} {}", "Face track:".yellow(), error);
    }
    if let Some(error) = &result.transcript_error {
        eprintln!("{} {}", "Audio track:".yellow(), error);
    }
}

fn list_people(config: &Config) -> Result<()> {
    let stores = open_stores(config)?;
    let people = stores.enrollments.list();
    if people.is_empty() {
        println!("No one enrolled yet");
        return Ok(());
    }

    let faces_dir = config.storage.faces_dir();
    println!("Enrolled people:");
    for person in people {
        println!(
            "  {} {}",
            person.name.bold(),
            faces_dir.join(&person.image).display().dimmed()
        );
    }
    Ok(())
}

fn show_history(config: &Config, name: &str) -> Result<()> {
    let stores = open_stores(config)?;
    let Some(entries) = stores.log.history(name)? else {
        eprintln!("No conversation history for {}", name);
        std::process::exit(1);
    };

    for entry in entries {
        let when = chrono::DateTime::from_timestamp(entry.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| entry.timestamp.to_string());
        println!("{}", when.cyan());
        for turn in &entry.conversation {
            println!("  {}: {}", turn.speaker.bold(), turn.text);
        }
    }
    Ok(())
}

fn prune_crops(config: &Config, older_than: Duration) -> Result<()> {
    let dir = config.storage.scratch_dir();
    let removed = prune_scratch(&dir, older_than)?;
    println!(
        "Removed {} crop(s) older than {} from {}",
        removed,
        humantime::format_duration(older_than),
        dir.display()
    );
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
