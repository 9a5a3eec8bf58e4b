use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeplay_core::config::{ConfigLoader, PlaygroundConfig};
use codeplay_core::{
    DevicePreset, Dispatcher, DispatcherState, Language, LanguageClass, PreviewBuilder,
    RemoteExecutionClient,
};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Parser, Debug)]
#[clap(name = "codeplay", author, version, about = "Multi-language code playground runner")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        global = true,
        default_value = "codeplay.yaml",
        help = "Path to the YAML configuration file"
    )]
    config: PathBuf,

    #[clap(
        long,
        short = 'L',
        global = true,
        help = "Log level, overrides logging.level from the configuration"
    )]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a source file once and print its output
    Run {
        file: PathBuf,

        #[clap(
            long,
            short,
            help = "Language name; inferred from the file extension if omitted"
        )]
        language: Option<String>,
    },
    /// Re-run a source file every time it changes
    Watch {
        file: PathBuf,

        #[clap(long, short)]
        language: Option<String>,

        #[clap(long, default_value = "250", help = "File polling interval in milliseconds")]
        poll_ms: u64,

        #[clap(long, help = "Where to write the preview page for web languages")]
        out: Option<PathBuf>,
    },
    /// Build the preview page for an HTML, CSS or JavaScript file
    Preview {
        file: PathBuf,

        #[clap(long, short)]
        language: Option<String>,

        #[clap(
            long,
            short,
            default_value = "desktop",
            help = "Device preset: desktop, tablet, mobile, iphone, ipad"
        )]
        device: String,

        #[clap(long, help = "Output file; prints to stdout if omitted")]
        out: Option<PathBuf>,
    },
    /// List the runtimes offered by the execution service
    Runtimes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::from_optional_file(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.logging.level.as_str())
        .parse()
        .unwrap_or(LevelFilter::Info);

    match cli.command {
        Commands::Watch { .. } => {
            // Keep the terminal for program output; logs go to a file.
            use std::fs::OpenOptions;

            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open("codeplay.log")
                .context("Failed to create codeplay.log file")?;

            env_logger::Builder::new()
                .filter_level(level)
                .target(env_logger::Target::Pipe(Box::new(log_file)))
                .init();
        }
        _ => {
            env_logger::Builder::new().filter_level(level).init();
        }
    }

    log::debug!("Using execution service at {}", config.execution.base_url);

    match cli.command {
        Commands::Run { file, language } => run_once(&config, &file, language.as_deref()).await,
        Commands::Watch {
            file,
            language,
            poll_ms,
            out,
        } => watch(&config, &file, language.as_deref(), poll_ms, out).await,
        Commands::Preview {
            file,
            language,
            device,
            out,
        } => preview(&file, language.as_deref(), &device, out).await,
        Commands::Runtimes => list_runtimes(&config).await,
    }
}

fn resolve_language(file: &Path, language: Option<&str>) -> Result<Language> {
    match language {
        Some(name) => Ok(name.parse()?),
        None => Language::from_extension(file).with_context(|| {
            format!(
                "Cannot infer the language of {}; pass --language",
                file.display()
            )
        }),
    }
}

fn dispatcher_for(config: &PlaygroundConfig) -> Result<Dispatcher> {
    let client = RemoteExecutionClient::from_config(config)?;
    Ok(Dispatcher::new(config, Arc::new(client)))
}

async fn run_once(config: &PlaygroundConfig, file: &Path, language: Option<&str>) -> Result<()> {
    let language = resolve_language(file, language)?;
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let dispatcher = dispatcher_for(config)?;
    let state = dispatcher.run_immediately(language, source).await;

    if config.language_table().class_of(language)? == LanguageClass::Markup {
        if let Some(preview) = &state.preview {
            println!("{}", preview.html);
        }
        return Ok(());
    }

    if state.is_error {
        eprintln!("{}", state.output_text);
        std::process::exit(1);
    }
    println!("{}", state.output_text);
    Ok(())
}

async fn watch(
    config: &PlaygroundConfig,
    file: &Path,
    language: Option<&str>,
    poll_ms: u64,
    out: Option<PathBuf>,
) -> Result<()> {
    let language = resolve_language(file, language)?;
    let dispatcher = dispatcher_for(config)?;
    let mut updates = dispatcher.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_ms.max(10)));
    let mut last_seen: Option<SystemTime> = None;
    let mut shown = updates.borrow().clone();

    println!("Watching {} as {} (Ctrl-C to stop)", file.display(), language);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                dispatcher.cancel_pending();
                println!();
                return Ok(());
            }
            _ = ticker.tick() => {
                let modified = match tokio::fs::metadata(file).await.and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => {
                        log::warn!("Cannot stat {}: {}", file.display(), e);
                        continue;
                    }
                };
                if last_seen == Some(modified) {
                    continue;
                }
                last_seen = Some(modified);

                match tokio::fs::read_to_string(file).await {
                    Ok(source) => {
                        dispatcher.on_source_changed(language, source);
                    }
                    Err(e) => log::warn!("Cannot read {}: {}", file.display(), e),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = updates.borrow_and_update().clone();
                report(&shown, &state, out.as_deref()).await?;
                shown = state;
            }
        }
    }
}

async fn report(
    previous: &DispatcherState,
    state: &DispatcherState,
    out: Option<&Path>,
) -> Result<()> {
    if state.is_loading && !previous.is_loading {
        println!("-- running...");
    }
    if state.last_applied == previous.last_applied {
        return Ok(());
    }

    if state.output_text != previous.output_text || state.completed_at != previous.completed_at {
        let stamp = state
            .completed_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        println!("-- output {}", stamp);
        println!("{}", state.output_text);
    }

    if let (Some(preview), Some(out)) = (&state.preview, out) {
        tokio::fs::write(out, preview.framed(DevicePreset::Desktop))
            .await
            .with_context(|| format!("Failed to write preview to {}", out.display()))?;
        println!("-- preview written to {}", out.display());
    }
    Ok(())
}

async fn preview(
    file: &Path,
    language: Option<&str>,
    device: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let language = resolve_language(file, language)?;
    let device: DevicePreset = device.parse()?;
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let page = PreviewBuilder::build(language, &source)?.framed(device);

    match out {
        Some(out) => {
            tokio::fs::write(&out, page)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            log::info!("Preview for {} written to {}", device.name(), out.display());
        }
        None => println!("{}", page),
    }
    Ok(())
}

async fn list_runtimes(config: &PlaygroundConfig) -> Result<()> {
    let client = RemoteExecutionClient::from_config(config)?;
    let mut runtimes = client.runtimes().await?;
    runtimes.sort_by(|a, b| a.language.cmp(&b.language).then(a.version.cmp(&b.version)));

    let table = config.language_table();
    for runtime in runtimes {
        let configured = runtime
            .language
            .parse::<Language>()
            .ok()
            .and_then(|l| table.version_for(l).ok().map(|v| v == runtime.version))
            .unwrap_or(false);
        println!(
            "{:<14} {:<10} {}{}",
            runtime.language,
            runtime.version,
            runtime.aliases.join(", "),
            if configured { "  (configured)" } else { "" }
        );
    }
    Ok(())
}
