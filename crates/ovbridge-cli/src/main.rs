//! `ovbridge` - run the editor/language-server bridge from a terminal.
//!
//! Documents are plain files: `--code` is the primary `ov` surface and `--schema` the `yaml`
//! schema surface. Generated code from the server goes to stdout or `--output`, and the shared
//! content store is persisted to `--state`.
//!
//! ```bash
//! ovbridge --code model.ov --schema schema.yaml --watch --state state.json
//! RUST_LOG=ovbridge_lsp=debug ovbridge --config ovbridge.toml --code model.ov
//! ```
//!
//! While running, stdin accepts `culture <value>`, `language <value>`, `show` and `quit`.

mod commands;
mod config;
mod watch;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Command, parse_command, spawn_stdin_reader};
use config::ServerOverrides;
use ovbridge_editor::{ContentKey, ContentManager, EditorWorkspace, OptionKind, PageControls, Surface};
use ovbridge_lang::{OV_LANGUAGE_ID, SCHEMA_LANGUAGE_ID};
use ovbridge_lsp::{
    BridgeContext, BridgeError, BridgeEvent, EditorProtocolBridge, GeneratedCode, ReconnectingSocket,
    ServerNotification, SessionOptions, document_uri_for_path,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use watch::DocumentWatcher;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "ovbridge", version, about = "Bridge ov documents to an ovLanguage server")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerOverrides,

    /// Primary `ov` document.
    #[arg(long, value_name = "FILE")]
    code: Option<PathBuf>,

    /// Schema document (YAML).
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// JSON file the content store is loaded from and saved to.
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Write generated code here instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Re-read `--code` / `--schema` when they change on disk.
    #[arg(long)]
    watch: bool,

    /// Initial language id of the output surface.
    #[arg(long, value_name = "ID", default_value = "plaintext")]
    output_language: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

/// Open a surface from a file, or from the stored value when no file was given.
fn open_surface(
    workspace: &mut EditorWorkspace,
    surface: Surface,
    language_id: &str,
    file: Option<&Path>,
    stored: Option<&str>,
) -> Result<()> {
    match file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let uri = document_uri_for_path(path)
                .with_context(|| format!("cannot build a URI for {}", path.display()))?;
            workspace.open(surface, uri, language_id, text);
        }
        None => workspace.open(
            surface,
            format!("inmemory://model/{surface}"),
            language_id,
            stored.unwrap_or_default(),
        ),
    }
    Ok(())
}

fn build_context(cli: &Cli, controls: PageControls) -> Result<BridgeContext> {
    let content = match &cli.state {
        Some(path) => ContentManager::load(path)
            .with_context(|| format!("failed to load state {}", path.display()))?,
        None => ContentManager::new(),
    };

    let mut workspace = EditorWorkspace::new();
    open_surface(
        &mut workspace,
        Surface::Primary,
        OV_LANGUAGE_ID,
        cli.code.as_deref(),
        content.get(ContentKey::Code),
    )?;
    open_surface(
        &mut workspace,
        Surface::Schema,
        SCHEMA_LANGUAGE_ID,
        cli.schema.as_deref(),
        content.get(ContentKey::Schema),
    )?;
    workspace.open(
        Surface::Output,
        "inmemory://model/output",
        cli.output_language.as_str(),
        "",
    );

    Ok(BridgeContext::new(workspace, content, controls))
}

fn emit_generated(output: Option<&Path>, code: &GeneratedCode) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, &code.implementation)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(language = %code.language, path = %path.display(), "generated code written");
        }
        None => println!("{}", code.implementation),
    }
    Ok(())
}

fn show_state(context: &BridgeContext) {
    for key in [
        ContentKey::Culture,
        ContentKey::Language,
        ContentKey::Schema,
        ContentKey::Code,
    ] {
        println!("{key}: {}", context.content.get(key).unwrap_or("<unset>"));
    }
    for kind in OptionKind::ALL {
        if let Some(control) = context.controls.get(kind) {
            let choices: Vec<&str> = control.options().iter().map(|o| o.value.as_str()).collect();
            println!(
                "{}: {} of [{}]",
                control.id(),
                control.selected_value().unwrap_or("<none>"),
                choices.join(", ")
            );
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, options) = config::resolve(cli.config.as_deref(), &cli.server, |key| {
        std::env::var(key).ok()
    })?;
    let url = config.socket_url()?;

    let controls = PageControls::from_values(options.cultures, options.languages);
    let context = build_context(&cli, controls)?;

    let socket = ReconnectingSocket::connect(&url, config.reconnect.clone())?;
    tracing::info!(%url, "connecting");
    let mut bridge = EditorProtocolBridge::new(socket, context, SessionOptions::from(&config));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let watcher = if cli.watch {
        let files: Vec<(PathBuf, Surface)> = [
            (cli.code.clone(), Surface::Primary),
            (cli.schema.clone(), Surface::Schema),
        ]
        .into_iter()
        .filter_map(|(path, surface)| path.map(|p| (p, surface)))
        .collect();
        Some(DocumentWatcher::new(&files, WATCH_DEBOUNCE)?)
    } else {
        None
    };

    let stdin = spawn_stdin_reader();
    let mut saved_revision = bridge.context().content.revision();

    while running.load(Ordering::SeqCst) {
        match bridge.poll(POLL_INTERVAL) {
            Ok(Some(BridgeEvent::SessionStarted(id))) => tracing::info!(connection = %id, "ready"),
            Ok(Some(BridgeEvent::SessionClosed(id))) => {
                tracing::info!(connection = %id, "disconnected; waiting to reconnect")
            }
            Ok(Some(BridgeEvent::Notification(ServerNotification::GeneratedCode(code)))) => {
                emit_generated(cli.output.as_deref(), &code)?;
            }
            Ok(_) => {}
            Err(BridgeError::TransportClosed) => anyhow::bail!("gave up connecting to {url}"),
            Err(err) => tracing::warn!(error = %err, "server message rejected"),
        }

        if let Some(watcher) = &watcher {
            for (surface, path) in watcher.changed() {
                let text = match fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "failed to re-read");
                        continue;
                    }
                };
                if bridge.context().workspace.text(surface) != Some(text.as_str()) {
                    bridge.edit(surface, text)?;
                }
            }
        }

        while let Ok(line) = stdin.try_recv() {
            match parse_command(&line) {
                Ok(Some(Command::Select(kind, value))) => {
                    if !bridge.select_option(kind, &value) {
                        eprintln!("'{value}' is not available for {}", kind.control_id());
                    }
                }
                Ok(Some(Command::Show)) => show_state(bridge.context()),
                Ok(Some(Command::Quit)) => running.store(false, Ordering::SeqCst),
                Ok(None) => {}
                Err(err) => eprintln!("{err}"),
            }
        }

        let revision = bridge.context().content.revision();
        if let Some(path) = &cli.state
            && revision != saved_revision
        {
            bridge
                .context()
                .content
                .save(path)
                .with_context(|| format!("failed to save state {}", path.display()))?;
            saved_revision = revision;
        }
    }

    tracing::info!("shutting down");
    Ok(())
}
