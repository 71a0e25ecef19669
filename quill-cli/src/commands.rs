//! CLI subcommand handlers.

use crate::AuthAction;
use crate::Commands;
use crate::ConfigAction;
use quill_core::analysis::{Topic, WritingSubmission};
use quill_core::config::{WORKSPACE_DIR, user_config_path, workspace_config_path};
use quill_core::credentials::{
    CredentialStore, FileCredentialStore, GEMINI_PROVIDER, is_usable_key, resolve_api_key_from,
};
use quill_core::proxy::ProxyState;
use quill_core::{NormalizedAnalysis, QuillConfig, WritingAnalyzer, recover_analysis};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config: QuillConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Analyze {
            topic,
            difficulty,
            file,
            minutes,
            json,
        } => {
            let content = read_input(file.as_deref())?;
            let submission = WritingSubmission::new(
                Topic::new(topic, difficulty),
                content,
                Duration::from_secs(minutes.saturating_mul(60)),
            );
            handle_analyze(&submission, &config, json).await
        }
        Commands::Recover {
            file,
            submission,
            topic,
            json,
        } => {
            let raw = read_input(file.as_deref())?;
            let content = match submission {
                Some(path) => std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read {}: {}", path.display(), e)
                })?,
                None => String::new(),
            };
            let submission =
                WritingSubmission::new(Topic::new(topic, "Unknown"), content, Duration::ZERO);
            let analysis = recover_analysis(&raw, &submission, &config.gemini.model);
            print_analysis(&analysis, json)
        }
        Commands::Serve {
            host,
            port,
            static_dir,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.proxy.host = host;
            }
            if let Some(port) = port {
                config.proxy.port = port;
            }
            if static_dir.is_some() {
                config.proxy.static_dir = static_dir;
            }
            handle_serve(&config).await
        }
        Commands::Config { action } => handle_config(action, workspace, &config),
        Commands::Auth { action } => {
            let store = FileCredentialStore::default_location()?;
            handle_auth(action, &config, &store)
        }
        Commands::Last => handle_last(&config),
    }
}

async fn handle_analyze(
    submission: &WritingSubmission,
    config: &QuillConfig,
    json: bool,
) -> anyhow::Result<()> {
    if submission.content.trim().is_empty() {
        anyhow::bail!("Nothing to analyze: the submission is empty");
    }

    let store = FileCredentialStore::default_location()?;
    let analyzer = WritingAnalyzer::from_config(config, &store)?;
    if !json {
        eprintln!(
            "Analyzing {} words with {}...",
            submission.word_count,
            analyzer.client().model()
        );
    }
    let analysis = analyzer.analyze(submission).await?;
    print_analysis(&analysis, json)
}

async fn handle_serve(config: &QuillConfig) -> anyhow::Result<()> {
    let store = FileCredentialStore::default_location()?;
    let state = ProxyState::from_config(config, &store)?;
    if !state.has_key() {
        eprintln!(
            "Warning: no API key configured; /api/gemini will answer 500 until {} is set.",
            config.gemini.api_key_env
        );
    }
    println!(
        "Quill proxy on http://{} (POST /api/gemini, Ctrl-C to stop)",
        config.proxy.bind_addr()
    );
    quill_core::proxy::run(config, Arc::new(state)).await?;
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path, config: &QuillConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(WORKSPACE_DIR);
            std::fs::create_dir_all(&config_dir)?;

            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = QuillConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.gemini.api_key.is_some() {
                shown.gemini.api_key = Some("********".to_string());
            }
            let toml_str = toml::to_string_pretty(&shown)?;
            println!("{}", toml_str);
            Ok(())
        }
        ConfigAction::Path => {
            let mark = |p: &Path| if p.exists() { "" } else { " (not found)" };
            match user_config_path() {
                Some(path) => println!("user:      {}{}", path.display(), mark(&path)),
                None => println!("user:      unavailable (no home directory)"),
            }
            let ws = workspace_config_path(workspace);
            println!("workspace: {}{}", ws.display(), mark(&ws));
            println!("env:       QUILL_* (nested with __, e.g. QUILL_GEMINI__MODEL)");
            Ok(())
        }
    }
}

fn handle_auth(
    action: AuthAction,
    config: &QuillConfig,
    store: &dyn CredentialStore,
) -> anyhow::Result<()> {
    match action {
        AuthAction::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => read_input(None)?,
            };
            let key = key.trim();
            if !is_usable_key(key) {
                anyhow::bail!("Refusing to store an empty or placeholder API key");
            }
            store.store_key(GEMINI_PROVIDER, key)?;
            println!("Stored Gemini API key.");
            Ok(())
        }
        AuthAction::Status => {
            let mode = if config.gemini.use_proxy {
                format!("proxy ({})", config.gemini.proxy_url)
            } else {
                "direct".to_string()
            };
            println!("Model: {}", config.gemini.model);
            println!("Mode:  {}", mode);
            match resolve_api_key_from(&config.gemini, store, |name| std::env::var(name).ok()) {
                Ok((_, source)) => println!("Key:   configured (from {})", source),
                Err(e) => println!("Key:   not configured ({})", e),
            }
            Ok(())
        }
        AuthAction::Clear => {
            if store.has_key(GEMINI_PROVIDER) {
                store.delete_key(GEMINI_PROVIDER)?;
                println!("Removed stored Gemini API key.");
            } else {
                println!("No stored Gemini API key.");
            }
            Ok(())
        }
    }
}

fn handle_last(config: &QuillConfig) -> anyhow::Result<()> {
    let Some(path) = &config.debug.raw_response_path else {
        anyhow::bail!(
            "No raw response mirror configured. Set debug.raw_response_path to record responses."
        );
    };
    let record = quill_core::debug_cache::load_mirror(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    println!(
        "Received {} ({} chars)\n",
        record.received_at.to_rfc3339(),
        record.length
    );
    println!("{}", record.text);
    Ok(())
}

fn print_analysis(analysis: &NormalizedAnalysis, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
    } else {
        print!("{}", crate::report::render(analysis));
    }
    Ok(())
}

/// Read a whole file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
