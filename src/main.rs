// src/main.rs

use anyhow::{bail, Context as _};
use gemini_quota_client::cli::{Cli, Commands, ConfigCommands};
use gemini_quota_client::client::extract_text;
use gemini_quota_client::rules::{Context, LogicEngine, RuleSynthesizer};
use gemini_quota_client::{resolve_config_path, setup_configuration, RotatingClient};
use serde_json::Value;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_level: &str, json_logs: bool) {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json_layer = json_logs.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json_logs).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn parse_context(raw: &str) -> anyhow::Result<Context> {
    let value = match raw.strip_prefix('@') {
        Some(path) => read_json(Path::new(path))?,
        None => serde_json::from_str(raw).context("--context is not valid JSON")?,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("--context must be a JSON object, got {other}"),
    }
}

async fn run_command(client: &RotatingClient, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Generate {
            prompt,
            model,
            system,
            raw,
        } => {
            let response = match system {
                Some(system) => {
                    client
                        .call_with_system(&system, &prompt, model.as_deref())
                        .await?
                }
                None => client.call(&prompt, model.as_deref()).await?,
            };
            match extract_text(&response) {
                Some(text) if !raw => println!("{text}"),
                _ => println!("{}", serde_json::to_string_pretty(&response)?),
            }
        }
        Commands::Structured {
            prompt,
            schema,
            model,
        } => {
            let schema = read_json(&schema)?;
            let value = client
                .call_structured(&prompt, &schema, model.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Rules {
            context,
            descriptions,
            model,
        } => {
            let context = parse_context(&context)?;
            let mut synthesizer = RuleSynthesizer::new(client);
            if let Some(model) = model {
                synthesizer = synthesizer.with_model(model);
            }

            let mut engine = LogicEngine::new();
            engine.extend(synthesizer.generate_rules(&descriptions).await);
            info!(
                requested = descriptions.len(),
                generated = engine.len(),
                "Rule synthesis finished"
            );

            for rule in engine.rules() {
                println!("{rule}");
            }
            println!();
            for line in engine.evaluate(&context) {
                println!("{line}");
            }
        }
        Commands::Stats => {}
        Commands::Config {
            action: ConfigCommands::Check { verbose },
        } => {
            if verbose {
                let mut shown = client.config().clone();
                shown.api_keys = vec!["<redacted>".to_string(); shown.api_keys.len()];
                print!("{}", serde_yaml::to_string(&shown)?);
            }
            println!(
                "Configuration OK: {} API key(s), model {}",
                client.credential_count(),
                client.default_model()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli.log_level, cli.json_logs);

    let config_path = resolve_config_path(cli.config);
    let config = setup_configuration(&config_path)
        .with_context(|| format!("invalid configuration ({})", config_path.display()))?;

    let client = RotatingClient::from_env(config).map_err(|e| {
        error!(error = %e, "Failed to initialize client");
        e
    })?;

    let outcome = run_command(&client, cli.command).await;
    println!("{}", client.stats());
    outcome
}
