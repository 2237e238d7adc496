use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gemini-quota",
    version,
    about = "Gemini API client with multi-key quota rotation",
    long_about = "Calls the Gemini generateContent endpoint while rotating through several API keys. Quota and server errors move on to the next key with exponential backoff; usage statistics are printed after every command."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "GEMINI_QUOTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(short, long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "GEMINI_QUOTA_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Free-form generation
    Generate {
        /// Prompt text
        prompt: String,

        /// Model to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,

        /// System instruction sent ahead of the prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Print the whole response body instead of the generated text
        #[arg(long)]
        raw: bool,
    },

    /// Schema-constrained generation; prints the parsed JSON
    Structured {
        /// Prompt text
        prompt: String,

        /// JSON file holding the response schema
        #[arg(long, value_name = "FILE")]
        schema: PathBuf,

        /// Model to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Synthesize rules from descriptions and evaluate them against a context
    Rules {
        /// Context object as inline JSON, or @path to a JSON file
        #[arg(long, value_name = "JSON")]
        context: String,

        /// Natural-language rule descriptions
        #[arg(required = true)]
        descriptions: Vec<String>,

        /// Model to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the usage statistics report
    Stats,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate the configuration and credentials
    Check {
        /// Print the effective configuration
        #[arg(short, long)]
        verbose: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rules_command() {
        let cli = Cli::try_parse_from([
            "gemini-quota",
            "--json-logs",
            "rules",
            "--context",
            r#"{"quantity": 3}"#,
            "bulk discount",
            "vip upgrade",
        ])
        .unwrap();

        assert!(cli.json_logs);
        match cli.command {
            Commands::Rules {
                context,
                descriptions,
                model,
            } => {
                assert_eq!(context, r#"{"quantity": 3}"#);
                assert_eq!(descriptions, vec!["bulk discount", "vip upgrade"]);
                assert!(model.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rules_requires_descriptions() {
        assert!(Cli::try_parse_from(["gemini-quota", "rules", "--context", "{}"]).is_err());
    }

    #[test]
    fn test_parse_generate_with_system() {
        let cli = Cli::try_parse_from([
            "gemini-quota",
            "generate",
            "hello",
            "-m",
            "gemini-pro",
            "-s",
            "be brief",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Generate { ref model, ref system, raw: false, .. }
                if model.as_deref() == Some("gemini-pro") && system.as_deref() == Some("be brief")
        ));
    }
}
