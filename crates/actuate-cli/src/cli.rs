//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand};
use serde_json::Value as JsonValue;

#[derive(Parser)]
#[command(
    name = "actuate",
    about = "Actuate - run low-code data source actions",
    version,
    author = "Actuate Team"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Runtime settings file
    #[arg(long, env = "ACTUATE_SETTINGS", help = "Runtime settings file (YAML or JSON)")]
    pub settings: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute an action from a definitions file
    Exec {
        #[command(flatten)]
        target: TargetArgs,

        /// Query parameter as name=value (repeatable)
        #[arg(short = 'q', long = "query", value_name = "NAME=VALUE")]
        query: Vec<String>,

        /// Header parameter as name=value (repeatable)
        #[arg(short = 'H', long = "header", value_name = "NAME=VALUE")]
        header: Vec<String>,

        /// Binding as name=value; the value is parsed as JSON when possible
        #[arg(short = 'b', long = "bind", value_name = "NAME=VALUE")]
        bindings: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Execute an action as a multipart upload
    Upload {
        #[command(flatten)]
        target: TargetArgs,

        /// Text part as name=value (repeatable)
        #[arg(short = 'f', long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// File part as name=path (repeatable)
        #[arg(long = "file", value_name = "NAME=PATH")]
        files: Vec<String>,

        /// Binding name -> part name mapping as key=part (repeatable)
        #[arg(long = "map", value_name = "KEY=PART")]
        parameter_map: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Substitute bindings into a configuration file without executing anything
    Render {
        /// Configuration file (YAML or JSON)
        #[arg(help = "Configuration file to render")]
        file: String,

        /// Binding as name=value; the value is parsed as JSON when possible
        #[arg(short = 'b', long = "bind", value_name = "NAME=VALUE")]
        bindings: Vec<String>,

        /// Leave unresolved placeholders empty and report them instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty", help = "Output format")]
        format: OutputFormat,
    },
}

/// Which action to run and against what
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Definitions file holding applications, datasources and actions
    #[arg(help = "Definitions file (YAML or JSON)")]
    pub definitions: String,

    /// Action id
    #[arg(help = "Action id")]
    pub action_id: String,

    /// Branch to run on; the default line when omitted
    #[arg(long)]
    pub branch: Option<String>,

    /// Environment id; the configured default when omitted
    #[arg(long = "env", default_value = "")]
    pub environment: String,

    /// Run the published definition instead of the draft
    #[arg(long)]
    pub view: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Leave unresolved placeholders empty and report them instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Execution timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "pretty", help = "Output format")]
    pub format: OutputFormat,

    /// Save output to file
    #[arg(long, help = "Save output to file")]
    pub output: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Pretty,
    /// Compact JSON
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Format a JSON value according to the output format
    pub fn format_json(&self, value: &JsonValue) -> crate::error::CliResult<String> {
        Ok(match self {
            Self::Pretty => serde_json::to_string_pretty(value)?,
            Self::Json => serde_json::to_string(value)?,
            Self::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exec_arguments_parse() {
        let cli = Cli::try_parse_from([
            "actuate", "exec", "defs.yaml", "get-user", "--branch", "feature", "-q", "id=1",
            "-H", "x-tenant=acme", "-b", "limit=10", "--lenient", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Exec { target, query, header, bindings, run } => {
                assert_eq!(target.action_id, "get-user");
                assert_eq!(target.branch.as_deref(), Some("feature"));
                assert_eq!(target.environment, "");
                assert_eq!(query, vec!["id=1"]);
                assert_eq!(header, vec!["x-tenant=acme"]);
                assert_eq!(bindings, vec!["limit=10"]);
                assert!(run.lenient);
                assert_eq!(run.format, OutputFormat::Json);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn formats_render() {
        let value = json!({"a": 1});
        assert_eq!(OutputFormat::Json.format_json(&value).unwrap(), r#"{"a":1}"#);
        assert!(OutputFormat::Yaml.format_json(&value).unwrap().contains("a: 1"));
    }
}
