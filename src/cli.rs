// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `datachef`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "datachef",
    version,
    about = "Define ingestion pipes over object storage and run them on the processing engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `DATACHEF_CONFIG`, else `DataChef.toml` in the current
    /// working directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DATACHEF_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Manage pipe definitions.
    #[command(subcommand)]
    Pipes(PipesCommand),

    /// Run a pipe on the engine and stream its log.
    ///
    /// Ctrl-C cancels the running execution.
    Run {
        /// Pipe id.
        pipe_id: String,
        /// Folder or file to process (defaults to the pipe's storage path).
        #[arg(long, value_name = "PATH")]
        source: Option<String>,
    },

    /// Show past executions, newest first.
    History {
        /// Only executions of this pipe.
        #[arg(long, value_name = "ID")]
        pipe: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Browse and manage object storage.
    #[command(subcommand)]
    Storage(StorageCommand),

    /// Inspect tables written by the engine.
    #[command(subcommand)]
    Tables(TablesCommand),

    /// Show or change the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// A pipe spec read from a JSON file (`-` for stdin).
#[derive(Debug, Clone, Args)]
pub struct SpecInput {
    #[arg(long, short, value_name = "FILE")]
    pub file: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PipesCommand {
    List,
    Get {
        id: String,
    },
    Create(SpecInput),
    /// Apply a partial spec (only the given fields change).
    Update {
        id: String,
        #[command(flatten)]
        input: SpecInput,
    },
    Delete {
        id: String,
    },
    /// Validate a spec without storing it.
    Check(SpecInput),
    /// Create the built-in JSON and log pipes if missing.
    Seed,
    /// Split and extract an uploaded object with the pipe's settings.
    Preview {
        id: String,
        /// Object path, e.g. `/logs/app.log`.
        object: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum StorageCommand {
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    Mkdir {
        path: String,
    },
    /// Upload local files into a folder.
    ///
    /// A pipe bound to the folder is run afterwards; the command waits for it.
    Upload {
        path: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    Rm {
        path: String,
        /// Delete a folder and everything below it.
        #[arg(long, short)]
        recursive: bool,
    },
    /// Download an object to a local file (stdout if omitted).
    Get {
        path: String,
        #[arg(long, short, value_name = "FILE")]
        output: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TablesCommand {
    List,
    Preview {
        table: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    Query {
        sql: String,
        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML.
    Show,
    /// Write the default configuration to the config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Set one dotted key, e.g. `storage.endpoint minio.local`.
    Set {
        key: String,
        value: String,
    },
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn run_accepts_optional_source() {
        let args = CliArgs::try_parse_from(["datachef", "run", "p1", "--source", "/logs/a.log"])
            .unwrap();
        match args.command {
            Command::Run { pipe_id, source } => {
                assert_eq!(pipe_id, "p1");
                assert_eq!(source.as_deref(), Some("/logs/a.log"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn storage_rm_is_recursive_only_when_asked() {
        let args = CliArgs::try_parse_from(["datachef", "storage", "rm", "/logs"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Storage(StorageCommand::Rm { recursive: false, .. })
        ));
    }
}
