//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use formwork_api_models::SortOrder;
use formwork_telemetry::{LogFormat, LoggingConfig, init_logging};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_url};
use crate::commands::auth::{handle_login, handle_logout, handle_status};
use crate::commands::objects::{handle_fields, handle_objects_list};
use crate::commands::records::{
    handle_record_create, handle_record_get, handle_record_list, handle_record_remove,
    handle_record_update,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();

    let format = cli.log_format.parse::<LogFormat>().unwrap_or_else(|err| {
        eprintln!("warning: {err}; using default log format");
        LogFormat::infer()
    });
    if let Err(err) = init_logging(&LoggingConfig {
        level: &cli.log_level,
        format,
        build_id: env!("CARGO_PKG_VERSION"),
    }) {
        eprintln!("warning: {err:#}");
    }

    let command = command_label(&cli.command);
    tracing::debug!(%trace_id, command, "running command");

    match dispatch(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            let exit_code = err.exit_code();
            tracing::debug!(%trace_id, command, exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let ctx = AppContext::from_cli(&cli, trace_id)?;
    execute(&ctx, cli.command, cli.output).await
}

pub(crate) async fn execute(
    ctx: &AppContext,
    command: Command,
    output: OutputFormat,
) -> CliResult<()> {
    match command {
        Command::Login(args) => handle_login(ctx, args).await,
        Command::Logout => handle_logout(ctx).await,
        Command::Status => handle_status(ctx, output),
        Command::Records(records) => match records {
            RecordCommand::Ls(args) => handle_record_list(ctx, args, output).await,
            RecordCommand::Get(args) => handle_record_get(ctx, args, output).await,
            RecordCommand::Create(args) => handle_record_create(ctx, args, output).await,
            RecordCommand::Update(args) => handle_record_update(ctx, args, output).await,
            RecordCommand::Rm(args) => handle_record_remove(ctx, args).await,
        },
        Command::Objects(objects) => match objects {
            ObjectCommand::Ls => handle_objects_list(ctx, output).await,
            ObjectCommand::Fields(args) => handle_fields(ctx, args, output).await,
        },
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Status => "status",
        Command::Records(RecordCommand::Ls(_)) => "records_ls",
        Command::Records(RecordCommand::Get(_)) => "records_get",
        Command::Records(RecordCommand::Create(_)) => "records_create",
        Command::Records(RecordCommand::Update(_)) => "records_update",
        Command::Records(RecordCommand::Rm(_)) => "records_rm",
        Command::Objects(ObjectCommand::Ls) => "objects_ls",
        Command::Objects(ObjectCommand::Fields(_)) => "objects_fields",
    }
}

#[derive(Parser)]
#[command(name = "formwork", about = "Command-line client for the Formwork CRM")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "FORMWORK_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "FORMWORK_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "FORMWORK_SESSION_FILE",
        help = "Where the session token is kept between runs"
    )]
    pub(crate) session_file: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, env = "FORMWORK_LOG_LEVEL", default_value = formwork_telemetry::DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "FORMWORK_LOG_FORMAT", default_value = "auto")]
    pub(crate) log_format: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Log in and keep the session for later commands.
    Login(LoginArgs),
    /// End the session.
    Logout,
    /// Show the current session.
    Status,
    /// Work with records.
    #[command(subcommand)]
    Records(RecordCommand),
    /// Inspect objects and their fields.
    #[command(subcommand)]
    Objects(ObjectCommand),
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long, env = "FORMWORK_EMAIL")]
    pub(crate) email: String,
    #[arg(long, env = "FORMWORK_PASSWORD", hide_env_values = true, help = "Prompted for when omitted")]
    pub(crate) password: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum RecordCommand {
    /// List or search records of an object.
    Ls(RecordListArgs),
    /// Show one record.
    Get(RecordGetArgs),
    /// Create a record.
    Create(RecordCreateArgs),
    /// Merge data into a record.
    Update(RecordUpdateArgs),
    /// Delete a record.
    Rm(RecordRemoveArgs),
}

#[derive(Args, Default)]
pub(crate) struct RecordListArgs {
    #[arg(long = "object")]
    pub(crate) object_id: String,
    #[arg(long)]
    pub(crate) page: Option<u32>,
    #[arg(long)]
    pub(crate) page_size: Option<u32>,
    #[arg(long)]
    pub(crate) sort_by: Option<String>,
    #[arg(long, value_parser = parse_sort_order)]
    pub(crate) sort_order: Option<SortOrder>,
    #[arg(long)]
    pub(crate) search: Option<String>,
}

#[derive(Args)]
pub(crate) struct RecordGetArgs {
    #[arg(help = "Record identifier")]
    pub(crate) id: String,
}

#[derive(Args)]
pub(crate) struct RecordCreateArgs {
    #[arg(long = "object")]
    pub(crate) object_id: String,
    #[arg(long, help = "JSON object, or @path to a JSON file")]
    pub(crate) data: String,
    #[arg(long, help = "Display label; derived from the primary field when omitted")]
    pub(crate) primary_value: Option<String>,
}

#[derive(Args)]
pub(crate) struct RecordUpdateArgs {
    #[arg(help = "Record identifier")]
    pub(crate) id: String,
    #[arg(long, help = "JSON object merged into the record, or @path")]
    pub(crate) data: String,
    #[arg(long)]
    pub(crate) primary_value: Option<String>,
}

#[derive(Args)]
pub(crate) struct RecordRemoveArgs {
    #[arg(help = "Record identifier")]
    pub(crate) id: String,
    #[arg(long = "object")]
    pub(crate) object_id: String,
}

#[derive(Subcommand)]
pub(crate) enum ObjectCommand {
    /// List objects.
    Ls,
    /// List the fields of an object.
    Fields(FieldsArgs),
}

#[derive(Args)]
pub(crate) struct FieldsArgs {
    #[arg(help = "Object identifier")]
    pub(crate) object_id: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_sort_order(input: &str) -> Result<SortOrder, String> {
    input.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_listing_flags() {
        let cli = Cli::try_parse_from([
            "formwork",
            "--output",
            "json",
            "records",
            "ls",
            "--object",
            "obj-1",
            "--page-size",
            "200",
            "--sort-by",
            "name",
            "--sort-order",
            "desc",
            "--search",
            "acme",
        ])
        .expect("valid arguments");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(command_label(&cli.command), "records_ls");
        let Command::Records(RecordCommand::Ls(args)) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.object_id, "obj-1");
        assert_eq!(args.page_size, Some(200));
        assert_eq!(args.sort_order, Some(SortOrder::Desc));
        assert_eq!(args.search.as_deref(), Some("acme"));
    }

    #[test]
    fn rejects_unknown_sort_order() {
        assert!(
            Cli::try_parse_from([
                "formwork", "records", "ls", "--object", "o", "--sort-order", "sideways",
            ])
            .is_err()
        );
    }

    #[test]
    fn global_flags_have_defaults() {
        let cli = Cli::try_parse_from(["formwork", "status"]).expect("valid arguments");
        assert_eq!(cli.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cli.api_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(command_label(&cli.command), "status");
    }
}
