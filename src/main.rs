use abxplan::cli::commands::{CliArgs, Commands};
use abxplan::cli::handle_run;
use abxplan::util::logging::{config_from_env, parse_level};
use abxplan::util::{init_logging, LoggingConfig};
use abxplan::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(logging_config(&args));

    debug!("abxplan v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args, args.quiet).await,
    };

    std::process::exit(exit_code);
}

/// Flags win over `ABXPLAN_LOG_LEVEL`; `ABXPLAN_LOG_JSON` still selects the format.
fn logging_config(args: &CliArgs) -> LoggingConfig {
    let from_env = config_from_env();
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        from_env.level
    };

    LoggingConfig { level, ..from_env }
}
