use flakeforge::cli::commands::{CliArgs, Commands};
use flakeforge::cli::handlers::{handle_build, handle_detect, handle_render, handle_validate};
use flakeforge::util::logging::{init_logging, parse_level, LoggingConfig};
use flakeforge::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(logging_config(&args));

    debug!("flakeforge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(detect_args, args.quiet).await,
        Commands::Render(render_args) => handle_render(render_args).await,
        Commands::Validate(validate_args) => handle_validate(validate_args).await,
        Commands::Build(build_args) => handle_build(build_args, args.quiet).await,
    };

    std::process::exit(exit_code);
}

/// `--log-level`, then `-v`/`-q`, then the environment
fn logging_config(args: &CliArgs) -> LoggingConfig {
    let mut config = LoggingConfig::from_env();

    if let Some(level) = &args.log_level {
        config.level = parse_level(level);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    config
}
