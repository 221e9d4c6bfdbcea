use crate::detection::{BuildType, Strategy};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Detects project types and builds them through generated Nix flakes
#[derive(Parser, Debug)]
#[command(
    name = "flakeforge",
    about = "Detects project types and builds them through generated Nix flakes",
    version,
    long_about = "flakeforge inspects a repository, picks a build strategy, renders a Nix \
                  flake for it and builds either a Nix package or an OCI image. Repositories \
                  that ship their own flake.nix or Dockerfile are built as-is."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Detect the project type of a repository",
        long_about = "Runs the ecosystem analyzers against a repository and prints the \
                      detection result.\n\n\
                      Examples:\n  \
                      flakeforge detect\n  \
                      flakeforge detect /path/to/repo --format json\n  \
                      flakeforge detect --all"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Print the flake generated for a repository",
        long_about = "Detects the repository, merges the optional job config and prints the \
                      rendered flake.\n\n\
                      Examples:\n  \
                      flakeforge render\n  \
                      flakeforge render ./svc --strategy auto-go --config job.yaml"
    )]
    Render(RenderArgs),

    #[command(
        about = "Validate a flake file",
        long_about = "Checks bracket balance and required sections, and optionally runs \
                      `nix flake check` against the file.\n\n\
                      Examples:\n  \
                      flakeforge validate flake.nix\n  \
                      flakeforge validate flake.nix --nix"
    )]
    Validate(ValidateArgs),

    #[command(
        about = "Build a repository",
        long_about = "Resolves the strategy executor, generates or reuses a recipe and runs \
                      it through nix, docker or nixpacks.\n\n\
                      Examples:\n  \
                      flakeforge build ./svc\n  \
                      flakeforge build ./svc --strategy dockerfile\n  \
                      flakeforge build ./svc --build-type oci --commit $(git rev-parse HEAD)"
    )]
    Build(BuildArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Report every matching ecosystem instead of a single result")]
    pub all: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct RenderArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 's',
        long,
        value_parser = parse_strategy,
        help = "Strategy to render for (defaults to the recommended one)"
    )]
    pub strategy: Option<Strategy>,

    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Job config file (JSON, YAML or TOML)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the flake to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(value_name = "FILE", default_value = "flake.nix", help = "Flake to validate")]
    pub file: PathBuf,

    #[arg(long, help = "Also run `nix flake check --no-build`")]
    pub nix: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 's',
        long,
        value_parser = parse_strategy,
        help = "Build strategy (defaults to the recommended one)"
    )]
    pub strategy: Option<Strategy>,

    #[arg(
        short = 't',
        long,
        value_parser = parse_build_type,
        help = "Build type: pure-nix or oci"
    )]
    pub build_type: Option<BuildType>,

    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        help = "Job config file (JSON, YAML or TOML)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "SHA", help = "Commit being built")]
    pub commit: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Previously generated recipe to reuse instead of rendering"
    )]
    pub recipe: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Write a freshly generated recipe to this file"
    )]
    pub save_recipe: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    let strategy = Strategy::from_name(&s.to_lowercase());
    if strategy.is_custom() {
        let valid: Vec<&str> = Strategy::all_variants().iter().map(|s| s.as_str()).collect();
        return Err(format!(
            "Invalid strategy: {}. Valid options: {}",
            s,
            valid.join(", ")
        ));
    }
    Ok(strategy)
}

fn parse_build_type(s: &str) -> Result<BuildType, String> {
    let build_type = BuildType::from_name(&s.to_lowercase());
    if build_type.is_custom() {
        return Err(format!(
            "Invalid build type: {}. Valid options: pure-nix, oci",
            s
        ));
    }
    Ok(build_type)
}
