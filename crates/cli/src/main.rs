use anyhow::Result;
use clap::{Parser, Subcommand};

mod analyze;

use analyze::AnalyzeArgs;

#[derive(Parser)]
#[command(name = "riskmap")]
#[command(about = "Static release-risk graph for FastAPI services", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a repository and write risk artifacts
    Analyze(AnalyzeArgs),

    /// List the stacks riskmap can analyze
    Stacks,
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper are noisy at debug
    if !verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = match &cli.command {
        Commands::Analyze(args) => cli.quiet || args.json,
        Commands::Stacks => cli.quiet,
    };
    init_logging(cli.verbose, quiet);

    match cli.command {
        Commands::Analyze(args) => {
            let code = analyze::run(args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Stacks => {
            for stack in riskmap_collector::list_registered_stacks() {
                println!("{stack}");
            }
        }
    }
    Ok(())
}
