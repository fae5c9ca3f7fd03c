use charmkit::{
    commands::{
        config::{self, ConfigAction},
        unpack,
    },
    logger, GlobalOpts,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "charmkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Charm manifest generator",
    long_about = "charmkit turns a Python unit class into charm manifests and a packaged source tree."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write manifests for a unit source and copy it into a charm tree
    Unpack(unpack::UnpackCommand),
    /// Configure charmkit
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn init_tracing(opts: &GlobalOpts) {
    let level = opts.tracing_level();
    let default_filter = format!(
        "charmkit={level},charmkit_manifest={level}",
        level = level
    );
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(&cli.global);

    let result = match cli.command {
        Commands::Unpack(cmd) => unpack::handle_unpack(cmd, &cli.global),
        Commands::Config { action } => config::handle_config(action, &cli.global),
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        if cli.global.verbosity_level() > 0 {
            logger::show_log_path();
        }
        std::process::exit(1);
    }
}
