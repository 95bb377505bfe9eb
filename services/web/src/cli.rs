use crate::eligibility::{run_eligibility, EligibilityArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use record_a_recall::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "record-a-recall",
    about = "Record and edit recalls of released offenders to custody",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Assess a court-case export against a revocation date
    Eligibility(EligibilityArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve against an in-memory case-management API seeded with demo data
    #[arg(long)]
    pub(crate) stub_api: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Eligibility(args) => run_eligibility(args),
    }
}
