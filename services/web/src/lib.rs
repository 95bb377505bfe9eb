mod cli;
mod eligibility;
mod infra;
mod routes;
mod server;

use record_a_recall::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
