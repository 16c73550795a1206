//! Binary entrypoint for the tenantctl CLI.

#[tokio::main]
async fn main() {
    let exit_code = tenantctl_cli::run().await;
    std::process::exit(exit_code);
}
