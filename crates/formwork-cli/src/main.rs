//! Binary entrypoint for the Formwork CLI.

#[tokio::main]
async fn main() {
    let exit_code = formwork_cli::run().await;
    std::process::exit(exit_code);
}
