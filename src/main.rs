#[tokio::main]
async fn main() {
    if let Err(err) = probeflex::mcp::server::run_stdio().await {
        eprintln!("probeflex: {}", err);
        std::process::exit(1);
    }
}
