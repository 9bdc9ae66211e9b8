use inference_endpoint::cli;

#[tokio::main]
async fn main() -> inference_endpoint::Result<()> {
    cli::main().await
}
