#[tokio::main]
async fn main() -> anyhow::Result<()> {
    poll::start_server().await
}
