#[tokio::main]
async fn main() -> anyhow::Result<()> {
    watchlater_lib::run().await
}
