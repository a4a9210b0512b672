#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clipcard_importer::run().await
}
