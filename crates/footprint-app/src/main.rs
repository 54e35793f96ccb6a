#[tokio::main]
async fn main() -> anyhow::Result<()> {
    footprint_app::run(std::env::args().nth(1)).await
}
