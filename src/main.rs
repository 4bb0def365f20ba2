#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = bookstore_app::app::bootstrap()?;
    bookstore_app::app::run(settings).await
}
