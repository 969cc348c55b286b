use sanzhan::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::builder().build();

    app.run().await?;
    Ok(())
}
