use anyhow::Result;
use logscan::app;

#[tokio::main]
async fn main() -> Result<()> {
	app::start().await
}
