use clap::Parser;

use ragguard_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	ragguard_eval::run(args).await
}
