use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = ragguard_api::Args::parse();

	ragguard_api::run(args).await
}
