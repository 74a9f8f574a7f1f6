use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = armory_api::Args::parse();

	armory_api::run(args).await
}
