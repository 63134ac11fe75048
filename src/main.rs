use clap::Parser;
use llm_stream::cli::{self, Args};
use log::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    cli::run(args).await?;
    Ok(())
}
