use anyhow::Result;
use procgraph::http::HttpServer;
use procgraph::{Config, ProcessFacade};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.logging.log_level.as_str()),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" => run_http_server(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Usage: procgraph [serve]", other),
    }

    Ok(())
}

/// Connect to Neo4j and serve the web API
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting procgraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Neo4j: {} as {}", config.neo4j.uri(), config.neo4j.user);

    let facade = ProcessFacade::connect(&config.neo4j).await?;
    log::info!("Connected to Neo4j");

    let server = HttpServer::new(facade);
    server.run(&config.http_addr()).await?;

    Ok(())
}
