use anyhow::{Context, Result};
use clap::Parser;
use procgraph::facade::{node_id, to_json_text};
use procgraph::graph::JsonObject;
use procgraph::{Config, NodeList, ProcessFacade};

#[derive(Parser, Debug)]
#[command(name = "walk")]
#[command(about = "Walk a process model from its start event and print each step as JSON")]
struct Args {
    /// Name of the start event
    #[arg(short, long, default_value = "Machine burns")]
    start: String,

    /// Only list attachments carrying this label
    #[arg(short = 't', long)]
    stuff_type: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let facade = ProcessFacade::connect(&config.neo4j).await?;
    let stuff_type = args.stuff_type.as_deref();

    let start_text = facade.get_start_by_name(&args.start).await?;
    print_step("Start event", &start_text);
    let start: JsonObject = serde_json::from_str(&start_text)?;

    let id = node_id(&start)?.to_string();
    print_step("Node by id", &facade.get_node_by_id(&id).await?);

    let next_text = facade.get_next(&start).await?;
    print_step("Next steps", &next_text);

    let next: NodeList = serde_json::from_str(&next_text)?;
    let first = next
        .nodes
        .first()
        .with_context(|| format!("'{}' has no successor", args.start))?;

    print_step(
        "Attachments of first step",
        &facade.get_stuff(first, stuff_type).await?,
    );
    print_step(
        "All attachments from first step",
        &facade.get_all_stuff(first, stuff_type).await?,
    );

    let graph = facade.traverse_tree(first).await?;
    print_step("Process from first step", &to_json_text(&graph)?);

    Ok(())
}

fn print_step(title: &str, body: &str) {
    println!("------ {}", title);
    println!("{}", body);
}
