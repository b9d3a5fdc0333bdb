use anyhow::Context;
use clap::Parser;
use gsview_graph::EdgeKind;
use gsview_utils::registry;
use log::*;

pub mod cli;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .format_indent(None)
        .format_timestamp(None)
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = cli::Args::parse();
    debug!("gsview {VERSION}");

    let buf = std::fs::read(&args.file)
        .with_context(|| format!("couldn't read {}", args.file.display()))?;
    let view = gsview_graph::load_graph(&buf)
        .with_context(|| format!("couldn't decode {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    info!(
        "{}: {} nodes, {} connections",
        args.file.display(),
        view.nodes.len(),
        view.edges.len()
    );

    for node in &view.nodes {
        println!(
            "#{:<4} {}  @ ({:.0}, {:.0})",
            node.index, node.class_name, node.position.x, node.position.y
        );
        for parameter in &node.parameters {
            println!(
                "      {} ({}) = {}",
                parameter.name, parameter.type_name, parameter.display
            );
        }
    }

    if args.edges {
        for edge in &view.edges {
            let arrow = match edge.kind {
                EdgeKind::Flow => "->",
                EdgeKind::Variable => "~>",
            };
            println!(
                "#{} {arrow} #{}  ({} {arrow} {})",
                edge.source_index,
                edge.target_index,
                registry::resolve_or_hex(edge.source_pin_hash),
                registry::resolve_or_hex(edge.target_pin_hash),
            );
        }
    }

    Ok(())
}
