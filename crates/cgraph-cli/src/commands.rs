use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tracing::debug;

use cgraph_dimension::DimensionSpacePoint;
use cgraph_projection::{
    read_event_log_file, AppliedEvent, CgraphConfig, ContentGraphProjection, SubgraphTree, VisibilityConstraints,
};
use cgraph_schema::ContentGraphSchemaBuilder;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Schema(args) => cmd_schema(&config, args, format),
        Command::Replay(args) => cmd_replay(config, args, format),
        Command::Tree(args) => cmd_tree(config, args, format),
        Command::Dimensions(_) => cmd_dimensions(&config, format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CgraphConfig> {
    match path {
        Some(path) => CgraphConfig::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(CgraphConfig::default()),
    }
}

fn cmd_schema(config: &CgraphConfig, args: SchemaArgs, format: OutputFormat) -> anyhow::Result<()> {
    let prefix = args.prefix.unwrap_or_else(|| config.table_prefix.clone());
    let schema = ContentGraphSchemaBuilder::new(prefix)?.build()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schema)?),
        OutputFormat::Text => print!("{}", schema.to_sql(args.dialect)),
    }
    Ok(())
}

/// Apply every event of the log. Returns the applied events and the number
/// of failures; without `keep_going` the first failure is returned as error.
fn replay(
    projection: &ContentGraphProjection,
    log: &Path,
    keep_going: bool,
    format: OutputFormat,
) -> anyhow::Result<(Vec<AppliedEvent>, usize)> {
    let envelopes = read_event_log_file(log).with_context(|| format!("reading {}", log.display()))?;
    debug!(path = %log.display(), events = envelopes.len(), "read event log");
    let mut applied = Vec::with_capacity(envelopes.len());
    let mut failed = 0;
    for (index, envelope) in envelopes.iter().enumerate() {
        match projection.apply(envelope) {
            Ok(event) => {
                if matches!(format, OutputFormat::Text) {
                    println!(
                        "  {} {} {} v{}",
                        "✓".green(),
                        event.content_stream_id.short_id().dimmed(),
                        event.event_type,
                        event.version.to_string().yellow()
                    );
                }
                applied.push(event);
            }
            Err(e) if keep_going => {
                failed += 1;
                eprintln!(
                    "  {} event {} ({}): {}",
                    "✗".red(),
                    index + 1,
                    envelope.event.event_type(),
                    e.to_string().red()
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("applying event {} ({})", index + 1, envelope.event.event_type()))
            }
        }
    }
    Ok((applied, failed))
}

fn cmd_replay(config: CgraphConfig, args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let projection = ContentGraphProjection::in_memory(config)?;
    let (applied, failed) = replay(&projection, &args.log, args.keep_going, format)?;
    let pruned = if args.prune { Some(projection.prune_removed()?) } else { None };
    let streams = projection.content_streams()?;

    if let OutputFormat::Json = format {
        let report = serde_json::json!({
            "applied": applied,
            "failed": failed,
            "pruned": pruned,
            "content_streams": streams,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "{} {} events applied, {} failed",
        "Replay:".bold(),
        applied.len().to_string().green(),
        if failed == 0 { failed.to_string().normal() } else { failed.to_string().red() }
    );
    if let Some(report) = pruned {
        println!(
            "Pruned {} content streams and {} node records",
            report.content_streams.len(),
            report.node_records
        );
    }
    for stream in streams {
        let state = if stream.removed {
            "removed".red()
        } else {
            stream.state.to_string().cyan()
        };
        let source = stream
            .source_content_stream_id
            .map(|source| format!(" (fork of {})", source.short_id()))
            .unwrap_or_default();
        println!("  {}  v{}  {}{}", stream.id, stream.version.to_string().yellow(), state, source.dimmed());
    }
    Ok(())
}

fn cmd_tree(config: CgraphConfig, args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let point = DimensionSpacePoint::from_json(&args.point).context("parsing --point")?;
    let projection = ContentGraphProjection::in_memory(config)?;
    replay(&projection, &args.log, false, OutputFormat::Json)?;

    let visibility = args
        .hide
        .into_iter()
        .fold(VisibilityConstraints::unrestricted(), VisibilityConstraints::excluding);
    let subgraph = projection.subgraph_with(args.stream, &point, visibility)?;
    let forest = subgraph.tree()?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&forest)?);
        return Ok(());
    }
    println!("{} {} at {}", "Subgraph".bold(), args.stream, point.to_string().cyan());
    if forest.is_empty() {
        println!("  (no visible nodes)");
    }
    for tree in &forest {
        print_tree(tree, 1);
    }
    Ok(())
}

fn print_tree(tree: &SubgraphTree, depth: usize) {
    let node = &tree.node;
    let name = node
        .name
        .as_ref()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "-".into());
    let tags: Vec<String> = node.subtree_tags.tags().map(|tag| tag.to_string()).collect();
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", tags.join(", "))
    };
    println!(
        "{}{} {} {} {}{}",
        "  ".repeat(depth),
        name.bold(),
        node.aggregate_id.to_string().yellow(),
        node.node_type.to_string().dimmed(),
        node.origin.to_string().cyan(),
        tags.magenta()
    );
    for child in &tree.children {
        print_tree(child, depth + 1);
    }
}

fn cmd_dimensions(config: &CgraphConfig, format: OutputFormat) -> anyhow::Result<()> {
    let variation = config.variation_graph()?;
    let points = variation.allowed_points();

    if let OutputFormat::Json = format {
        let rows: Vec<_> = points
            .iter()
            .map(|point| serde_json::json!({ "hash": point.hash(), "point": point }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{} allowed dimension space points", points.len().to_string().bold());
    for point in points {
        let generalization = variation
            .primary_generalization(point)?
            .map(|g| format!(" → {g}"))
            .unwrap_or_default();
        println!("  {}  {}{}", point.hash().to_string().dimmed(), point.to_string().cyan(), generalization);
    }
    Ok(())
}
