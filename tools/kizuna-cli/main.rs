use clap::Parser;
use kizuna::prelude::*;
use kizuna::settings::EnvironmentVariableDefinition;
use std::fs;
use std::io::{self, Write};
use std::time::Instant;

/// Relationship aggregation and deployment settings CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flows JSON dump (array of flow records)
    flows_path: String,
    /// Path to the connection references JSON dump
    references_path: String,
    /// Path to the connections JSON dump
    connections_path: String,

    /// Path of the deployment settings file to generate or reconcile
    #[arg(short, long, default_value = "deploymentsettings.json")]
    output: String,

    /// Optional path to environment variable definitions to include
    #[arg(long)]
    env_vars: Option<String>,

    /// Edit-distance threshold for the fuzzy matching tier
    #[arg(long, default_value_t = DEFAULT_FUZZY_DISTANCE)]
    fuzzy_distance: usize,

    /// Maximum number of flows parsed concurrently
    #[arg(long)]
    parse_concurrency: Option<usize>,

    /// Apply the computed diff to the settings file (after confirmation)
    #[arg(long)]
    apply: bool,

    /// With --apply: also delete entries no longer present in the generated
    /// skeleton (default is to retain them)
    #[arg(long)]
    prune: bool,

    /// With --apply: skip the interactive confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Record Loading ---
    let flows: Vec<FlowRecord> = load_json(&cli.flows_path, "flows");
    let references: Vec<ConnectionReferenceRecord> =
        load_json(&cli.references_path, "connection references");
    let connections: Vec<ConnectionRecord> = load_json(&cli.connections_path, "connections");
    println!(
        "Loaded {} flows, {} connection references, {} connections",
        flows.len(),
        references.len(),
        connections.len()
    );

    // --- 2. Aggregation ---
    let aggregate_start = Instant::now();
    let mut builder = Aggregator::builder(flows, references, connections)
        .with_fuzzy_distance(cli.fuzzy_distance);
    if let Some(limit) = cli.parse_concurrency {
        builder = builder.with_parse_concurrency(limit);
    }
    let graph = builder
        .build()
        .aggregate()
        .unwrap_or_else(|e| exit_with_error(&format!("Aggregation failed: {}", e)));
    println!(
        "Aggregated {} nodes and {} edges in {:?} ({} placeholders, {} unresolved usages)",
        graph.nodes().len(),
        graph.edges().len(),
        aggregate_start.elapsed(),
        graph.placeholder_count(),
        graph.unresolved().len()
    );
    for diagnostic in graph.diagnostics() {
        println!("  warning: {}", diagnostic);
    }

    // --- 3. Settings Generation ---
    let options = GeneratorOptions {
        environment_variables: cli
            .env_vars
            .as_deref()
            .map(|path| load_json::<Vec<EnvironmentVariableDefinition>>(path, "environment variables")),
    };
    let generated = generate(&graph, &options)
        .unwrap_or_else(|e| exit_with_error(&format!("Settings generation failed: {}", e)));
    for warning in &generated.warnings {
        println!("  warning: {}", warning);
    }

    // --- 4. Reconciliation ---
    let reconciler = Reconciler::new(&cli.output);
    let diff = reconciler
        .diff_against(&generated.settings)
        .unwrap_or_else(|e| exit_with_error(&format!("Diff failed: {}", e)));
    println!("\nDiff against '{}': {}", cli.output, diff);
    for entry in &diff.added {
        println!("  + {}", entry.key);
    }
    for change in &diff.changed {
        println!(
            "  ~ {}: {} -> {}",
            change.key,
            change.old.as_deref().unwrap_or("null"),
            change.new.as_deref().unwrap_or("null")
        );
    }
    for entry in &diff.removed {
        let verdict = if cli.prune { "(will prune)" } else { "(retained)" };
        println!("  - {} {}", entry.key, verdict);
    }

    if !cli.apply {
        println!("\nDry run only. Pass --apply to write the settings file.");
        return;
    }
    if diff.is_empty() {
        println!("\nNothing to apply.");
        return;
    }
    if !cli.yes && !confirm(&format!("Apply these changes to '{}'?", cli.output)) {
        println!("Aborted; settings file untouched.");
        return;
    }

    let outcome = reconciler
        .apply(
            &diff,
            &generated.settings,
            &ApplyOptions {
                prune_removed: cli.prune,
            },
        )
        .unwrap_or_else(|e| exit_with_error(&format!("Apply failed: {}", e)));
    if let Some(backup) = &outcome.backup_path {
        println!("Previous settings backed up to '{}'", backup.display());
    }
    println!(
        "Applied {} added and {} changed entries ({} pruned) in {:?} total",
        outcome.added,
        outcome.changed,
        outcome.pruned,
        total_start.elapsed()
    );
}

fn load_json<T: serde::de::DeserializeOwned>(path: &str, what: &str) -> T {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read {} file '{}': {}", what, path, e)));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse {} JSON '{}': {}", what, path, e)))
}

fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question);
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}
