use anyhow::{Context, Result};
use catalog_core::config::{DEFAULT_MAX_SUGGESTIONS, DEFAULT_TOP_K};
use catalog_core::experiment::{chi_square_test, sample_size};
use catalog_core::metrics::{all_metrics, DEFAULT_K_VALUES};
use catalog_core::persist::{open_index, save_snapshot, IndexPaths, OpLog};
use catalog_core::{Document, SearchConfig, SearchFilters, SearchIndex};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, query and evaluate a catalog search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from product JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Optional JSON search config
        #[arg(long)]
        config: Option<String>,
    },
    /// Ranked search with optional filters
    Search {
        #[arg(long)]
        index: String,
        #[arg(long)]
        query: String,
        /// Number of results; zero or negative returns nothing
        #[arg(long, default_value_t = DEFAULT_TOP_K as i64, allow_negative_numbers = true)]
        k: i64,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        price_min: Option<f64>,
        #[arg(long)]
        price_max: Option<f64>,
        /// Filters as a JSON object, e.g. '{"brand": "Acme"}'. Explicit flags win.
        #[arg(long)]
        filters: Option<String>,
        #[arg(long)]
        config: Option<String>,
    },
    /// Indexed terms starting with a prefix
    Suggest {
        #[arg(long)]
        index: String,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value_t = DEFAULT_MAX_SUGGESTIONS)]
        max: usize,
        #[arg(long)]
        config: Option<String>,
    },
    /// Category, brand and price band counts for a query
    Facets {
        #[arg(long)]
        index: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        config: Option<String>,
    },
    /// Ranking metrics against judged queries: {"query": ["relevant id", ...]}
    Evaluate {
        #[arg(long)]
        index: String,
        #[arg(long)]
        qrels: String,
        /// Cutoffs, comma separated
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_K_VALUES)]
        k: Vec<usize>,
        #[arg(long)]
        config: Option<String>,
    },
    /// Chi-square test on conversion counts
    Abtest {
        #[arg(long)]
        control_conversions: u64,
        #[arg(long)]
        control_trials: u64,
        #[arg(long)]
        treatment_conversions: u64,
        #[arg(long)]
        treatment_trials: u64,
    },
    /// Per-group sample size for a conversion experiment
    SampleSize {
        #[arg(long)]
        baseline: f64,
        /// Minimum detectable absolute effect
        #[arg(long)]
        mde: f64,
        #[arg(long, default_value_t = 0.8)]
        power: f64,
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config } => build_index(&input, &output, load_config(config.as_deref())?),
        Commands::Search { index, query, k, category, brand, price_min, price_max, filters, config } => {
            let index = load_index(&index, config.as_deref())?;
            let mut filters = parse_filters(filters.as_deref())?;
            filters.price_min = price_min.or(filters.price_min);
            filters.price_max = price_max.or(filters.price_max);
            filters.category = category.or(filters.category);
            filters.brand = brand.or(filters.brand);
            let hits = index.search(&query, k.max(0) as usize, &filters);
            print_json(&hits)
        }
        Commands::Suggest { index, prefix, max, config } => {
            let index = load_index(&index, config.as_deref())?;
            print_json(&index.suggest(&prefix, max))
        }
        Commands::Facets { index, query, config } => {
            let index = load_index(&index, config.as_deref())?;
            print_json(&index.facets(&query))
        }
        Commands::Evaluate { index, qrels, k, config } => {
            let index = load_index(&index, config.as_deref())?;
            let report = evaluate(&index, Path::new(&qrels), &k)?;
            print_json(&report)
        }
        Commands::Abtest { control_conversions, control_trials, treatment_conversions, treatment_trials } => {
            let result = chi_square_test(control_conversions, control_trials, treatment_conversions, treatment_trials)?;
            print_json(&result)
        }
        Commands::SampleSize { baseline, mde, power, alpha } => {
            let n = sample_size(baseline, mde, power, alpha)?;
            print_json(&serde_json::json!({ "per_group": n }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_filters(raw: Option<&str>) -> Result<SearchFilters> {
    let Some(raw) = raw else { return Ok(SearchFilters::none()) };
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).context("--filters must be a JSON object")?;
    Ok(SearchFilters::from_map(&map))
}

fn load_config(path: Option<&str>) -> Result<SearchConfig> {
    match path {
        Some(p) => SearchConfig::from_file(p).with_context(|| format!("reading config {p}")),
        None => Ok(SearchConfig::default()),
    }
}

fn load_index(dir: &str, config: Option<&str>) -> Result<SearchIndex> {
    let config = load_config(config)?;
    open_index(&IndexPaths::new(dir), config).with_context(|| format!("opening index {dir}"))
}

fn build_index(input: &str, output: &str, config: SearchConfig) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);
    let index = SearchIndex::new(config);

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input path {input} does not exist");
    }

    for file in files {
        let ingested = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(&file, &index)
        } else {
            index_json(&file, &index)
        }
        .with_context(|| format!("ingesting {}", file.display()))?;
        tracing::info!(file = %file.display(), ingested, "ingested file");
    }

    tracing::info!(num_docs = index.len(), num_terms = index.term_count(), "ingested documents");

    let meta = save_snapshot(&out_paths, &index)?;
    // a fresh snapshot starts with an empty log
    OpLog::open(&out_paths)?.truncate()?;

    tracing::info!(output, num_docs = meta.num_docs, "index build complete");
    Ok(())
}

fn index_jsonl(file: &Path, index: &SearchIndex) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let mut count = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: Document = serde_json::from_str(&line).with_context(|| format!("line {}", i + 1))?;
        index.add_document(doc)?;
        count += 1;
    }
    Ok(count)
}

fn index_json(file: &Path, index: &SearchIndex) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs: Vec<Document> = match json {
        serde_json::Value::Array(_) => serde_json::from_value(json)?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    let count = docs.len();
    for doc in docs {
        index.add_document(doc)?;
    }
    Ok(count)
}

#[derive(Serialize)]
struct EvaluationReport {
    queries: BTreeMap<String, BTreeMap<String, f64>>,
    mean: BTreeMap<String, f64>,
}

fn evaluate(index: &SearchIndex, qrels: &Path, k_values: &[usize]) -> Result<EvaluationReport> {
    let judged: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(File::open(qrels)?))
        .with_context(|| format!("parsing {}", qrels.display()))?;
    let depth = k_values.iter().copied().max().unwrap_or(DEFAULT_TOP_K);

    let mut queries = BTreeMap::new();
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for (query, relevant) in judged {
        let relevant: HashSet<String> = relevant.into_iter().collect();
        let retrieved: Vec<String> = index
            .search(&query, depth, &SearchFilters::none())
            .into_iter()
            .map(|h| h.document.id.as_str().to_string())
            .collect();
        let metrics = all_metrics(&relevant, &retrieved, k_values);
        for (name, value) in &metrics {
            *sums.entry(name.clone()).or_insert(0.0) += value;
        }
        queries.insert(query, metrics);
    }
    let n = queries.len().max(1) as f64;
    let mean = sums.into_iter().map(|(name, total)| (name, total / n)).collect();
    Ok(EvaluationReport { queries, mean })
}
