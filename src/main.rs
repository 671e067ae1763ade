mod config;
mod filters;
mod matcher;
mod model;
mod normalizer;
mod parser;
mod resolver;
mod search;
mod storage;
mod utils;

use clap::{ArgGroup, Parser};
use config::{AppConfig, load_config_or_default};
use matcher::Matcher;
use model::{AppError, MatchStatus, RowResult, ScoredCandidate};
use resolver::Resolver;
use search::{KaspiFetcher, Searcher};
use std::path::PathBuf;
use storage::{SqliteStorage, read_sheet, write_output_chunks};
use tracing::{info, warn};

const PROGRESS_EVERY: usize = 10;

/// Matches supplier product descriptions against the Kaspi.kz catalogue.
#[derive(Debug, Parser)]
#[command(name = "kaspi-matcher", version)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "query"])))]
struct Cli {
    /// Input spreadsheet (.csv or .xlsx)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Match a single description and print the top results
    #[arg(short, long)]
    query: Option<String>,

    /// Worksheet name for XLSX input
    #[arg(short, long)]
    sheet: Option<String>,

    /// Column holding the supplier descriptions
    #[arg(short = 'c', long = "col", default_value = "Номенклатура поставщика")]
    column: String,

    /// Output directory for the result chunks
    #[arg(long, default_value = "./output")]
    out: PathBuf,

    /// Data rows to skip
    #[arg(long, default_value_t = 0)]
    start_row: usize,

    /// Maximum number of data rows to process
    #[arg(long)]
    max_rows: Option<usize>,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config_or_default(&cli.config)?;
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();
    if !cli.config.exists() {
        info!("Config {} not found, using defaults", cli.config.display());
    }

    let fetcher = KaspiFetcher::new(&config)?;
    info!("Using {} HTTP client(s)", fetcher.client_count());
    let mut resolver = Resolver::new(
        fetcher,
        Matcher::new(config.scoring.clone()),
        config.fuzzy_threshold,
    )
    .with_top_n(config.top_n);

    if let Some(query) = &cli.query {
        let matches = resolver.top_matches(query).await?;
        print_matches(&matches);
        return Ok(());
    }

    let history = match &config.database_path {
        Some(path) => Some(SqliteStorage::new(path)?),
        None => None,
    };
    let paths = process_file(&cli, &config, &mut resolver, history.as_ref()).await?;
    println!("Output files:");
    for path in &paths {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Resolves every row of the input sheet in order and writes the chunked output.
async fn process_file<S: Searcher>(
    cli: &Cli,
    config: &AppConfig,
    resolver: &mut Resolver<S>,
    history: Option<&SqliteStorage>,
) -> Result<Vec<PathBuf>, AppError> {
    let Some(input) = &cli.input else {
        return Ok(Vec::new());
    };

    let sheet = read_sheet(input, cli.sheet.as_deref())?.slice(cli.start_row, cli.max_rows);
    let column = sheet.column_index(&cli.column)?;
    let queries = sheet.column_values(column);
    info!("Processing {} rows from column '{}'", queries.len(), cli.column);

    let mut results: Vec<RowResult> = Vec::with_capacity(queries.len());
    for (i, query) in queries.iter().enumerate() {
        if let Some(history) = history {
            match history.last_match(query) {
                Ok(Some(prev)) => info!(
                    "Previous match for '{}': {:?} | {:?} | {} | {}",
                    prev.query, prev.best_id, prev.score, prev.status, prev.matched_at
                ),
                Ok(None) => {}
                Err(e) => warn!("History lookup failed: {}", e),
            }
        }

        let result = resolver.resolve(query).await;
        info!("Row {}: {}", cli.start_row + i + 1, result.status);

        if let Some(history) = history {
            if let Err(e) = history.save_result(&result) {
                warn!("DB save error: {}", e);
            }
        }
        results.push(result);

        if (i + 1) % PROGRESS_EVERY == 0 {
            log_progress(i + 1, queries.len(), &results[results.len() - PROGRESS_EVERY..]);
        }
    }

    let (texts, titles) = resolver.matcher().normalizer().cached_entries();
    info!("Normalization cache: {} texts, {} brand/model entries", texts, titles);
    if let Some(history) = history {
        match history.count() {
            Ok(n) => info!("Match history holds {} rows", n),
            Err(e) => warn!("History count failed: {}", e),
        }
    }

    let base_name = utils::file_stem(input);
    let paths = write_output_chunks(&sheet, &results, &cli.out, &base_name, config.chunk_size)?;
    info!("Wrote {} output files", paths.len());
    Ok(paths)
}

fn log_progress(done: usize, total: usize, recent: &[RowResult]) {
    let count = |status: MatchStatus| recent.iter().filter(|r| r.status == status).count();
    info!(
        "Processed {}/{} rows; last {}: {} found, {} possible, {} not found",
        done,
        total,
        recent.len(),
        count(MatchStatus::Found),
        count(MatchStatus::Possible),
        count(MatchStatus::NotFound),
    );
}

fn print_matches(matches: &[ScoredCandidate]) {
    if matches.is_empty() {
        println!("No products found");
        return;
    }
    for (i, m) in matches.iter().enumerate() {
        println!("{}", format_match(i + 1, m));
    }
}

fn format_match(rank: usize, m: &ScoredCandidate) -> String {
    let price = m
        .candidate
        .price
        .map(|p| format!("{:.0} ₸", p))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Match #{}\n  Title: {}\n  Score: {:.2}\n  Price: {}\n  URL:   {}",
        rank, m.candidate.title, m.score, price, m.candidate.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InputError;
    use crate::search::mock::{MockSearcher, candidate};
    use std::fs;

    const HP_QUERY: &str = "HP Laptop 15 8GB 256GB SSD / Intel Core i5-1135G7 / Intel UHD";

    fn resolver() -> Resolver<MockSearcher> {
        let searcher = MockSearcher::new().with_products(
            "HP Laptop 15 8GB 256GB SSD Intel Core i5-1135G7",
            vec![candidate(
                "101",
                "HP Laptop 15 8GB RAM 256GB SSD i5-1135G7",
                289990.0,
                "ноутбуки",
            )],
        );
        Resolver::new(searcher, Matcher::default(), 70.0)
    }

    fn write_input(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("supplier.csv");
        let content = format!(
            "Артикул,Номенклатура поставщика\nA1,\"{}\"\nA2,Неизвестный товар\n",
            HP_QUERY
        );
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn cli_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["kaspi-matcher"]).is_err());
        assert!(Cli::try_parse_from(["kaspi-matcher", "-i", "a.csv", "-q", "hp"]).is_err());

        let cli = Cli::try_parse_from(["kaspi-matcher", "-q", "HP Laptop 15"]).unwrap();
        assert_eq!(cli.query.as_deref(), Some("HP Laptop 15"));
        assert_eq!(cli.column, "Номенклатура поставщика");
        assert_eq!(cli.out, PathBuf::from("./output"));
        assert_eq!(cli.start_row, 0);
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[tokio::test]
    async fn processes_file_into_chunks_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("out");
        let cli = Cli::try_parse_from([
            "kaspi-matcher",
            "-i",
            input.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let history = SqliteStorage::in_memory().unwrap();
        let mut resolver = resolver();

        let paths = process_file(&cli, &AppConfig::default(), &mut resolver, Some(&history))
            .await
            .unwrap();

        assert_eq!(paths, vec![out.join("supplier_part1.xlsx")]);
        let output = read_sheet(&paths[0], None).unwrap();
        assert_eq!(output.headers[2..], ["код каспи", "цена каспи", "статус поиска"]);
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0][..4], ["A1", HP_QUERY, "101", "289990"]);
        assert!(output.rows[0][4].starts_with("найден (score: "));
        assert_eq!(
            output.rows[1],
            ["A2", "Неизвестный товар", "не найден", "", "не найден"]
        );
        assert_eq!(history.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn start_and_max_rows_limit_processing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("out");
        let cli = Cli::try_parse_from([
            "kaspi-matcher",
            "-i",
            input.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--start-row",
            "1",
            "--max-rows",
            "1",
        ])
        .unwrap();
        let mut resolver = resolver();

        process_file(&cli, &AppConfig::default(), &mut resolver, None)
            .await
            .unwrap();

        assert_eq!(resolver.searcher().calls(), vec!["Неизвестный товар"]);
        let output = read_sheet(&out.join("supplier_part1.xlsx"), None).unwrap();
        assert_eq!(output.rows.len(), 1);
    }

    #[tokio::test]
    async fn missing_column_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let cli = Cli::try_parse_from([
            "kaspi-matcher",
            "-i",
            input.to_str().unwrap(),
            "-c",
            "Наименование",
        ])
        .unwrap();
        let mut resolver = resolver();

        let err = process_file(&cli, &AppConfig::default(), &mut resolver, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Input(InputError::MissingColumn { ref column, .. }) if column == "Наименование"
        ));
        assert!(resolver.searcher().calls().is_empty());
    }

    #[test]
    fn formats_match_block() {
        let m = ScoredCandidate {
            candidate: candidate("101", "HP Laptop 15s", 249990.0, "ноутбуки"),
            score: 91.456,
        };
        assert_eq!(
            format_match(1, &m),
            "Match #1\n  Title: HP Laptop 15s\n  Score: 91.46\n  Price: 249990 ₸\n  URL:   https://kaspi.kz/shop/p/101/"
        );
    }
}
