// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::path::Path;

use pricebook::{
    default_seed, get_options, init_tracing, load_records, Config, PricebookStore,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("seed") => {
            init_tracing(config.log_format);
            run_seed(&config, args.get(2).map(Path::new))
        }
        Some("options") => {
            init_tracing(config.log_format);
            run_options(&config)
        }
        Some("ui") | None => run_ui_mode(&config, &args[args.len().min(2)..]),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Usage: pricebook [seed [FILE.json|FILE.csv] | options | ui [--api URL]]");
            std::process::exit(2);
        }
    }
}

fn run_seed(config: &Config, source: Option<&Path>) -> Result<()> {
    println!("Pricebook bulk load");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load records
    let records = match source {
        Some(path) => {
            println!("\nLoading {}...", path.display());
            load_records(path)?
        }
        None => {
            println!("\nLoading bundled seed...");
            default_seed()?
        }
    };
    println!("✓ Loaded {} records", records.len());

    // 2. Open database
    let mut store = PricebookStore::open(&config.db_path)
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    println!("✓ Database ready: {}", config.db_path.display());

    // 3. Upsert
    let summary = store.bulk_load(&records)?;
    let count = store.count()?;
    store.close()?;

    println!("\n✓ Inserted: {}", summary.inserted);
    println!("✓ Updated: {}", summary.updated);
    println!("✓ Unchanged: {}", summary.unchanged);
    println!("✓ Database contains {} entries", count);

    Ok(())
}

fn run_options(config: &Config) -> Result<()> {
    let store = PricebookStore::open(&config.db_path)
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    let options = get_options(&store)?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    store.close()?;
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, args: &[String]) -> Result<()> {
    use pricebook::{scoped_tracing, HttpPriceApi, LocalPriceApi, PriceApi, QuoteForm};

    let api_url = match args {
        [flag, url, ..] if flag == "--api" => Some(url.clone()),
        [] => None,
        _ => {
            eprintln!("Usage: pricebook ui [--api URL]");
            std::process::exit(2);
        }
    };

    // Log to stderr until the alternate screen takes over
    let logging = scoped_tracing(config.log_format);
    println!("Loading pricebook options...");

    let (api, source): (Box<dyn PriceApi>, String) = match api_url {
        Some(url) => (Box::new(HttpPriceApi::new(&url)), url),
        None => {
            let db_path = config.db_path.as_path();
            if !db_path.exists() {
                eprintln!("❌ Database not found at {}", db_path.display());
                eprintln!("   Run: pricebook seed");
                eprintln!("   to load rates first.");
                std::process::exit(1);
            }
            let store = PricebookStore::open(db_path)?;
            (
                Box::new(LocalPriceApi::new(store)),
                db_path.display().to_string(),
            )
        }
    };

    let options = api.options().context("Failed to load options")?;
    tracing::info!(%source, regions = options.regions.len(), "quote form ready");
    let form = QuoteForm::from_options(options);

    drop(logging);
    let mut app = ui::App::new(form, api.as_ref(), source);
    let result = ui::run_ui(&mut app);

    let _logging = scoped_tracing(config.log_format);
    result?;
    tracing::info!("quote form closed");
    println!("\n✅ Quote form closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _args: &[String]) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run the API: cargo run --bin pricebook-server --features server");
    std::process::exit(1);
}
