use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use olist_insights::pages::PageOutcome;
use olist_insights::{
    export_csv, run_page, AppConfig, Args, ConfigManager, DashboardError, DataSource, PageContext,
    PageId, PageParams, RoundingPolicy, APP_NAME,
};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(manager) => match manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Default configuration written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.list_pages {
        for page in PageId::ALL {
            println!("{:<22} {}", page.slug(), page.title());
        }
        return Ok(Some(()));
    }

    Ok(None)
}

/// RUST_LOG wins over --log-level, which wins over the config file.
fn init_logging(args: &Args, config: &AppConfig) {
    let level = args.log_level.as_deref().unwrap_or(config.logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 2 for bad parameters, 1 for everything else.
fn exit_code(err: &DashboardError) -> i32 {
    if err.is_input_error() {
        2
    } else {
        1
    }
}

fn fail(err: DashboardError) -> ! {
    eprintln!("Error: {}", err.user_message());
    std::process::exit(exit_code(&err));
}

fn run(page: PageId, args: &Args, config: &AppConfig) -> olist_insights::Result<PageOutcome> {
    let source = DataSource::from_config(&config.data);
    let params = PageParams::from_args_and_config(args, config)?;
    debug!(?params, "page parameters");
    let ctx = PageContext::new(&source, config);
    let outcome = run_page(page, &ctx, &params)?;
    let stats = source.cache().stats();
    debug!(hits = stats.hits, loads = stats.loads, "table cache");
    Ok(outcome)
}

fn print_outcome(page: PageId, outcome: &PageOutcome, args: &Args, policy: &RoundingPolicy) -> Result<()> {
    match outcome {
        PageOutcome::Ready(report) => {
            let view = report.view(policy);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", view.to_text());
            }
            if let Some(path) = &args.export {
                match report.primary_table() {
                    Some(table) => {
                        if let Err(e) = export_csv(table, path) {
                            fail(e);
                        }
                    }
                    None => warn!("report has no table to export"),
                }
            }
        }
        PageOutcome::NoData { reason } => {
            if args.json {
                let body = json!({ "page": page, "title": page.title(), "no_data": reason });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}\n\n{}", page.title(), reason);
            }
            if args.export.is_some() {
                warn!("nothing exported: the page has no data");
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let mut config = AppConfig::load(APP_NAME)?;
    if let Some(dir) = &args.data_dir {
        config.data.primary_dir = dir.clone();
    }
    if let Some(dir) = &args.fallback_dir {
        config.data.fallback_dir = dir.clone();
    }
    init_logging(&args, &config);

    let page = args
        .page
        .map(PageId::from)
        .ok_or_else(|| eyre!("No page given. Use --list-pages to see the available pages."))?;
    info!(%page, "computing page");

    match run(page, &args, &config) {
        Ok(outcome) => print_outcome(page, &outcome, &args, &RoundingPolicy::from(&config.presentation))?,
        Err(e) => fail(e),
    }
    Ok(())
}
