use cart_sync::browser::{CartWriter, DryRun, PageSource, WebDriverSession};
use cart_sync::parsers::{PageKind, Parsed, Parser as PageParser};
use cart_sync::{AppConfig, BoxError, Candidate, Matcher, Pipeline};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use url::Url;

mod args;
use args::{Args, Command, convert_page_kind};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let result = match args.command {
        Command::Match {
            query,
            catalog,
            history,
            min_score,
        } => match_query(&config, &query, &catalog, history.as_deref(), min_score),
        Command::Top {
            query,
            catalog,
            limit,
            min_score,
        } => top_matches(&config, &query, &catalog, limit, min_score),
        Command::Parse {
            html,
            kind,
            url,
            page,
        } => parse_page(&config, &html, kind, url.as_deref(), page),
        Command::Run {
            once,
            dry_run,
            headed,
        } => run(config, once, dry_run, headed).await,
    };

    if let Err(e) = result {
        ::log::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, BoxError> {
    let config = match path {
        Some(path) => {
            ::log::info!("Loading configuration from {}", path.display());
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn read_candidates(path: &Path) -> Result<Vec<Candidate>, BoxError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn matcher_for(config: &AppConfig, min_score: Option<u8>) -> Matcher {
    let matching = match min_score {
        Some(min_score) => config.matching.with_min_score(min_score),
        None => config.matching,
    };
    Matcher::new(matching)
}

fn match_query(
    config: &AppConfig,
    query: &str,
    catalog: &Path,
    history: Option<&Path>,
    min_score: Option<u8>,
) -> Result<(), BoxError> {
    let catalog = read_candidates(catalog)?;
    let history = history.map(read_candidates).transpose()?;
    let matcher = matcher_for(config, min_score);

    match matcher.explain(query, &catalog, history.as_deref()) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(reason) => println!("no match: {}", reason),
    }
    Ok(())
}

fn top_matches(
    config: &AppConfig,
    query: &str,
    catalog: &Path,
    limit: usize,
    min_score: Option<u8>,
) -> Result<(), BoxError> {
    let catalog = read_candidates(catalog)?;
    let matcher = matcher_for(config, min_score);
    let results = matcher.get_top_matches(query, &catalog, limit);
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn parse_page(
    config: &AppConfig,
    html: &Path,
    kind: Option<args::PageKindArg>,
    url: Option<&str>,
    page: u32,
) -> Result<(), BoxError> {
    let html = std::fs::read_to_string(html)?;

    let parsed = match (url, kind) {
        (Some(url), _) => PageParser::parse_from_url(&html, url),
        (None, Some(kind)) => {
            let kind = convert_page_kind(kind);
            let base_url = match kind {
                PageKind::ShoppingList => Url::parse(&config.list_url)?,
                _ => Url::parse(&config.retail_base_url)?,
            };
            PageParser::parse(&html, kind, page, &base_url)
        }
        (None, None) => return Err("either --kind or --url is required".into()),
    };

    if parsed.is_empty() {
        ::log::warn!("Nothing recognised on the page");
    } else {
        ::log::info!("Parsed {} records", parsed.len());
    }

    match parsed {
        Parsed::Candidates(candidates) => {
            println!("{}", serde_json::to_string_pretty(&candidates)?)
        }
        Parsed::Items(items) => println!("{}", serde_json::to_string_pretty(&items)?),
        Parsed::Nothing => println!("[]"),
    }
    Ok(())
}

async fn run(mut config: AppConfig, once: bool, dry_run: bool, headed: bool) -> Result<(), BoxError> {
    if headed {
        config.headless = false;
    }

    println!("Note: cart sync requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL environment variable if not using {}",
        config.webdriver_url
    );

    let mut pipeline = Pipeline::new(config.clone());
    let mut session = WebDriverSession::new(&config);

    let result = if dry_run {
        let mut dry = DryRun::new(session);
        let result = run_loop(&mut pipeline, &mut dry, once).await;
        session = dry.into_inner();
        result
    } else {
        run_loop(&mut pipeline, &mut session, once).await
    };

    session.close().await;
    result
}

/// Run the pipeline once, or on the configured interval until Ctrl-C
async fn run_loop<B>(pipeline: &mut Pipeline, browser: &mut B, once: bool) -> Result<(), BoxError>
where
    B: PageSource + CartWriter,
{
    let interval = Duration::from_secs(pipeline.config().schedule_interval_secs);

    loop {
        let start_time = std::time::Instant::now();
        match pipeline.run_once(browser).await {
            Ok(report) => {
                ::log::info!(
                    "Pass finished in {:.2} seconds",
                    start_time.elapsed().as_secs_f64()
                );
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(e) if once => return Err(e),
            Err(e) => ::log::error!("Pass failed: {}", e),
        }

        if once {
            return Ok(());
        }

        ::log::info!("Next pass in {} seconds", interval.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                ::log::info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}
