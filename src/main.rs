use bgg_provider::catalog::UserFailurePolicy;
use bgg_provider::filter::filter_by_time;
use bgg_provider::{BggClient, BggConfig, CatalogError, MergeEngine};
use tokio_util::sync::CancellationToken;

/// Parsed command-line options
#[derive(Debug, Default)]
struct Args {
    users: Vec<String>,
    max_time: Option<u32>,
    skip_failed_users: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args);

    // stdout carries the JSON result, logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = BggConfig::from_env()?;
    if args.skip_failed_users {
        config.user_failure_policy = UserFailurePolicy::Skip;
    }

    tracing::info!(
        users = args.users.len(),
        base_url = %config.base_url,
        token = config.api_token.is_some(),
        "Starting BGG collection merge"
    );

    let client = BggClient::new(&config)?;
    let engine = MergeEngine::new(client, &config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping the merge");
            ctrl_c.cancel();
        }
    });

    let merged = engine
        .merge_collections_until(args.users.as_slice(), &cancel)
        .await;
    let mut catalog = match merged {
        Ok(catalog) => catalog,
        Err(err) if err.is_still_processing() => {
            tracing::error!("{}", err);
            eprintln!("BGG is still preparing a collection. Try again in a minute.");
            std::process::exit(2);
        }
        Err(CatalogError::Cancelled) => {
            eprintln!("Cancelled before every collection was fetched.");
            std::process::exit(130);
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(minutes) = args.max_time {
        catalog.games = filter_by_time(&catalog.games, minutes);
    }

    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--users" | "-u" => {
                if i + 1 < args.len() {
                    parsed.users.extend(
                        args[i + 1]
                            .split(',')
                            .map(str::trim)
                            .filter(|u| !u.is_empty())
                            .map(str::to_string),
                    );
                    i += 1;
                }
            }
            "--max-time" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(minutes) => parsed.max_time = Some(minutes),
                        Err(_) => {
                            eprintln!("Invalid --max-time: {}", args[i + 1]);
                            print_usage();
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                }
            }
            "--skip-failed-users" => parsed.skip_failed_users = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    if parsed.users.is_empty() {
        eprintln!("At least one username is required");
        print_usage();
        std::process::exit(1);
    }

    parsed
}

/// Print usage information
fn print_usage() {
    println!("bgg-provider - merge BoardGameGeek collections for a game night");
    println!();
    println!("USAGE:");
    println!("    bgg-provider --users <NAME,NAME,...> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -u, --users <LIST>      Comma-separated BGG usernames (repeatable)");
    println!("    --max-time <MINUTES>    Only keep games whose max play time fits the session");
    println!("    --skip-failed-users     Leave out users whose collection cannot be fetched");
    println!("    --help, -h              Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    BGG_BASE_URL                     API root (default: https://boardgamegeek.com/xmlapi2)");
    println!("    BGG_API_TOKEN                    Bearer token sent with every request (optional)");
    println!("    BGG_USER_AGENT                   Client identifier (default: BggGameNightPlanner)");
    println!("    BGG_RATE_LIMIT_INTERVAL_MS       One request per interval (default: 1000)");
    println!("    BGG_MAX_ATTEMPTS                 Attempts per request (default: 3)");
    println!("    BGG_MAX_RATE_LIMIT_WAITS         Rate limit waits per request (default: 10)");
    println!("    BGG_COLLECTION_MAX_POLLS         Polls for a deferred collection (default: 5)");
    println!("    BGG_USER_FAILURE_POLICY          abort | skip (default: abort)");
    println!("    RUST_LOG                         Logging level (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    bgg-provider --users alice,bob --max-time 90");
}
