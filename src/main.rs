use clap::{Arg, Command};
use comment_moderator::service::{self, AppState};
use comment_moderator::sinks::column_values;
use comment_moderator::{normalize, Config, ModerationRequest, Moderator};
use log::LevelFilter;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let matches = Command::new("comment-moderator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Comment moderation with a probabilistic toxicity classifier")
        .long_about(
            "Normalizes user comments, scores them with a trained classifier and \
             blocks, flags or allows them using configurable thresholds. Every \
             decision is written to an audit log; borderline ones are queued for \
             human labeling.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("moderation.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("moderate")
                .long("moderate")
                .value_name("TEXT")
                .help("Moderate a single comment and print the decision")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("user-id")
                .long("user-id")
                .value_name("ID")
                .help("User id recorded with --moderate")
                .requires("moderate")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("comment-id")
                .long("comment-id")
                .value_name("ID")
                .help("Comment id recorded with --moderate")
                .requires("moderate")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-file")
                .long("test-file")
                .value_name("FILE")
                .help("Moderate the 'text' column of a CSV file (requires a model)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("normalize")
                .long("normalize")
                .value_name("TEXT")
                .help("Print the normalized form of a comment")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Run the moderation HTTP API")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging of every decision")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(text) = matches.get_one::<String>("normalize") {
        println!("{}", normalize(Some(text.as_str())));
        return;
    }

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("moderation.yaml");

    let config_found = std::path::Path::new(config_path).exists();
    let config = match load_config(config_path, config_found) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    // Initialize logger based on verbose flag and configured level
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config
            .logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if matches.get_flag("test-config") {
        println!("🔍 Testing configuration...");
        println!(
            "Thresholds: block >= {}, flag >= {}, label band [{}, {})",
            config.thresholds.block,
            config.thresholds.flag,
            config.thresholds.to_label_min,
            config.thresholds.block
        );
        println!("Model artifact: {}", config.storage.model_path.display());
        println!("Audit log: {}", config.storage.audit_log.display());
        println!(
            "Retraining queue: {}",
            config.storage.retraining_queue.display()
        );
        println!("✅ Configuration is valid");
        return;
    }

    let moderator = match Moderator::from_config(&config) {
        Ok(moderator) => Arc::new(moderator),
        Err(e) => {
            eprintln!("Error initializing moderator: {e:#}");
            process::exit(1);
        }
    };

    if let Some(text) = matches.get_one::<String>("moderate") {
        let mut request = ModerationRequest::new(text);
        request.user_id = matches.get_one::<String>("user-id").cloned();
        request.comment_id = matches.get_one::<String>("comment-id").cloned();
        moderate_one(&moderator, &request);
        return;
    }

    if let Some(path) = matches.get_one::<String>("test-file") {
        moderate_file(&moderator, path);
        return;
    }

    if matches.get_flag("serve") {
        let state = AppState::new(
            moderator,
            Duration::from_millis(config.server.classifier_timeout_ms),
        );
        if let Err(e) = service::serve(state, config.server.listen_address).await {
            log::error!("Server error: {e:#}");
            process::exit(1);
        }
        return;
    }

    eprintln!("Nothing to do. Use --moderate, --test-file or --serve (see --help).");
    process::exit(2);
}

fn load_config(path: &str, found: bool) -> anyhow::Result<Config> {
    if found {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn moderate_one(moderator: &Moderator, request: &ModerationRequest) {
    match moderator.moderate(request) {
        Ok(decision) => match serde_json::to_string_pretty(&decision) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("❌ Failed to render decision: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Moderation failed: {e}");
            process::exit(1);
        }
    }
}

fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn moderate_file(moderator: &Moderator, path: &str) {
    if !moderator.has_model() {
        eprintln!("❌ No model found. Export a trained model to the configured model path first.");
        process::exit(1);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("❌ Error reading {path}: {e}");
            process::exit(1);
        }
    };

    let Some(comments) = column_values(&content, "text") else {
        eprintln!("❌ {path} has no 'text' column");
        process::exit(1);
    };

    let mut failures = 0;
    for comment in comments.iter().filter(|c| !c.trim().is_empty()) {
        let line = comment.replace(['\r', '\n'], " ");
        match moderator.moderate(&ModerationRequest::new(comment.as_str())) {
            Ok(decision) => {
                let score = decision
                    .score
                    .map(|s| format!("{s:.3}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<6} {:>6}  {:<24} {}",
                    decision.action.as_str(),
                    score,
                    decision.reason.as_str(),
                    truncate_string(&line, 60)
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("❌ {}: {e}", truncate_string(&line, 40));
            }
        }
    }

    let stats = moderator.statistics().snapshot();
    println!();
    println!("📊 Summary");
    println!("  Decisions: {}", stats.total_decisions);
    println!("  Blocked:   {}", stats.blocked);
    println!("  Flagged:   {}", stats.flagged);
    println!("  Allowed:   {}", stats.allowed);
    println!("  Queued for labeling: {}", stats.queued_for_labeling);

    if failures > 0 {
        eprintln!("{failures} comment(s) could not be moderated");
        process::exit(1);
    }
}
