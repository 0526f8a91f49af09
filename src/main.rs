/// adaptive-chat - looks at a conversation the way the chat widget would
///
/// This is the main entry point. Parses CLI args and dispatches to handlers.
/// Message files are JSON arrays of messages; plain strings count as user messages.

use adaptive_chat_lib::{
    intelligence::{get_adapted_response_style, get_conversation_insights},
    models::Message,
    AdaptError, AdaptiveEngine, Database, EngineConfig, Result,
};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// Conversations analyzed from the command line belong to this user
const CLI_USER: &str = "cli";
const DEFAULT_MAX_SUGGESTIONS: usize = 5;

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let command = &args[1];

    match command.as_str() {
        "analyze" => handle_analyze(&args[2..]).await,
        "suggest" => handle_suggest(&args[2..]).await,
        "shifts" => handle_shifts(&args[2..]).await,
        "style" => handle_style(&args[2..]).await,
        "persist" => handle_persist(&args[2..]).await,
        "show" => handle_show(&args[2..]).await,
        "version" | "-v" | "--version" => {
            println!("adaptive-chat v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            Ok(())
        }
    }
}

async fn handle_analyze(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        eprintln!("Error: No message file provided");
        return Ok(());
    };

    let messages = load_messages(path)?;
    let engine = build_engine().await?;
    let conversation_id = conversation_id_for(path);

    let context = engine
        .analyze_messages(CLI_USER, &conversation_id, &messages)
        .await;

    println!("\nConversation Context");
    println!("{}", "=".repeat(60));
    println!("  Messages:   {}", messages.len());
    println!(
        "  Topics:     {}",
        if context.topics.is_empty() {
            "(none)".to_string()
        } else {
            context.topics.join(", ")
        }
    );
    println!("  Sentiment:  {}", context.sentiment);
    println!("  Intent:     {}", context.user_intent);
    println!("  Complexity: {:?}", context.complexity_level);
    println!("  Expertise:  {:?}", context.expertise_level);
    if let Some(error) = &context.error {
        println!("  Note:       analysis fell back ({})", error);
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

async fn handle_suggest(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        eprintln!("Error: No message file provided");
        return Ok(());
    };

    let max = args
        .get(1)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_SUGGESTIONS);

    let messages = load_messages(path)?;
    let engine = build_engine().await?;
    let conversation_id = conversation_id_for(path);

    let mut suggestions = engine
        .generate_suggestions(CLI_USER, &conversation_id, &messages, max)
        .await;
    suggestions.extend(engine.suggestions().generate_follow_up_suggestions(&messages, max));
    suggestions.extend(engine.suggestions().generate_clarification_suggestions(&messages, max));

    if suggestions.is_empty() {
        println!("No suggestions for this conversation.");
        return Ok(());
    }

    println!("\nSmart Suggestions");
    println!("{}", "=".repeat(60));
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!(
            "\n{:3}. [{}] {} (confidence: {:.0}%)",
            i + 1,
            suggestion.suggestion_type.as_str(),
            suggestion.content,
            suggestion.effective_confidence() * 100.0
        );
        println!("     Reason: {}", suggestion.reason);
    }
    println!("\n{}", "=".repeat(60));

    Ok(())
}

async fn handle_shifts(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        eprintln!("Error: No message file provided");
        return Ok(());
    };

    let messages = load_messages(path)?;
    let engine = build_engine().await?;
    let shifts = engine.analyzer().detect_context_shifts(&messages).await;

    if shifts.is_empty() {
        println!("No topic shifts detected.");
        return Ok(());
    }

    println!("\nTopic Shifts");
    println!("{}", "=".repeat(60));
    for shift in &shifts {
        println!(
            "  #{:<3} {:?}: {} -> {} (confidence: {:.0}%)",
            shift.message_index,
            shift.shift_type,
            shift.from_topic,
            shift.to_topic,
            shift.confidence * 100.0
        );
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

async fn handle_style(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        eprintln!("Error: No message file provided");
        return Ok(());
    };

    let messages = load_messages(path)?;
    let engine = build_engine().await?;
    let context = engine.analyzer().analyze_context(&messages).await;

    let report = serde_json::json!({
        "insights": get_conversation_insights(&context),
        "responseStyle": get_adapted_response_style(&context),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn handle_persist(args: &[String]) -> Result<()> {
    let (Some(conversation_id), Some(path)) = (args.first(), args.get(1)) else {
        eprintln!("Error: Usage: adaptive-chat persist <conversation-id> <messages.json>");
        return Ok(());
    };

    let messages = load_messages(path)?;
    let engine = build_engine().await?;

    let context = engine
        .analyze_messages(CLI_USER, conversation_id, &messages)
        .await;
    engine
        .analyzer()
        .persist_context(conversation_id, &context)
        .await?;

    println!("Stored context for '{}'.", conversation_id);
    Ok(())
}

async fn handle_show(args: &[String]) -> Result<()> {
    let Some(conversation_id) = args.first() else {
        eprintln!("Error: No conversation id provided");
        return Ok(());
    };

    let engine = build_engine().await?;

    match engine.analyzer().get_persisted_context(conversation_id).await? {
        Some(context) => println!("{}", serde_json::to_string_pretty(&context)?),
        None => println!("No stored context for '{}'.", conversation_id),
    }

    Ok(())
}

async fn build_engine() -> Result<AdaptiveEngine> {
    let config = EngineConfig::load_or_default()?;
    let db = get_database().await?;
    AdaptiveEngine::new(config, Arc::new(db))
}

async fn get_database() -> Result<Database> {
    let home = dirs::home_dir()
        .ok_or_else(|| AdaptError::Config("Could not find home directory".to_string()))?;
    let db_path = home.join(".adaptive-chat").join("store.db");
    Database::new(db_path).await
}

fn load_messages(path: &str) -> Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)?;
    parse_messages(&raw)
}

fn parse_messages(raw: &str) -> Result<Vec<Message>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(AdaptError::Generic(
            "Message file must contain a JSON array".to_string(),
        ));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(content) => Ok(Message::user(content)),
            other => Ok(serde_json::from_value(other)?),
        })
        .collect()
}

// File stem of the message file, so repeated runs hit the same conversation
fn conversation_id_for(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

fn print_usage() {
    println!(
        r#"adaptive-chat v{} - Behavior, context and suggestion engine for chat widgets

USAGE:
    adaptive-chat <COMMAND> [OPTIONS]

COMMANDS:
    analyze <messages.json>                Analyze conversation context
    suggest <messages.json> [max]          Generate smart suggestions (default: 5)
    shifts <messages.json>                 Detect topic shifts
    style <messages.json>                  Show insights and adapted response style
    persist <conversation-id> <file>       Analyze and store a conversation context
    show <conversation-id>                 Show a stored conversation context
    version                                Show version
    help                                   Show this help

MESSAGE FILES:
    A JSON array of messages ({{"role": "user", "content": "..."}}) or plain
    strings, which are read as user messages.

CONFIGURATION:
    ~/.adaptive-chat/config.toml (optional). Set RUST_LOG=debug for details.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
