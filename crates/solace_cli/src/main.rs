use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use solace_core::{DraftContext, Emotion, ReplyDrafter, SolaceConfig, StepStatus};
use solace_memory::{ChainStatus, TurnOutcome, WellnessPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "solace.toml")]
    config: String,

    /// Path to the SQLite database (overrides the config file)
    #[arg(short, long, env = "SOLACE_DB_PATH")]
    db: Option<String>,

    /// User the conversation belongs to
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Process a single message, print the reply and exit
    #[arg(short, long)]
    message: Option<String>,
}

/// Drafts a short reflective reply without a language model.
struct TemplateDrafter;

fn reflection(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Joy | Emotion::Gratitude | Emotion::Love | Emotion::Hope => {
            "It's good to hear that. What made it feel that way?"
        }
        Emotion::Sadness | Emotion::Loneliness => {
            "That sounds heavy. I'm glad you're telling me about it."
        }
        Emotion::Anger | Emotion::Frustration => {
            "That sounds really frustrating. What happened?"
        }
        Emotion::Fear | Emotion::Anxiety | Emotion::Overwhelm => {
            "It sounds like a lot is weighing on you right now."
        }
        Emotion::Shame | Emotion::Guilt => {
            "It takes courage to say that. Be gentle with yourself."
        }
    }
}

#[async_trait]
impl ReplyDrafter for TemplateDrafter {
    async fn draft(&self, ctx: DraftContext<'_>) -> Result<String> {
        let reply = match ctx.signals.primary_emotion {
            Some(emotion) => reflection(emotion).to_string(),
            None => "I'm listening. Tell me more.".to_string(),
        };
        Ok(reply)
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("\nSolace: {}\n", outcome.reply);
    for e in &outcome.persistence_errors {
        error!("Turn completed with a storage error: {}", e);
    }
}

const HELP: &str = "Commands:
  /profile          show the current profile
  /plan             show (or create) the coaching plan
  /done <step id>   mark a plan step done
  /complete         complete the active plan
  /verify           check the audit chain
  /erase            delete everything stored for this user
  /quit             exit";

async fn handle_command(pipeline: &WellnessPipeline, user: &str, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or_default();
    match cmd {
        "/quit" | "/exit" => return Ok(false),
        "/help" => println!("{}", HELP),
        "/profile" => match pipeline.profile(user).await? {
            Some(p) => println!("{}", serde_json::to_string_pretty(&p)?),
            None => println!("No profile yet."),
        },
        "/plan" => match pipeline.get_or_create_coaching_plan(user).await {
            Ok(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
            Err(e) => println!("[Error]: {}", e),
        },
        "/done" => match parts.next().and_then(|s| s.parse::<i64>().ok()) {
            Some(step_id) => match pipeline.set_plan_step_status(user, step_id, StepStatus::Done).await {
                Ok(plan) => println!("Step {} done. Phase: {}", step_id, plan.phase),
                Err(e) => println!("[Error]: {}", e),
            },
            None => println!("Usage: /done <step id>"),
        },
        "/complete" => match pipeline.store().active_plan(user).await? {
            Some(plan) => match pipeline.complete_coaching_plan(user, plan.id).await {
                Ok(_) => println!("Plan {} completed.", plan.id),
                Err(e) => println!("[Error]: {}", e),
            },
            None => println!("No active plan."),
        },
        "/verify" => match pipeline.verify_audit_chain(user).await? {
            ChainStatus::Intact { entries } => println!("Audit chain intact ({} entries).", entries),
            ChainStatus::Broken { index } => println!("Audit chain broken at entry {}.", index),
        },
        "/erase" => {
            let rows = pipeline.erase_user_data(user).await?;
            println!("Erased {} rows.", rows);
        }
        other => println!("Unknown command {}. Type /help.", other),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let mut config = SolaceConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.storage.db_path = db;
    }
    info!("Opening store at {}...", config.storage.db_path);
    let pipeline = Arc::new(WellnessPipeline::open(config).await?);
    let drafter = TemplateDrafter;
    let conversation_id = Uuid::new_v4().to_string();

    if let Some(message) = args.message {
        let outcome = pipeline
            .process_turn(&args.user, &Uuid::new_v4().to_string(), &conversation_id, &message, &drafter)
            .await?;
        println!("{}", outcome.reply);
        return Ok(());
    }

    let mut editor = DefaultEditor::new()?;
    println!("Solace is here. Type /help for commands, Ctrl+D to exit.");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);

                if trimmed.starts_with('/') {
                    match handle_command(&pipeline, &args.user, trimmed).await {
                        Ok(true) => continue,
                        Ok(false) => break,
                        Err(e) => {
                            error!("Command failed: {}", e);
                            println!("[System Error]: {}", e);
                            continue;
                        }
                    }
                }

                let message_id = Uuid::new_v4().to_string();
                match pipeline
                    .process_turn(&args.user, &message_id, &conversation_id, trimmed, &drafter)
                    .await
                {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => {
                        error!("Error processing message: {}", e);
                        println!("\n[System Error]: {}\n", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                break;
            }
        }
    }

    println!("Take care.");
    Ok(())
}
