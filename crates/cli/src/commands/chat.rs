//! `frontdesk chat` — Interactive or single-message desk session.

use frontdesk_config::AppConfig;
use frontdesk_dispatch::{DeskSession, TurnPolicy};
use frontdesk_gateway::{OpenAiCompatGateway, RetryGateway};
use frontdesk_store::RecordStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (a .env file works too):");
        eprintln!("    FRONTDESK_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    // Gateway with bounded retry, shared store, one session
    let gateway = OpenAiCompatGateway::from_config(&config)?;
    let gateway = Arc::new(RetryGateway::new(Arc::new(gateway), config.retry.clone()));
    let store = Arc::new(RecordStore::new());

    let mut session = DeskSession::new(gateway, &config.chat_model, config.temperature, store)
        .with_max_tokens(config.max_tokens)
        .with_policy(TurnPolicy {
            rollback_history_on_failure: config.policy.rollback_history_on_failure,
        });

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = session.turn(&msg).await?;
        eprint!("\r              \r");
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  智能客服系统启动。输入 'exit' 或 'quit' 退出。");
    println!();
    println!("  Endpoint:  {}", config.base_url);
    println!("  Model:     {}", config.chat_model);
    println!();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    print!("  User > ");
    use std::io::Write;
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();

        if input.is_empty() {
            print!("  User > ");
            std::io::stdout().flush()?;
            continue;
        }

        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            println!("  Exiting conversation.");
            break;
        }

        eprint!("  ...");
        match session.turn(input).await {
            Ok(reply) => {
                eprint!("\r     \r");
                println!();
                for line in reply.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                tracing::error!(error = %e, "Turn failed");
                println!();
                println!("  Assistant > 对不起，系统遇到了一些问题。请稍后再试或尝试重新开始对话。");
                println!();
                if config.policy.reset_state_on_error {
                    session.reset_to_main();
                }
            }
        }

        print!("  User > ");
        std::io::stdout().flush()?;
    }

    Ok(())
}
