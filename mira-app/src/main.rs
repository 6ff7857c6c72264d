use mira_app::bootstrap;
use mira_app::config::AppConfig;
use mira_app::dispatch::ConsoleDispatcher;
use mira_app::repl::Repl;
use mira_app::script::ScriptTransport;
use mira_interfaces::TerminalInterface;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_logging();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              Mira Advisor Console                                ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = match AppConfig::load_or_default(&config_path) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            eprintln!("❌ Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    let transport = match ScriptTransport::load(&config.script) {
        Ok(transport) => transport.with_pace(Duration::from_millis(config.pace_ms)),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Tip: set `script` in {} or MIRA_SCRIPT", config_path.display());
            return Err(e);
        }
    };

    println!("Session: {}", config.session_key);
    println!("Agent script: {}", config.script.display());
    println!();

    let runtime = bootstrap::build(
        &config,
        Arc::new(transport),
        Arc::new(ConsoleDispatcher::default()),
    )
    .await?;

    let mut repl = Repl::new(runtime, Box::new(TerminalInterface::new()));
    repl.run().await
}
