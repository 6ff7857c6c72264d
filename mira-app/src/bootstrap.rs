use crate::config::AppConfig;
use crate::threads::ThreadIndex;
use anyhow::{Context, Result};
use mira_controller::{AgentController, EventBroker};
use mira_core::{AgentTransport, ToolDispatcher};
use mira_memory::Storage;
use mira_policy::ToolPolicy;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. Filter from `MIRA_LOG`, default `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("MIRA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn load_policy(config: &AppConfig) -> Result<ToolPolicy> {
    match &config.policy {
        Some(path) => {
            let policy = ToolPolicy::load(path)
                .await
                .with_context(|| format!("Failed to load tool policy {}", path.display()))?;
            tracing::info!(
                "Loaded tool policy {} ({} sensitive keywords)",
                path.display(),
                policy.sensitive_keywords.len()
            );
            Ok(policy)
        }
        None => Ok(ToolPolicy::default()),
    }
}

/// Everything the console needs: the controller and the broker feeding it.
pub struct Runtime {
    pub controller: AgentController,
    pub broker: EventBroker,
}

pub async fn build(
    config: &AppConfig,
    transport: Arc<dyn AgentTransport>,
    dispatcher: Arc<dyn ToolDispatcher>,
) -> Result<Runtime> {
    let storage = Storage::open(&config.storage_dir)
        .with_context(|| format!("Failed to open storage in {}", config.storage_dir.display()))?;
    let policy = load_policy(config).await?;
    let broker = EventBroker::new();
    let mut controller = AgentController::new(
        config.controller_config(policy),
        storage,
        transport,
        dispatcher,
        &broker,
    )
    .context("Failed to start controller")?;
    if let Some(path) = &config.threads {
        controller = controller.with_search(Arc::new(ThreadIndex::load(path)?));
    }
    Ok(Runtime { controller, broker })
}
