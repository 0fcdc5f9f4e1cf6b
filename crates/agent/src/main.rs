use anyhow::{Context, Result};
use catalog_agent::config::{DEFAULT_MAX_ITERATIONS, DEFAULT_SERVER_COMMAND, DEFAULT_THREAD_ID};
use catalog_agent::{run_shell, transport, Agent, AgentConfig, McpClient, ServerTarget};
use catalog_core::config::{LlmConfig, ENV_OPENAI_DEPLOYMENT, ENV_OPENAI_ENDPOINT};
use catalog_core::llm::AzureChatModel;
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(name = "catalog-agent")]
#[command(about = "Chat with the product catalog through a hosted model", long_about = None)]
struct Args {
    /// URL of a running catalog server's MCP endpoint
    #[arg(long, env = "CATALOG_SERVER_URL", conflicts_with = "server_cmd")]
    server_url: Option<String>,

    /// Command that starts a stdio tool server
    #[arg(long, default_value = DEFAULT_SERVER_COMMAND)]
    server_cmd: String,

    /// Argument passed to the server command (repeatable)
    #[arg(long = "server-arg")]
    server_args: Vec<String>,

    /// Conversation thread id
    #[arg(long, default_value = DEFAULT_THREAD_ID)]
    thread: String,

    /// Model steps allowed per query
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
}

impl Args {
    fn into_config(self) -> Result<AgentConfig> {
        let server = match self.server_url {
            Some(url) => ServerTarget::http(&url)?,
            None => ServerTarget::stdio(self.server_cmd, self.server_args),
        };
        let mut config = AgentConfig::new(server);
        config.thread_id = self.thread;
        config.max_iterations = self.max_iterations;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout is the conversation; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Args::parse().into_config()?;

    let llm = LlmConfig::from_env().with_context(|| {
        format!(
            "Chat model not configured: set {} and {}",
            ENV_OPENAI_ENDPOINT, ENV_OPENAI_DEPLOYMENT
        )
    })?;
    let model = AzureChatModel::new(&llm).context("Failed to configure chat model")?;

    let transport = transport::connect(&config.server).context("Failed to reach tool server")?;
    let client = McpClient::connect(transport)
        .await
        .context("Failed to initialize tool session")?;

    let mut agent = Agent::new(Arc::new(model), client).with_max_iterations(config.max_iterations);

    run_shell(
        &mut agent,
        &config.thread_id,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
