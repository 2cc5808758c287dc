//! Ensemble Orchestrator Admin CLI
//!
//! Administrative CLI for inspecting a running orchestrator's provider
//! health, debates, and sessions. Talks to the server's own HTTP API rather
//! than touching process state directly — the orchestrator's state lives
//! inside that process, so an out-of-process tool reaches it the same way
//! any other client would.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ensemble-admin")]
#[command(about = "Ensemble Orchestrator Admin CLI - inspect health, debates, and sessions")]
#[command(version = "1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the running orchestrator
    #[arg(long, env = "ENSEMBLE_ADMIN_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-provider health snapshots (circuit state, latency, counts)
    Health,

    /// List debates, optionally filtered by status
    ListDebates {
        /// Filter by status: pending | running | completed | failed
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one debate's full state
    GetDebate {
        debate_id: String,
    },

    /// Show one debate's final result
    GetResults {
        debate_id: String,
    },

    /// Request cancellation/deletion of a debate
    DeleteDebate {
        debate_id: String,
        /// Confirm the deletion
        #[arg(long)]
        confirm: bool,
    },

    /// List active sessions
    ListSessions,

    /// Show one session (with context)
    GetSession {
        session_id: String,
    },

    /// Terminate a session
    TerminateSession {
        session_id: String,
        /// Confirm the termination
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => show_health(&client, &cli.url).await?,
        Commands::ListDebates { status } => list_debates(&client, &cli.url, status).await?,
        Commands::GetDebate { debate_id } => get_debate(&client, &cli.url, &debate_id).await?,
        Commands::GetResults { debate_id } => get_results(&client, &cli.url, &debate_id).await?,
        Commands::DeleteDebate { debate_id, confirm } => {
            if !confirm {
                error!("❌ Deleting a debate requires --confirm flag for safety");
                return Ok(());
            }
            delete_debate(&client, &cli.url, &debate_id).await?
        }
        Commands::ListSessions => list_sessions(&client, &cli.url).await?,
        Commands::GetSession { session_id } => get_session(&client, &cli.url, &session_id).await?,
        Commands::TerminateSession { session_id, confirm } => {
            if !confirm {
                error!("❌ Terminating a session requires --confirm flag for safety");
                return Ok(());
            }
            terminate_session(&client, &cli.url, &session_id).await?
        }
    }

    Ok(())
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{status}: {body}"));
    }
    Ok(response.json::<Value>().await?)
}

async fn show_health(client: &reqwest::Client, base: &str) -> Result<()> {
    info!("📊 Fetching provider health snapshots...");
    let body = get_json(client, &format!("{base}/v1/health")).await?;
    let entries = body.as_array().cloned().unwrap_or_default();

    println!("\n{}", "Provider Health".bold());
    println!("===============");
    if entries.is_empty() {
        println!("No providers registered yet.");
        return Ok(());
    }
    for entry in entries {
        let provider_id = entry.get("provider_id").and_then(Value::as_str).unwrap_or("?");
        let state = entry.get("circuit_state").and_then(Value::as_str).unwrap_or("?");
        let latency = entry.get("average_latency_ms").and_then(Value::as_f64).unwrap_or(0.0);
        let success = entry.get("success_count").and_then(Value::as_u64).unwrap_or(0);
        let failure = entry.get("failure_count").and_then(Value::as_u64).unwrap_or(0);
        let colored_state = match state {
            "Closed" => state.green(),
            "HalfOpen" => state.yellow(),
            _ => state.red(),
        };
        println!(
            "  {} [{colored_state}] avg={latency:.1}ms success={success} failure={failure}",
            provider_id.bold()
        );
    }
    Ok(())
}

async fn list_debates(client: &reqwest::Client, base: &str, status: Option<String>) -> Result<()> {
    let mut url = format!("{base}/v1/debates");
    if let Some(status) = &status {
        url.push_str(&format!("?status={status}"));
    }
    let body = get_json(client, &url).await?;
    let debates = body.as_array().cloned().unwrap_or_default();

    println!("\n{} ({})", "Debates".bold(), debates.len());
    println!("=====================================");
    if debates.is_empty() {
        println!("No debates found.");
        return Ok(());
    }
    for debate in debates {
        let id = debate.get("debate_id").and_then(Value::as_str).unwrap_or("?");
        let status = debate.get("status").and_then(Value::as_str).unwrap_or("?");
        let phase = debate.get("current_phase").and_then(Value::as_str).unwrap_or("?");
        println!("  {id} status={status} phase={phase}");
    }
    Ok(())
}

async fn get_debate(client: &reqwest::Client, base: &str, debate_id: &str) -> Result<()> {
    let body = get_json(client, &format!("{base}/v1/debates/{debate_id}")).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn get_results(client: &reqwest::Client, base: &str, debate_id: &str) -> Result<()> {
    let body = get_json(client, &format!("{base}/v1/debates/{debate_id}/results")).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn delete_debate(client: &reqwest::Client, base: &str, debate_id: &str) -> Result<()> {
    info!("🗑️  Requesting cancellation of debate {debate_id}...");
    let response = client
        .delete(format!("{base}/v1/debates/{debate_id}"))
        .send()
        .await?;
    if response.status().is_success() {
        info!("✅ {}", response.status());
    } else {
        error!("❌ {}: {}", response.status(), response.text().await.unwrap_or_default());
    }
    Ok(())
}

async fn list_sessions(client: &reqwest::Client, base: &str) -> Result<()> {
    let body = get_json(client, &format!("{base}/v1/sessions")).await?;
    let sessions = body.as_array().cloned().unwrap_or_default();

    println!("\n{} ({})", "Sessions".bold(), sessions.len());
    println!("=====================================");
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    for session in sessions {
        let id = session.get("session_id").and_then(Value::as_str).unwrap_or("?");
        let user = session.get("user_id").and_then(Value::as_str).unwrap_or("?");
        let status = session.get("status").and_then(Value::as_str).unwrap_or("?");
        println!("  {id} user={user} status={status}");
    }
    Ok(())
}

async fn get_session(client: &reqwest::Client, base: &str, session_id: &str) -> Result<()> {
    let body = get_json(client, &format!("{base}/v1/sessions/{session_id}?include_context=true")).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn terminate_session(client: &reqwest::Client, base: &str, session_id: &str) -> Result<()> {
    info!("🗑️  Terminating session {session_id}...");
    let response = client
        .delete(format!("{base}/v1/sessions/{session_id}"))
        .send()
        .await?;
    if response.status().is_success() {
        info!("✅ {}", response.status());
    } else {
        error!("❌ {}: {}", response.status(), response.text().await.unwrap_or_default());
    }
    Ok(())
}
