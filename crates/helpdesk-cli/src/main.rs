use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use helpdesk_cli::cli::commands::{
    agents_json, drain_toasts, messages_json, tasks_json, threads_json,
};
use helpdesk_cli::cli::{
    parse_enum, print_json, run_watch, wait_until_connected, CliConfig, IdentityOverrides,
    ThreadFilter,
};
use helpdesk_core::assignment::AssignTarget;
use helpdesk_core::sound::TerminalBell;
use helpdesk_core::CoreRuntime;
use serde_json::json;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "helpdesk-cli")]
#[command(about = "Headless client for the helpdesk agent console")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (identity, engine config)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Organization id
    #[arg(long)]
    org: Option<String>,

    /// Acting agent's user id
    #[arg(long)]
    user: Option<String>,

    /// Viewer role (admin or agent)
    #[arg(long)]
    role: Option<String>,

    /// Display name used as message sender
    #[arg(long)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Thread id
    #[arg(long, conflicts_with = "task", required_unless_present = "task")]
    thread: Option<String>,
    /// Task id
    #[arg(long)]
    task: Option<String>,
}

impl TargetArgs {
    fn into_target(self) -> Result<AssignTarget> {
        match (self.thread, self.task) {
            (Some(id), None) => Ok(AssignTarget::Thread(id)),
            (None, Some(id)) => Ok(AssignTarget::Task(id)),
            _ => anyhow::bail!("Pass exactly one of --thread or --task"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stay connected and print state changes and notifications
    Watch {
        /// Do not ring the terminal bell on new messages
        #[arg(long)]
        no_sound: bool,
    },

    /// List threads
    Threads {
        /// Category: unassigned, assigned, chat, bots, completed, trash
        #[arg(long = "type")]
        thread_type: Option<String>,
        /// active or ended
        #[arg(long)]
        status: Option<String>,
    },

    /// Search threads
    Search { query: String },

    /// Open a thread and list its messages
    Open { thread_id: String },

    /// Send a message to a thread
    Send { thread_id: String, content: String },

    /// List tasks
    Tasks {
        /// low, medium or high
        #[arg(long)]
        priority: Option<String>,
    },

    /// Mark a task read
    ReadTask { task_id: String },

    /// List agents with their presence
    Agents,

    /// Assign a thread or task to an online agent
    Assign {
        #[command(flatten)]
        target: TargetArgs,
        /// Agent id
        agent: String,
    },

    /// Remove the assignee of a thread or task
    Unassign {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Set own presence
    Presence {
        /// on or off
        state: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = helpdesk_core::tracing_setup::init_tracing() {
        eprintln!("Warning: {:#}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_ref() {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let role = cli
        .role
        .as_deref()
        .map(|r| parse_enum("role", r))
        .transpose()?;
    let identity = config.resolve_identity(IdentityOverrides {
        org_id: cli.org,
        user_id: cli.user,
        role,
        name: cli.name,
    })?;

    let core_config = config.core_config()?;
    let mut runtime = CoreRuntime::with_sound(core_config, Rc::new(TerminalBell))?;
    runtime.login(identity).await?;
    let pretty = cli.pretty;

    let output = match cli.command {
        Commands::Watch { no_sound } => {
            if no_sound {
                runtime.set_sound_enabled(false);
            }
            return run_watch(&mut runtime, pretty).await;
        }
        Commands::Threads {
            thread_type,
            status,
        } => {
            let filter = ThreadFilter {
                thread_type: thread_type
                    .as_deref()
                    .map(|t| parse_enum("thread type", t))
                    .transpose()?,
                status: status
                    .as_deref()
                    .map(|s| parse_enum("status", s))
                    .transpose()?,
            };
            threads_json(&runtime, filter)
        }
        Commands::Search { query } => {
            runtime.search_threads(&query).await?;
            threads_json(&runtime, ThreadFilter::default())
        }
        Commands::Open { thread_id } => {
            runtime.open_thread(&thread_id).await?;
            messages_json(&runtime)
        }
        Commands::Send { thread_id, content } => {
            wait_until_connected(&mut runtime, HANDSHAKE_TIMEOUT).await?;
            let message = runtime.send_message(&thread_id, &content)?;
            json!({ "sent": message })
        }
        Commands::Tasks { priority } => {
            let priority = priority
                .as_deref()
                .map(|p| parse_enum("priority", p))
                .transpose()?;
            tasks_json(&runtime, priority)
        }
        Commands::ReadTask { task_id } => {
            wait_until_connected(&mut runtime, HANDSHAKE_TIMEOUT).await?;
            runtime.mark_task_read(&task_id)?;
            runtime.process_pending().await;
            tasks_json(&runtime, None)
        }
        Commands::Agents => agents_json(&runtime),
        Commands::Assign { target, agent } => {
            runtime.assign(target.into_target()?, &agent).await?;
            json!({ "assigned": agent })
        }
        Commands::Unassign { target } => {
            let target = target.into_target()?;
            runtime.unassign(target.clone()).await?;
            json!({ "unassigned": target.id() })
        }
        Commands::Presence { state } => {
            let online = match state.as_str() {
                "on" | "online" => true,
                "off" | "offline" => false,
                other => anyhow::bail!("Unknown presence '{}', use on or off", other),
            };
            wait_until_connected(&mut runtime, HANDSHAKE_TIMEOUT).await?;
            let changed = runtime
                .toggle_presence(online)
                .context("Failed to set presence")?;
            json!({ "online": online, "changed": changed })
        }
    };

    let toasts = drain_toasts(&runtime);
    let output = if toasts.is_empty() {
        output
    } else {
        json!({ "result": output, "notices": toasts })
    };
    print_json(&output, pretty)?;
    runtime.logout();
    Ok(())
}
