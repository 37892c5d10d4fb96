use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use webscout::chat::{ChatUi, HELP};
use webscout::core::{AgentConfig, InMemorySessionStore};
use webscout::local::{configured_chat_models, configured_search_providers};

#[derive(Parser, Debug)]
#[command(name = "webscout")]
#[command(about = "Web research assistant: news digests and a reason-act tool loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question and exit.
    Ask(AskCmd),
    /// Interactive research sessions (/help for commands).
    Chat(ChatCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AskCmd {
    /// The question. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
    /// Output format: text|json
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
    /// Override the reason-act step ceiling.
    #[arg(long)]
    max_steps: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct ChatCmd {
    /// Override the reason-act step ceiling.
    #[arg(long)]
    max_steps: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    // stdout carries answers and JSON; logs always go to stderr.
    let filter = std::env::var("WEBSCOUT_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| tracing_subscriber::EnvFilter::try_new(s).ok())
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn agent_config(max_steps: Option<usize>) -> Result<AgentConfig> {
    let mut cfg = AgentConfig::from_env();
    if let Some(n) = max_steps {
        cfg.max_steps = n;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[derive(serde::Serialize)]
struct AskOutput<'a> {
    schema_version: u32,
    kind: &'static str,
    query: &'a str,
    #[serde(flatten)]
    outcome: &'a webscout::core::RunOutcome,
}

fn doctor_payload(elapsed: std::time::Instant) -> serde_json::Value {
    let search = configured_search_providers();
    let llm = configured_chat_models();

    // Build (but never call) the selected backends so selection errors show up here.
    let client = webscout::local::default_client();
    let (search_selected, search_error) = match client
        .as_ref()
        .map_err(|e| e.to_string())
        .and_then(|c| webscout::local::search_provider_from_env(c.clone()).map_err(|e| e.to_string()))
    {
        Ok(p) => (Some(p.name().to_string()), None),
        Err(e) => (None, Some(e)),
    };
    let (llm_selected, llm_error) = match client
        .as_ref()
        .map_err(|e| e.to_string())
        .and_then(|c| webscout::local::chat_model_from_env(c.clone()).map_err(|e| e.to_string()))
    {
        Ok(m) => (Some(m.name().to_string()), None),
        Err(e) => (None, Some(e)),
    };

    let cfg = AgentConfig::from_env();
    let cfg_error = cfg.validate().err().map(|e| e.to_string());

    let mut checks: Vec<serde_json::Value> = Vec::new();
    checks.push(serde_json::json!({
        "name": "agent_config",
        "ok": cfg_error.is_none(),
        "message": cfg_error.clone().unwrap_or_else(|| "agent config is valid".to_string()),
        "hint": if cfg_error.is_some() { "Check the WEBSCOUT_* agent variables (e.g. WEBSCOUT_SCORE_PATTERN needs a capture group)." } else { "" },
    }));
    let search_ok = search_error.is_none() && !search.is_empty();
    checks.push(serde_json::json!({
        "name": "search_provider",
        "ok": search_ok,
        "message": search_error.clone().unwrap_or_else(|| if search.is_empty() {
            "no search provider configured".to_string()
        } else {
            "search provider configured".to_string()
        }),
        "hint": if search_ok { "" } else { "Set WEBSCOUT_SERPER_API_KEY (or SERPER_API_KEY), or a Brave/Tavily key, or WEBSCOUT_SEARXNG_ENDPOINT." },
    }));
    let llm_ok = llm_error.is_none() && !llm.is_empty();
    checks.push(serde_json::json!({
        "name": "language_model",
        "ok": llm_ok,
        "message": llm_error.clone().unwrap_or_else(|| if llm.is_empty() {
            "no language model configured; only news queries can be answered".to_string()
        } else {
            "language model configured".to_string()
        }),
        "hint": if llm_ok { "" } else { "Set WEBSCOUT_OPENAI_COMPAT_BASE_URL and WEBSCOUT_OPENAI_COMPAT_MODEL, or WEBSCOUT_OLLAMA_ENABLE=1." },
    }));

    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "webscout",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "elapsed_ms": elapsed.elapsed().as_millis(),
        // Booleans and backend names only; never key values.
        "configured": {
            "search": {
                "serper": search.contains(&"serper"),
                "brave": search.contains(&"brave"),
                "tavily": search.contains(&"tavily"),
                "searxng": search.contains(&"searxng"),
                "selected": search_selected,
            },
            "llm": {
                "openai_compat": llm.contains(&"openai_compat"),
                "ollama": llm.contains(&"ollama"),
                "selected": llm_selected,
            },
        },
        "agent": cfg,
        "checks": checks,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    webscout::load_env_files();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask(args) => {
            let query = args.query.join(" ");
            let agent = webscout::agent_from_env(agent_config(args.max_steps)?)?;
            let outcome = agent.run(&query).await;
            tracing::info!(route = ?outcome.route, steps = outcome.steps, exhausted = outcome.exhausted, "ask finished");
            match args.output.to_ascii_lowercase().as_str() {
                "json" => {
                    let v = AskOutput {
                        schema_version: 1,
                        kind: "ask",
                        query: &query,
                        outcome: &outcome,
                    };
                    println!("{}", serde_json::to_string(&v)?);
                }
                _ => println!("{}", outcome.answer),
            }
        }
        Commands::Chat(args) => {
            let agent = webscout::agent_from_env(agent_config(args.max_steps)?)?;
            let store = Arc::new(InMemorySessionStore::new());
            let mut ui = ChatUi::new(agent, store);
            println!(
                "webscout {} (session {})\n{}\n",
                env!("CARGO_PKG_VERSION"),
                ui.current(),
                HELP
            );
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            ui.run(stdin, std::io::stdout()).await?;
        }
        Commands::Doctor(args) => {
            let payload = doctor_payload(std::time::Instant::now());
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!(
                        "webscout {} (ok={})",
                        env!("CARGO_PKG_VERSION"),
                        payload["ok"].as_bool().unwrap_or(false)
                    );
                    println!(
                        "search: selected={}",
                        payload["configured"]["search"]["selected"]
                            .as_str()
                            .unwrap_or("none")
                    );
                    println!(
                        "llm: selected={}",
                        payload["configured"]["llm"]["selected"]
                            .as_str()
                            .unwrap_or("none")
                    );
                    println!("checks:");
                    if let Some(arr) = payload["checks"].as_array() {
                        for c in arr {
                            let name = c["name"].as_str().unwrap_or("?");
                            let ok = c["ok"].as_bool().unwrap_or(false);
                            let msg = c["message"].as_str().unwrap_or("");
                            println!("- {}: {} ({})", name, if ok { "ok" } else { "fail" }, msg);
                        }
                    }
                }
                _ => println!("{payload}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "webscout",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("webscout {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
