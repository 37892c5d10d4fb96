#![allow(dead_code)]

use axum::Router;
use std::net::SocketAddr;

/// Provider/model variables that must not leak in from a dev machine.
pub const HOST_KEYS: &[&str] = &[
    "WEBSCOUT_SEARCH_PROVIDER",
    "WEBSCOUT_SERPER_API_KEY",
    "SERPER_API_KEY",
    "WEBSCOUT_SERPER_ENDPOINT",
    "WEBSCOUT_BRAVE_API_KEY",
    "BRAVE_SEARCH_API_KEY",
    "WEBSCOUT_TAVILY_API_KEY",
    "TAVILY_API_KEY",
    "WEBSCOUT_SEARXNG_ENDPOINT",
    "WEBSCOUT_SEARXNG_ENDPOINTS",
    "WEBSCOUT_LLM",
    "WEBSCOUT_OPENAI_COMPAT_BASE_URL",
    "WEBSCOUT_OPENAI_COMPAT_API_KEY",
    "WEBSCOUT_OPENAI_COMPAT_MODEL",
    "WEBSCOUT_OLLAMA_ENABLE",
    "WEBSCOUT_ENV_FILE",
    "WEBSCOUT_MAX_STEPS",
    // Fixture servers live on 127.0.0.1; never route them through a proxy.
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

pub fn webscout_cmd() -> tokio::process::Command {
    let bin = assert_cmd::cargo::cargo_bin!("webscout");
    let mut cmd = tokio::process::Command::new(bin);
    // Disable `.env` autoload so contracts stay hermetic.
    cmd.env("WEBSCOUT_DOTENV", "0");
    for k in HOST_KEYS {
        cmd.env_remove(k);
    }
    cmd
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn stdout_json(out: &std::process::Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "webscout failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let s = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(s.trim()).unwrap_or_else(|e| panic!("stdout is not json ({e}): {s}"))
}
