use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pagesift_config::AppConfig;
use pagesift_runtime::{DaemonClient, Extractor, run_server};

/// Run the daemon until Ctrl-C or a `Shutdown` command.
pub(crate) async fn serve(extractor: Arc<Extractor>, socket_path: &str) -> Result<()> {
    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            on_signal.cancel();
        }
    });
    run_server(extractor, socket_path, shutdown).await
}

pub(crate) async fn doctor(config: &AppConfig) {
    println!("pagesift doctor");
    println!("- provider: {}", config.llm.provider);
    println!("- model: {}", config.active_model());
    if config.is_openrouter() {
        let key_state = if config.llm.openrouter_api_key.trim().is_empty() {
            "missing"
        } else {
            "set"
        };
        println!("- openrouter api key: {key_state}");
    } else {
        println!("- ollama endpoint: {}", config.llm.ollama_base_url);
    }
    println!("- strategy: {:?}", config.extraction.strategy);
    println!("- selection mode: {:?}", config.extraction.selection_mode);
    println!(
        "- renderer: render_js={} timeout={}s proxy={}",
        config.renderer.render_js,
        config.renderer.navigation_timeout_secs,
        config.renderer.reader_proxy_url
    );
    if config.diagnostics.enabled {
        println!("- diagnostics: {}", config.diagnostics.dir);
    } else {
        println!("- diagnostics: off");
    }

    match config.validate() {
        Ok(()) => println!("- configuration: ok"),
        Err(err) => println!("- configuration: {err}"),
    }

    let client = DaemonClient::new(&config.daemon.socket_path);
    match client.ping().await {
        Ok(()) => println!("- daemon: up at {}", config.daemon.socket_path),
        Err(_) => println!("- daemon: not running ({})", config.daemon.socket_path),
    }
}
