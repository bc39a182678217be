use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use vg_domain::clock::SystemClock;
use vg_domain::config::{Config, ConfigSeverity};
use vg_gateway::cli::{Cli, Command, ConfigCommand};
use vg_gateway::fetch::{Fetch, Fetcher};
use vg_gateway::monitor::MonitorRegistry;
use vg_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = vg_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = vg_gateway::cli::load_config()?;
            let passed = vg_gateway::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = vg_gateway::cli::load_config()?;
            let valid = vg_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = vg_gateway::cli::load_config()?;
            vg_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("vigil-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vg_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("vigil starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating storage dir {}", config.storage.data_dir.display()))?;
    if config.fetch.dump_enabled {
        std::fs::create_dir_all(&config.fetch.dump_dir)
            .with_context(|| format!("creating dump dir {}", config.fetch.dump_dir.display()))?;
    }

    // Enforce single-instance via an exclusive lock on the PID file, if
    // configured. The handle is kept alive for the rest of this
    // function so the lock is held for the server's whole lifetime.
    let _pid_guard = match &config.server.pid_file {
        Some(pid_path) => Some(vg_gateway::cli::pid::write_pid_file(pid_path)?),
        None => None,
    };

    let dump_dir = config.fetch.dump_enabled.then(|| config.fetch.dump_dir.clone());
    let fetcher: Arc<dyn Fetch> = Arc::new(
        Fetcher::new(
            config.fetch.timeout_ms,
            &config.fetch.user_agent,
            config.fetch.max_size_bytes as usize,
            config.fetch.max_text_chars,
            dump_dir,
        )
        .context("building HTTP fetcher")?,
    );
    tracing::info!(timeout_ms = config.fetch.timeout_ms, "fetcher ready");

    let registry = Arc::new(MonitorRegistry::new(
        config.storage.data_dir.clone(),
        config.storage.default_sound.clone(),
        fetcher,
        config.captcha.keywords.clone(),
        config.limits.min_interval_minutes,
        config.limits.max_concurrent_fetches,
        Arc::new(SystemClock),
    ));
    tracing::info!("monitor registry ready");

    let state = AppState {
        config: config.clone(),
        registry,
    };

    let cors_layer = build_cors_layer(&config.server.cors);

    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second as u64)
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );
        GovernorLayer { config: Arc::new(gov_config) }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
    }

    let router = vg_gateway::api::router().layer(cors_layer);
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state)
    } else {
        router.with_state(state)
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "vigil listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    tracing::info!("vigil shutting down");
    if let (Some(pid_path), Some(handle)) = (&config.server.pid_file, _pid_guard) {
        vg_gateway::cli::pid::remove_pid_file(pid_path, handle);
    }
    Ok(())
}

/// Waits for Ctrl-C (or, on Unix, SIGTERM) so `axum::serve` can stop
/// accepting new connections and let in-flight requests finish before
/// the process exits — a scan already past its fetch barrier still
/// writes its results; one not yet dispatched simply never starts.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins
/// may carry a trailing `*` wildcard for the port segment (e.g.
/// `http://localhost:*`).
fn build_cors_layer(cors: &vg_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if let Some(prefix) = origin.strip_suffix('*') {
            wildcard_prefixes.push(prefix.to_string());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
