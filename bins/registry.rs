use tracing::{error, info};

fn main() -> std::process::ExitCode {
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    // server::run loads .env and installs the tracing subscriber; the hook
    // only fires once the runtime is inside it.
    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "registry",
            event = "panic",
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    // Worker threads from config.toml when present, else TOKIO_WORKER_THREADS.
    // A broken config file is reported by server::run below.
    let worker_threads = match configs::AppConfig::load_or_default() {
        Ok(cfg) => cfg.server.worker_threads,
        Err(_) => std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok()),
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = worker_threads {
        builder.worker_threads(w);
    }

    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to build tokio runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    // server::run handles the shutdown signal and self-unregistration itself.
    match rt.block_on(server::run()) {
        Ok(()) => {
            info!(service = "registry", event = "stop", pid, version, "registry stopped normally");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = "registry", event = "run_failed", error = %e, "server::run returned error");
            std::process::ExitCode::FAILURE
        }
    }
}
