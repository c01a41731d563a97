use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use uuid::Uuid;

use service::MirrorStore;

fn init_logging(json: bool) {
    common::utils::logging::init_logging(json);
    info!(service = "mirror", event = "logger_init", "tracing subscriber initialized");
}

enum Command {
    Snapshot,
    Purge,
}

fn parse_command() -> Result<Command, String> {
    match std::env::args().nth(1).as_deref() {
        None | Some("snapshot") => Ok(Command::Snapshot),
        Some("purge") => Ok(Command::Purge),
        Some(other) => Err(format!("unknown command '{other}'; expected snapshot or purge")),
    }
}

fn main() -> ExitCode {
    // load .env first so RUST_LOG and DB_* take effect
    dotenv().ok();
    let cfg = match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging_default();
            error!(service = "mirror", event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(cfg.logging.json);

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    common::utils::logging::install_panic_hook("mirror", run_id.to_string());

    let command = match parse_command() {
        Ok(c) => c,
        Err(e) => {
            error!(service = "mirror", event = "bad_args", "{e}");
            return ExitCode::from(2);
        }
    };

    info!(
        service = "mirror",
        event = "start",
        %run_id,
        pid,
        addr = %cfg.store.address(),
        db = cfg.store.db_index,
        version = env!("CARGO_PKG_VERSION"),
        "mirror starting"
    );

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "mirror", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async move {
        let store = MirrorStore::from_config(&cfg.store);
        match command {
            Command::Snapshot => snapshot(&store).await,
            Command::Purge => store.purge().await.map_err(anyhow::Error::from),
        }
    });

    match result {
        Ok(()) => {
            info!(service = "mirror", event = "exit", %run_id, pid, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = "mirror", event = "run_failed", %run_id, pid, error = %e, "mirror command failed");
            ExitCode::FAILURE
        }
    }
}

async fn snapshot(store: &MirrorStore) -> anyhow::Result<()> {
    let failed = store.refresh_all().await;
    for (field, e) in &failed {
        warn!(field = field.path(), key = field.key(), error = %e, "field could not be read");
    }
    if failed.len() == models::Field::ALL.len() {
        anyhow::bail!("no field could be read from the store");
    }
    let record = store.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
