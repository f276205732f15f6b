//! Trustgate server binary.
//!
//! Usage: `trustgate-server [auth|admin|all|migrate|bootstrap]`
//!
//! Configuration comes from `OT_*` environment variables; see
//! `trustgate::config`. Serve modes run until SIGTERM/ctrl-c; `migrate`
//! applies the schema and exits; `bootstrap` runs the first-run admin
//! provisioning and exits.

use std::path::Path;
use std::process::ExitCode;

use tracing::error;

use trustgate::config::{Config, Mode};
use trustgate::core::app::AppState;
use trustgate::error::TgResult;
use trustgate_store_sqlite::SqliteStore;

async fn open_store(config: &Config) -> TgResult<SqliteStore> {
	if let Some(parent) = Path::new(&config.database.path).parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent)?;
		}
	}
	SqliteStore::new_with(&config.database.path, config.database.max_open, config.database.max_idle)
		.await
}

async fn migrate(config: &Config) -> TgResult<()> {
	let sqlite = open_store(config).await?;
	sqlite.migrate().await?;
	let store = sqlite.store();
	for role in trustgate::authz::seed_roles() {
		store.roles.upsert(&role).await?;
	}
	println!("migrations applied");
	Ok(())
}

async fn bootstrap(config: Config) -> TgResult<()> {
	let sqlite = open_store(&config).await?;
	let app = AppState::build(config, sqlite.store()).await?;
	trustgate::bootstrap::run(&app).await
}

async fn serve(config: Config, mode: Mode) -> TgResult<()> {
	let sqlite = open_store(&config).await?;
	trustgate::run(config, sqlite.store(), mode).await
}

#[tokio::main]
async fn main() -> ExitCode {
	trustgate::init_tracing();

	let command = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(err) => {
			error!("invalid configuration: {}", err);
			return ExitCode::FAILURE;
		}
	};

	let result = match command.as_str() {
		"migrate" => migrate(&config).await,
		"bootstrap" => bootstrap(config).await,
		mode => match mode.parse::<Mode>() {
			Ok(mode) => serve(config, mode).await,
			Err(err) => {
				error!("{}", err);
				return ExitCode::FAILURE;
			}
		},
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("fatal: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
