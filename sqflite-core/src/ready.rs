use std::future::Future;
use std::sync::OnceLock;

use sqflite_db::DbError;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::BridgeResult;

/// Outcome of the one-time engine bootstrap, shared by every bridge.
static ENGINE: OnceLock<Result<(), DbError>> = OnceLock::new();

/// Initializes the engine and returns a ready [`Bridge`].
///
/// This is the readiness signal: the host awaits it once, and no bridge
/// function can be called before it resolves because no bridge exists
/// until then. The engine itself is bootstrapped at most once per process;
/// later calls reuse the first outcome.
///
/// # Errors
///
/// Returns the engine error if `SQLite` fails to initialize.
pub fn initialize(config: BridgeConfig) -> impl Future<Output = BridgeResult<Bridge>> {
    async move {
        ENGINE
            .get_or_init(|| {
                log::debug!("bootstrapping sqlite engine");
                sqflite_db::initialize()
            })
            .clone()?;
        log::info!("sqflite bridge ready (api {})", config.api_version);
        Ok(Bridge::new(config))
    }
}
