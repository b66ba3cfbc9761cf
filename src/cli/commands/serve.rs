use anyhow::Result;

use crate::config::Config;
use crate::state::AppState;

pub async fn handle_serve() -> Result<()> {
    let config = Config::load()?;
    let state = AppState::bootstrap(config)?;
    crate::run_service(state).await
}
