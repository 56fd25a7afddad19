pub mod api;

use crate::agent::BookingAgent;
use crate::cli::Args;
use self::api::AppState;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    args: Args,
    state: AppState,
}

impl Server {
    /// `agent` is `None` in setup mode, when no model backend is configured.
    pub fn new(args: Args, agent: Option<Arc<BookingAgent>>) -> Self {
        let state = AppState::new(agent, args.contact_email.clone(), args.rate_limit_per_second);
        Self { args, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.args, self.state.clone()).await
    }
}
