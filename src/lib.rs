pub mod agent;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod locale;
pub mod models;
pub mod server;
pub mod tools;

use agent::BookingAgent;
use cli::Args;
use log::{ info, warn };
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Max Tool Iterations: {}", args.max_tool_iterations);
    info!("Turn Timeout: {}s", args.turn_timeout_secs);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Company Name: {}", args.company_name);
    info!("Business Timezone: {}", args.business_timezone);
    info!("Calendar Enabled: {}", args.calendar_key_path().is_some());
    if args.calendar_key_path().is_some() {
        info!("Calendar Id: {}", args.google_calendar_id);
    } else {
        info!("Placeholder Availability Rate: {}", args.availability_probability);
    }
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = if args.chat_api_key.trim().is_empty() {
        warn!("CHAT_API_KEY is not set. Answering every chat request in setup mode.");
        None
    } else {
        Some(Arc::new(BookingAgent::from_args(&args).await?))
    };

    let server = Server::new(args, agent);
    server.run().await?;

    Ok(())
}
