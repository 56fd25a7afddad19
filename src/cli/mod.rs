use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, anthropic)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API. Adapters pick the vendor default when unset.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. When empty the assistant answers in setup mode.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o, claude-sonnet-4-20250514)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Maximum tokens the model may produce per completion step.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1024")]
    pub chat_max_tokens: u32,

    // --- Conversation Args ---
    /// Hard cap on tool-use round trips within one turn.
    #[arg(long, env = "MAX_TOOL_ITERATIONS", default_value = "5")]
    pub max_tool_iterations: usize,

    /// Wall-clock budget for one turn, in seconds.
    #[arg(long, env = "TURN_TIMEOUT_SECS", default_value = "30")]
    pub turn_timeout_secs: u64,

    /// Optional JSON file overriding the built-in system directives.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    #[arg(long, env = "COMPANY_NAME", default_value = "LeadFlow AI")]
    pub company_name: String,

    /// Address offered to visitors whenever the assistant cannot help.
    #[arg(long, env = "CONTACT_EMAIL", default_value = "hello@leadflow.ai")]
    pub contact_email: String,

    // --- Calendar Args ---
    /// Google service-account key file. Without it availability is simulated.
    #[arg(long, env = "GOOGLE_SA_KEY_PATH")]
    pub google_sa_key_path: Option<String>,

    #[arg(long, env = "GOOGLE_CALENDAR_ID", default_value = "primary")]
    pub google_calendar_id: String,

    #[arg(long, env = "GOOGLE_CALENDAR_BASE_URL", default_value = "https://www.googleapis.com/calendar/v3")]
    pub google_calendar_base_url: String,

    /// IANA timezone the slot grid and booking confirmations use.
    #[arg(long, env = "BUSINESS_TIMEZONE", default_value = "America/New_York")]
    pub business_timezone: String,

    /// Chance that a slot is offered when no calendar is connected (0.0 to 1.0).
    #[arg(long, env = "AVAILABILITY_PROBABILITY", default_value = "0.6")]
    pub availability_probability: f64,

    // --- HTTP Args ---
    /// Requests per second accepted on /api/chat across all clients.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Service-account key path, ignoring a blank value.
    pub fn calendar_key_path(&self) -> Option<&str> {
        self.google_sa_key_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}
