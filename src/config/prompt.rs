use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use log::info;
use thiserror::Error;

use crate::locale::Locale;
use crate::tools::{ BOOK_SLOT, CHECK_AVAILABILITY };

const COMPANY_PLACEHOLDER: &str = "{company}";

const SYSTEM_DIRECTIVE_EN: &str =
    "You are a scheduling assistant for {company}, a lead automation service. Your ONLY job is to book a discovery call in the MINIMUM number of messages possible.

Language: Respond in English.

Available tools:
- check_availability: Returns available 30-minute slots for the next 5 business days
- book_slot: Creates a calendar event and sends invite

Optimal flow (aim for 3-4 exchanges total):
1. Open with: ask for preferred day/time
2. Show 2-3 available slots closest to their preference
3. Once selected, ask for name and email in ONE message
4. Book immediately, confirm with details

Rules:
- Keep responses to 1-2 sentences MAX
- Never ask unnecessary questions
- If they give partial info (e.g., \"Tuesday\"), immediately show Tuesday slots
- Be professional but warm. Not robotic, not overly casual
- End every booking with a clear confirmation + what happens next

Example slots format when presenting options:
\"I have these slots available:
1. Tuesday, Jan 15 at 10:00 AM
2. Tuesday, Jan 15 at 2:00 PM
3. Wednesday, Jan 16 at 11:00 AM

Which works best for you?\"";

const SYSTEM_DIRECTIVE_ES: &str =
    "Eres un asistente de agendamiento para {company}, un servicio de automatización de leads. Tu ÚNICO trabajo es agendar una llamada de descubrimiento en el MÍNIMO número de mensajes posible.

Idioma: Responde en español.

Herramientas disponibles:
- check_availability: Retorna slots de 30 minutos disponibles para los próximos 5 días hábiles
- book_slot: Crea un evento en calendario y envía invitación

Flujo óptimo (apunta a 3-4 intercambios total):
1. Abre preguntando: día/hora preferida
2. Muestra 2-3 slots disponibles más cercanos a su preferencia
3. Una vez seleccionado, pide nombre y email en UN mensaje
4. Agenda inmediatamente, confirma con detalles

Reglas:
- Mantén respuestas a 1-2 oraciones MÁXIMO
- Nunca hagas preguntas innecesarias
- Si dan info parcial (ej. \"martes\"), muestra slots del martes inmediatamente
- Sé profesional pero cálido. No robótico, no demasiado casual
- Termina cada agendamiento con una confirmación clara + qué sigue

Formato de slots al presentar opciones:
\"Tengo estos horarios disponibles:
1. Martes 15 de enero a las 10:00 AM
2. Martes 15 de enero a las 2:00 PM
3. Miércoles 16 de enero a las 11:00 AM

¿Cuál te funciona mejor?\"";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("System directive for locale '{0}' not found")]
    DirectiveNotFound(Locale),

    #[error("System directive for locale '{locale}' is invalid: {reason}")]
    InvalidDirective {
        locale: Locale,
        reason: String,
    },

    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Locale-specific system directives handed to the model on every turn.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    pub system_directives: HashMap<Locale, String>,
}

impl PromptConfig {
    pub fn builtin() -> Self {
        let system_directives = HashMap::from([
            (Locale::En, SYSTEM_DIRECTIVE_EN.to_string()),
            (Locale::Es, SYSTEM_DIRECTIVE_ES.to_string()),
        ]);
        Self { system_directives }
    }

    /// Every locale needs a directive, and each must name both tools.
    pub fn validate(&self) -> Result<(), PromptError> {
        for locale in Locale::ALL {
            let directive = self.system_directives
                .get(&locale)
                .ok_or(PromptError::DirectiveNotFound(locale))?;
            if directive.trim().is_empty() {
                return Err(PromptError::InvalidDirective { locale, reason: "empty".to_string() });
            }
            for tool in [CHECK_AVAILABILITY, BOOK_SLOT] {
                if !directive.contains(tool) {
                    return Err(PromptError::InvalidDirective {
                        locale,
                        reason: format!("does not mention tool '{}'", tool),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn with_company(mut self, company_name: &str) -> Self {
        for directive in self.system_directives.values_mut() {
            *directive = directive.replace(COMPANY_PLACEHOLDER, company_name);
        }
        self
    }

    pub fn system_directive(&self, locale: Locale) -> Result<&str, PromptError> {
        self.system_directives
            .get(&locale)
            .map(|s| s.as_str())
            .ok_or(PromptError::DirectiveNotFound(locale))
    }
}

pub fn load_prompts_from_str(content: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_prompts(path: &str) -> Result<PromptConfig, PromptError> {
    let file_content = fs::read_to_string(path)?;
    load_prompts_from_str(&file_content)
}

/// Built-in directives unless a prompts file is configured.
pub fn initialize_prompts(
    prompts_path: Option<&str>,
    company_name: &str
) -> Result<Arc<PromptConfig>, PromptError> {
    let config = match prompts_path.filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            info!("Loading system directives from '{}'", path);
            load_prompts(path)?
        }
        None => {
            let config = PromptConfig::builtin();
            config.validate()?;
            config
        }
    };
    Ok(Arc::new(config.with_company(company_name)))
}
