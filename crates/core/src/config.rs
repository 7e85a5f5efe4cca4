use std::collections::HashSet;
use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::page::DEFAULT_ROWS_PER_PAGE;
use crate::errors::DomainError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub renderer: RendererConfig,
    pub converter: ConverterConfig,
    pub telegram: TelegramConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    pub business_lines: Vec<BusinessLineConfig>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
    pub system_prompt_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub template_dir: PathBuf,
    pub rows_per_page: usize,
}

#[derive(Clone, Debug)]
pub struct ConverterConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub api_base_url: String,
    pub document_filename: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub max_concurrent_orders: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// One bot / template / credential set served by the shared order pipeline.
#[derive(Clone, Debug)]
pub struct BusinessLineConfig {
    pub name: String,
    pub route: String,
    pub bot_token: SecretString,
    pub template: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub port: Option<u16>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub converter_url: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub rows_per_page: Option<usize>,
    pub max_concurrent_orders: Option<usize>,
    pub business_lines: Option<Vec<BusinessLineConfig>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: "claude-opus-4-20250514".to_string(),
                timeout_secs: 60,
                max_output_tokens: 2000,
                system_prompt_path: PathBuf::from("prompts/system_prompt.txt"),
            },
            renderer: RendererConfig {
                template_dir: PathBuf::from("templates/receipts"),
                rows_per_page: DEFAULT_ROWS_PER_PAGE,
            },
            converter: ConverterConfig { url: String::new(), timeout_secs: 60 },
            telegram: TelegramConfig {
                api_base_url: "https://api.telegram.org".to_string(),
                document_filename: "receipt.pdf".to_string(),
                timeout_secs: 60,
            },
            pipeline: PipelineConfig { max_concurrent_orders: 16 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            business_lines: default_business_lines(),
        }
    }
}

fn default_business_lines() -> Vec<BusinessLineConfig> {
    [
        ("default", "/webhook", "rs_vegetables"),
        ("anil_kiryana", "/anilkiryanawebhook", "anil_kiryana"),
        ("rs_vegetables", "/rsvegetableswebhook", "rs_vegetables"),
    ]
    .into_iter()
    .map(|(name, route, template)| BusinessLineConfig {
        name: name.to_string(),
        route: route.to_string(),
        bot_token: String::new().into(),
        template: template.to_string(),
    })
    .collect()
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl RendererConfig {
    pub fn page_size(&self) -> Result<NonZeroUsize, DomainError> {
        NonZeroUsize::new(self.rows_per_page).ok_or(DomainError::ZeroPageSize)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("orderslip.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
            if let Some(system_prompt_path) = llm.system_prompt_path {
                self.llm.system_prompt_path = system_prompt_path;
            }
        }

        if let Some(renderer) = patch.renderer {
            if let Some(template_dir) = renderer.template_dir {
                self.renderer.template_dir = template_dir;
            }
            if let Some(rows_per_page) = renderer.rows_per_page {
                self.renderer.rows_per_page = rows_per_page;
            }
        }

        if let Some(converter) = patch.converter {
            if let Some(url) = converter.url {
                self.converter.url = url;
            }
            if let Some(timeout_secs) = converter.timeout_secs {
                self.converter.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(document_filename) = telegram.document_filename {
                self.telegram.document_filename = document_filename;
            }
            if let Some(timeout_secs) = telegram.timeout_secs {
                self.telegram.timeout_secs = timeout_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(max_concurrent_orders) = pipeline.max_concurrent_orders {
                self.pipeline.max_concurrent_orders = max_concurrent_orders;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        // A file that lists business lines replaces the built-in registry.
        if let Some(lines) = patch.business_lines {
            self.business_lines = lines
                .into_iter()
                .map(|line| BusinessLineConfig {
                    name: line.name,
                    route: line.route,
                    bot_token: secret_value(line.bot_token.unwrap_or_default()),
                    template: line.template,
                })
                .collect();
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ORDERSLIP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("ORDERSLIP_SERVER_PORT").map(|value| ("ORDERSLIP_SERVER_PORT", value));
        if let Some((key, value)) = port.or_else(|| read_env("PORT").map(|value| ("PORT", value))) {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("ORDERSLIP_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ORDERSLIP_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERSLIP_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ORDERSLIP_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("ORDERSLIP_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }
        if let Some(value) = read_env("ORDERSLIP_LLM_SYSTEM_PROMPT_PATH") {
            self.llm.system_prompt_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("ORDERSLIP_RENDERER_TEMPLATE_DIR") {
            self.renderer.template_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("ORDERSLIP_RENDERER_ROWS_PER_PAGE") {
            self.renderer.rows_per_page = parse_usize("ORDERSLIP_RENDERER_ROWS_PER_PAGE", &value)?;
        }

        if let Some(value) = read_env("ORDERSLIP_CONVERTER_URL") {
            self.converter.url = value;
        }
        if let Some(value) = read_env("ORDERSLIP_CONVERTER_TIMEOUT_SECS") {
            self.converter.timeout_secs = parse_u64("ORDERSLIP_CONVERTER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERSLIP_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("ORDERSLIP_TELEGRAM_DOCUMENT_FILENAME") {
            self.telegram.document_filename = value;
        }
        if let Some(value) = read_env("ORDERSLIP_TELEGRAM_TIMEOUT_SECS") {
            self.telegram.timeout_secs = parse_u64("ORDERSLIP_TELEGRAM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERSLIP_PIPELINE_MAX_CONCURRENT_ORDERS") {
            self.pipeline.max_concurrent_orders =
                parse_usize("ORDERSLIP_PIPELINE_MAX_CONCURRENT_ORDERS", &value)?;
        }

        let log_level =
            read_env("ORDERSLIP_LOGGING_LEVEL").or_else(|| read_env("ORDERSLIP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERSLIP_LOGGING_FORMAT").or_else(|| read_env("ORDERSLIP_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        for line in &mut self.business_lines {
            if let Some(value) = read_env(&business_line_token_var(&line.name)) {
                line.bot_token = secret_value(value);
            }
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(converter_url) = overrides.converter_url {
            self.converter.url = converter_url;
        }
        if let Some(template_dir) = overrides.template_dir {
            self.renderer.template_dir = template_dir;
        }
        if let Some(rows_per_page) = overrides.rows_per_page {
            self.renderer.rows_per_page = rows_per_page;
        }
        if let Some(max_concurrent_orders) = overrides.max_concurrent_orders {
            self.pipeline.max_concurrent_orders = max_concurrent_orders;
        }
        if let Some(business_lines) = overrides.business_lines {
            self.business_lines = business_lines;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_llm(&self.llm)?;
        validate_renderer(&self.renderer)?;
        validate_converter(&self.converter)?;
        validate_telegram(&self.telegram)?;
        validate_pipeline(&self.pipeline)?;
        validate_logging(&self.logging)?;
        validate_business_lines(&self.business_lines)?;
        Ok(())
    }
}

/// Environment variable that carries the bot token for a business line,
/// e.g. `ORDERSLIP_BUSINESS_LINE_ANIL_KIRYANA_BOT_TOKEN`.
pub fn business_line_token_var(name: &str) -> String {
    let normalized: String = name
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("ORDERSLIP_BUSINESS_LINE_{normalized}_BOT_TOKEN")
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("orderslip.toml"), PathBuf::from("config/orderslip.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers (set ORDERSLIP_LLM_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_renderer(renderer: &RendererConfig) -> Result<(), ConfigError> {
    if renderer.rows_per_page == 0 {
        return Err(ConfigError::Validation(
            "renderer.rows_per_page must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_converter(converter: &ConverterConfig) -> Result<(), ConfigError> {
    if converter.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "converter.url is required: the HTML-to-PDF endpoint (set ORDERSLIP_CONVERTER_URL)"
                .to_string(),
        ));
    }
    if !is_http_url(&converter.url) {
        return Err(ConfigError::Validation(
            "converter.url must start with http:// or https://".to_string(),
        ));
    }
    if converter.timeout_secs == 0 || converter.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "converter.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    if !is_http_url(&telegram.api_base_url) {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    if telegram.document_filename.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.document_filename must not be empty".to_string(),
        ));
    }
    if telegram.timeout_secs == 0 || telegram.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "telegram.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.max_concurrent_orders == 0 {
        return Err(ConfigError::Validation(
            "pipeline.max_concurrent_orders must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_business_lines(lines: &[BusinessLineConfig]) -> Result<(), ConfigError> {
    if lines.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[business_lines]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    let mut routes = HashSet::new();
    for line in lines {
        if line.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "business_lines.name must not be empty".to_string(),
            ));
        }
        if !names.insert(line.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "business_lines.name `{}` is declared more than once",
                line.name
            )));
        }
        if !line.route.starts_with('/') || line.route.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "business_lines.route `{}` must start with `/` and name a path",
                line.route
            )));
        }
        if let Some(bad) = line.route.chars().find(|ch| !is_route_char(*ch)) {
            return Err(ConfigError::Validation(format!(
                "business_lines.route `{}` contains `{bad}`; routes are literal paths of letters, digits, `/`, `_`, `-` and `.`",
                line.route
            )));
        }
        if line.route == "/health" {
            return Err(ConfigError::Validation(
                "business_lines.route `/health` is reserved for the health endpoint".to_string(),
            ));
        }
        if !routes.insert(line.route.as_str()) {
            return Err(ConfigError::Validation(format!(
                "business_lines.route `{}` is used by more than one business line",
                line.route
            )));
        }
        if line.template.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "business_lines.template is required for `{}`",
                line.name
            )));
        }

        let token = line.bot_token.expose_secret();
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "business_lines.bot_token is required for `{}` (set {}). Get it from @BotFather",
                line.name,
                business_line_token_var(&line.name)
            )));
        }
        if !token.contains(':') {
            return Err(ConfigError::Validation(format!(
                "business_lines.bot_token for `{}` must look like `<bot id>:<secret>` as issued by @BotFather",
                line.name
            )));
        }
    }

    Ok(())
}

fn is_route_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '/' | '_' | '-' | '.')
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    llm: Option<LlmPatch>,
    renderer: Option<RendererPatch>,
    converter: Option<ConverterPatch>,
    telegram: Option<TelegramPatch>,
    pipeline: Option<PipelinePatch>,
    logging: Option<LoggingPatch>,
    business_lines: Option<Vec<BusinessLinePatch>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_output_tokens: Option<u32>,
    system_prompt_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RendererPatch {
    template_dir: Option<PathBuf>,
    rows_per_page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ConverterPatch {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    api_base_url: Option<String>,
    document_filename: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    max_concurrent_orders: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Deserialize)]
struct BusinessLinePatch {
    name: String,
    route: String,
    bot_token: Option<String>,
    template: String,
}
