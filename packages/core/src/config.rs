//! Централизованная конфигурация для messaging core
//!
//! All limits the chat screens enforce live here so that validation,
//! routing and the composer agree on the same numbers.

use std::sync::OnceLock;
use std::time::Duration;

/// Глобальная конфигурация (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// MIME types accepted for document attachments.
pub const DEFAULT_DOCUMENT_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // СООБЩЕНИЯ
    // ============================================

    /// Максимальная длина текста сообщения (в символах)
    pub max_text_length: usize,

    // ============================================
    // ВЛОЖЕНИЯ
    // ============================================

    /// Images allowed on one outgoing message
    pub max_images_per_message: usize,

    /// Documents allowed on one outgoing message
    pub max_documents_per_message: usize,

    /// Voice notes allowed on one outgoing message
    pub max_audio_per_message: usize,

    /// Upper bound for a document attachment, inclusive
    pub max_document_size_bytes: u64,

    /// Accepted document MIME types
    pub allowed_document_mime_types: Vec<String>,

    // ============================================
    // КРИПТОГРАФИЯ
    // ============================================

    /// Suite used for new envelopes
    pub default_suite_id: u16,

    /// Шифровать ли новые in-app сообщения по умолчанию
    pub encryption_enabled: bool,

    // ============================================
    // ВРЕМЕННЫЕ ПАРАМЕТРЫ
    // ============================================

    /// Simulated latency of the in-app transport (в миллисекундах)
    pub send_delay_ms: u64,

    /// Период тика таймера записи (в миллисекундах)
    pub recording_tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_text_length: 500,

            max_images_per_message: 5,
            max_documents_per_message: 1,
            max_audio_per_message: 1,
            max_document_size_bytes: 10_000_000,
            allowed_document_mime_types: DEFAULT_DOCUMENT_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),

            default_suite_id: crate::crypto::CLASSIC_SUITE_ID,
            encryption_enabled: true,

            send_delay_ms: 800,
            recording_tick_ms: 1000,
        }
    }
}

impl Config {
    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(parsed) = env_parse("MAX_TEXT_LENGTH") {
            config.max_text_length = parsed;
        }

        if let Some(parsed) = env_parse("MAX_IMAGES_PER_MESSAGE") {
            config.max_images_per_message = parsed;
        }

        if let Some(parsed) = env_parse("MAX_DOCUMENT_SIZE_BYTES") {
            config.max_document_size_bytes = parsed;
        }

        if let Some(parsed) = env_parse("SEND_DELAY_MS") {
            config.send_delay_ms = parsed;
        }

        if let Some(parsed) = env_parse("ENCRYPTION_ENABLED") {
            config.encryption_enabled = parsed;
        }

        config
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn recording_tick(&self) -> Duration {
        Duration::from_millis(self.recording_tick_ms)
    }

    /// Проверить, разрешён ли MIME тип документа
    pub fn is_document_mime_allowed(&self, mime_type: &str) -> bool {
        let mime = mime_type.trim().to_ascii_lowercase();
        self.allowed_document_mime_types.iter().any(|m| *m == mime)
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию со значениями по умолчанию
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_text_length, 500);
        assert_eq!(config.max_images_per_message, 5);
        assert_eq!(config.max_documents_per_message, 1);
        assert_eq!(config.max_document_size_bytes, 10_000_000);
    }

    #[test]
    fn test_config_values() {
        let config = Config::default();

        // Crypto params
        assert_eq!(config.default_suite_id, 1);
        assert!(config.encryption_enabled);

        // Timing
        assert_eq!(config.send_delay(), Duration::from_millis(800));
        assert_eq!(config.recording_tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_document_mime_allowlist() {
        let config = Config::default();
        assert!(config.is_document_mime_allowed("application/pdf"));
        assert!(config.is_document_mime_allowed("TEXT/PLAIN"));
        assert!(config.is_document_mime_allowed(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(!config.is_document_mime_allowed("application/zip"));
        assert!(!config.is_document_mime_allowed("image/png"));
    }
}
