//! Integration tests for logging system

use bridge_traits::access::PortableAccessToken;
use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    default_filter, init_logging, redact_if_sensitive, redact_token, strip_path, LogFormat,
    LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);
    init_logging(config.clone()).unwrap();
    tracing::info!(target: "core_sync", "logging ready");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
    assert!(config.filter.is_none());
}

#[test]
fn test_default_filter_levels() {
    let filter = default_filter(LogLevel::Trace);
    assert!(filter.contains("core_library=trace"));
    assert!(filter.contains("bridge_desktop=trace"));
    assert!(!filter.contains("walkdir"));
}

#[test]
fn test_tokens_never_logged_verbatim() {
    let token = PortableAccessToken::new(b"eyJwYXRoIjoiL3Bob3RvcyJ9".to_vec());
    let redacted = redact_token(&token);
    assert!(!redacted.contains("eyJ"));
    assert_eq!(redact_if_sensitive("access_token", "eyJ"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("rating", "5"), "5");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/Users/me/Pictures/2024/IMG_1.HEIC"), "IMG_1.HEIC");
    assert_eq!(strip_path("D:\\shoots\\wedding\\DSC_0042.NEF"), "DSC_0042.NEF");
    assert_eq!(strip_path(""), "");
}
