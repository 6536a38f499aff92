use quanx_logger::{LevelFilter, LogFormat, Logger};

#[test]
fn console_only_logger_has_no_file_output() {
    let logger = Logger::builder()
        .name("quanx-console-only")
        .format(LogFormat::Json)
        .level(LevelFilter::DEBUG)
        .init()
        .expect("console logger should initialize");

    tracing::debug!(port = 8888, "console only");
    assert!(!logger.has_file_output(), "console-only logger should not attach a file writer");
}
