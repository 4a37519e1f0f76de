use std::io::Write;

fn init_logging() {
    // Defaults to info; RUST_LOG overrides.
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() {
    init_logging();
    if let Err(err) = ctrlc::set_handler(llmfanout_service::request_shutdown) {
        log::warn!("event=signal_handler_failed err={}", err);
    }
    if let Err(err) = llmfanout_service::start_configured_server() {
        log::error!("event=service_stopped err={}", err);
        eprintln!("llmfanout-service stopped: {err}");
        std::process::exit(1);
    }
}
