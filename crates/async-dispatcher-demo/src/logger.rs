//! Logger setup for the demo binary

/// Initialise env_logger, defaulting to `info` unless RUST_LOG says otherwise
pub fn init() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
    {
        eprintln!("Logger already initialised: {}", e);
    }
}
