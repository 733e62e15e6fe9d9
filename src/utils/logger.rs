use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Initialise the process logger. `RUST_LOG` wins when set; otherwise the
/// service logs at info with quieter HTTP internals.
pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,narravox=info");

    let mut builder = Builder::from_env(env);
    builder
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
