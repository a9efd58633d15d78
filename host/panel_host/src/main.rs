use std::process;

use panel_host_runtime::HostConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = panel_host_runtime::run(HostConfig::from_env()) {
        eprintln!("panel_host fatal error: {err}");
        process::exit(1);
    }
}
