use tracing_subscriber::EnvFilter;

// Lowered so request logs are not drowned by driver chatter.
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("actix_server", "warn"),
    ("mongodb", "warn"),
    ("h2", "warn"),
];

fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let mut directives = vec![level.to_string()];
    for (target, lvl) in NOISY_TARGETS {
        directives.push(format!("{}={}", target, lvl));
    }
    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", filter_str, e))
}

/// Installs the global subscriber. `log::*` records are bridged into it.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level)?)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))
}
