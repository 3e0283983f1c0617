use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Filter used when `RUST_LOG` is unset: info for our crates, warn for
/// everything else (teloxide and reqwest are chatty at info).
fn default_filter(service_name: &str) -> String {
    format!("warn,lvb_core=info,lvb_api=info,lvb_telegram=info,{service_name}=info")
}

/// Initialize tracing for the bot. `RUST_LOG` overrides the default filter.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("tracing init failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_dependencies() {
        let filter = default_filter("lvb");
        assert!(filter.starts_with("warn,"));
        assert!(filter.ends_with(",lvb=info"));
        assert!(filter.contains("lvb_core=info"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
