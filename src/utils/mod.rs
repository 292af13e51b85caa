pub mod paths;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();
const DEFAULT_DIRECTIVES: [&str; 3] = ["todo_master=info", "todo_core=info", "todo_storage_json=info"];

/// Initializes the global tracing subscriber. Logs go to stderr so command output stays clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        for directive in DEFAULT_DIRECTIVES {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
