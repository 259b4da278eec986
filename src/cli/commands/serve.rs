//! Serve command - MCP server over stdio or streamable HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::config::{Settings, Transport};
use crate::mcp::{JqServer, http_server::serve_http, notifications::NotificationBroadcaster};
use crate::registry::FileRegistry;

/// Capacity of the per-session notification channel.
const BROADCAST_CAPACITY: usize = 100;

/// Arguments for the serve command. `None` keeps the configured value.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub data_path: Option<PathBuf>,
    pub transport: Option<String>,
    pub bind: Option<String>,
    pub token: Option<String>,
    pub instructions: Option<String>,
    pub no_watch: bool,
}

impl ServeArgs {
    /// Layer the CLI flags over loaded settings.
    pub fn apply(self, mut settings: Settings) -> Settings {
        if let Some(path) = self.data_path {
            settings.data_path = Some(path);
        }
        if let Some(transport) = self.transport {
            settings.server.transport = transport;
        }
        if let Some(bind) = self.bind {
            settings.server.bind = bind;
        }
        if let Some(token) = self.token {
            settings.server.token = Some(token);
        }
        if let Some(instructions) = self.instructions {
            settings.instructions = Some(instructions);
        }
        if self.no_watch {
            settings.watch.enabled = false;
        }
        settings
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, settings: Settings) -> anyhow::Result<()> {
    let settings = args.apply(settings);
    let transport = settings.transport()?;
    let data_dir = settings.data_dir()?;

    let broadcaster = Arc::new(NotificationBroadcaster::new(BROADCAST_CAPACITY));
    let registry = Arc::new(
        FileRegistry::builder(&data_dir)
            .notifier(broadcaster.clone())
            .quiet_period(settings.quiet_period())
            .build()
            .with_context(|| format!("Failed to index {}", data_dir.display()))?,
    );

    eprintln!(
        "Discovered {} JSON files in {}",
        registry.get_files().len(),
        registry.root().display()
    );
    if !settings.prompts.is_empty() {
        eprintln!("Loaded {} prompt(s)", settings.prompts.len());
    }

    if settings.watch.enabled {
        match registry.start_watching() {
            Ok(()) => crate::log_event!(
                "serve",
                "watching",
                "debounce: {}ms",
                settings.watch.debounce_ms
            ),
            Err(e) => {
                tracing::warn!("[serve] could not enable file watching: {e}");
                eprintln!("Warning: could not enable file watching: {e}");
                eprintln!("Continuing without file watching...");
            }
        }
    }

    let settings = Arc::new(settings);
    let result = match transport {
        Transport::Stdio => {
            crate::log_event!("serve", "starting", "stdio transport");
            let server = JqServer::new(Arc::clone(&registry), Arc::clone(&settings));
            crate::mcp::serve_stdio(server, Some(broadcaster)).await
        }
        Transport::Http => {
            let bind = settings.server.bind.clone();
            serve_http(Arc::clone(&registry), settings, broadcaster, bind).await
        }
    };

    registry.close();
    result
}
