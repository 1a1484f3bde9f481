//! Source command handlers.

use clap::Subcommand;
use feedgroups::Result;
use feedgroups::models::{SourceId, SourceOpenTarget, SourceRequest, Transition, position_of};

use super::App;

/// Source subcommands.
#[derive(Subcommand)]
pub enum SourcesAction {
    /// List sources by identity.
    List,

    /// Subscribe to a feed; it starts ungrouped.
    Add {
        /// Feed endpoint.
        url: String,
        /// Display name (defaults to the endpoint host).
        #[arg(short, long)]
        name: Option<String>,
        /// Where articles open: local, webpage or external.
        #[arg(long, value_parser = parse_open_target)]
        open_target: Option<SourceOpenTarget>,
        /// Favicon URL.
        #[arg(long)]
        icon_url: Option<String>,
    },

    /// Unsubscribe from a feed.
    Delete {
        /// Source identity.
        sid: SourceId,
    },
}

/// Executes a source subcommand.
pub fn cmd_sources(app: &App, action: SourcesAction) -> Result<()> {
    match action {
        SourcesAction::List => {
            let sources = app.catalog.list()?;
            if sources.is_empty() {
                println!("No sources.");
            }
            for source in sources {
                println!(
                    "[{}] {} <{}> opens {}",
                    source.sid, source.name, source.url, source.open_target
                );
            }
        },
        SourcesAction::Add {
            url,
            name,
            open_target,
            icon_url,
        } => {
            let mut request = SourceRequest::new(url);
            if let Some(name) = name {
                request = request.with_name(name);
            }
            if let Some(target) = open_target {
                request = request.with_open_target(target);
            }
            if let Some(icon_url) = icon_url {
                request = request.with_icon_url(icon_url);
            }
            let source = app.catalog.add(&request)?;
            app.store.dispatch(Transition::SourceAdded { sid: source.sid })?;
            println!("Added [{}] {}", source.sid, source.name);
        },
        SourcesAction::Delete { sid } => {
            let source = app.catalog.delete(sid)?;
            if position_of(&app.store.snapshot()?, sid).is_some() {
                app.store.dispatch(Transition::SourceDeleted { sid })?;
            }
            println!("Deleted [{}] {}", source.sid, source.name);
        },
    }
    Ok(())
}

fn parse_open_target(s: &str) -> std::result::Result<SourceOpenTarget, String> {
    SourceOpenTarget::parse(s).ok_or_else(|| format!("unknown open target '{s}'"))
}
