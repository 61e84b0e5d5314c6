// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export the helpers the handlers are built from
pub use handlers::{
    add_sources, format_candidate_links, load_run_config, parse_kind, resolve_database_path,
};
