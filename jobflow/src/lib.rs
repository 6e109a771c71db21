// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    ConfigOverrides, InitSummary, ScrapeInvocation, ScrapeRequest, expand_path, format_job_line,
    init_config_dir, load_config,
};
