pub mod class;
pub mod task;
pub mod traits;
pub mod video;

pub use class::PgClassRepository;
pub use task::{TaskRepository, TASK_NOTIFY_CHANNEL};
pub use traits::{ClassStore, VideoStore};
pub use video::PgVideoRepository;

/// Escape `%`, `_` and `\` so user input matches literally inside an ILIKE pattern.
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
