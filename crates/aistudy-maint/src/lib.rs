pub mod cleanup;
pub mod html_check;

pub use cleanup::{CleanupReport, cleanup_uploads};
pub use html_check::{TagCount, TagReport, check_tag_balance};
