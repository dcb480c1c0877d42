mod middleware;
mod public;

pub use public::{HttpState, NewsletterPages, build_router};
