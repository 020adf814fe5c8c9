mod middleware;
mod native;

pub use native::build_router;
