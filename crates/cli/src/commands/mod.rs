mod compose;
mod inspect;
mod resolve;

pub use compose::handle_compose;
pub use inspect::handle_inspect;
pub use resolve::handle_resolve;
