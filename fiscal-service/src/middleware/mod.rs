pub mod context;

pub use context::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
