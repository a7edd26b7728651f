pub mod client;
pub mod common;

pub use common::connection::{read_greeting, send_vote};
pub use common::error::VoteError;
pub use common::messages::VoteRecord;
