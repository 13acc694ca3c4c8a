// Communication module - Line transport and wire conventions
pub mod message;
pub mod transport;

pub use message::{format_relay, is_quit, ChatLine, QUIT_KEYWORD};
pub use transport::{LineReader, LineWriter};
