pub mod bus;
pub mod dispatcher;
pub mod envelope;
pub mod proxy;

pub use bus::MessageBus;
pub use envelope::{decode_reply, encode_err, encode_ok, Action, Envelope};
pub use proxy::WikiDatabaseProxy;
