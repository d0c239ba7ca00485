mod adapter;
mod error;
mod record;
mod stage;

pub use adapter::{AckHandle, Message, MessageSink, MessageSource, OverflowPolicy};
pub use error::{AdapterError, ErrorKind, ParseError};
pub use record::{field, Pressure, Record, Temperature, Value, INGRESS_FIELDS};
pub use stage::{Diagnostics, Stage};
