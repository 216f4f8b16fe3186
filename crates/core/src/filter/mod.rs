//! Filter models and the value kinds the compiler understands.

mod envelope;
mod ranges;
mod value;

pub use envelope::SearchEnvelope;
pub use ranges::{DateRange, NumberRange, TimeRange, DATE_FORMAT};
pub use value::{find_envelope, FilterValue, SearchFilter};
