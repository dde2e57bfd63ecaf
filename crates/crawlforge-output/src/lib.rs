//! Output Binder: accepts extracted rows via the event bus, orders
//! fields per the config-specified `data_order`, and hands them to a
//! configured [`Sink`].

pub mod binder;
pub mod sink;

pub use binder::OutputBinder;
pub use sink::{CsvSink, DatabaseSink, Orientation, Row, Sink, TxtSink};
