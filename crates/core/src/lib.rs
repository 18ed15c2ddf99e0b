#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod blob;
pub mod cnf;
pub mod codec;
pub mod ctx;
pub mod dataset;
pub mod doc;
pub mod err;
pub mod graph;
pub mod key;
pub mod kvs;
pub mod mem;
pub mod options;
pub mod tbl;
