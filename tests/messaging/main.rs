//! End-to-end send and poll tests
//!
//! Run against the in-memory broker and Schema Registry, so no Kafka cluster
//! is needed.

mod common;
mod filters;
mod positions;
mod send_and_read;
