//! Minimal client for Apache Kafka brokers speaking version 0 of the wire protocol.
//!
//! # Features
//! - bootstrap from a fixed list of brokers, failing over between them
//! - routing of produce, fetch and offset requests to partition leaders
//! - a [round-robin producer](client::producer::Producer)
//! - a [consumer](client::consumer::Consumer) with two-phase offsets that are checkpointed to a JSON file
//!
//! Compression, consumer group coordination, TLS and SASL are not supported.
//!
//! # Example
//! ```no_run
//! # async fn test() {
//! use std::sync::Arc;
//!
//! use kafka_basic::client::{producer::Producer, ClientBuilder};
//!
//! let client = ClientBuilder::new(vec!["localhost:9092".to_string()])
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let mut producer = Producer::new(Arc::new(client), "my_topic").unwrap();
//! producer.send(["hello", "world"]).await.unwrap();
//! # }
//! ```
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

mod build_info;

pub mod client;

pub mod connection;

pub mod protocol;

pub mod record;

pub mod topic;

pub use build_info::DEFAULT_CLIENT_ID;
