pub mod client;

pub use client::GraphClient;
