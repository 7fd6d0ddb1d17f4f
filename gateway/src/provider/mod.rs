pub mod client;

pub use client::ProviderClient;
