pub use parking_node_core::config::Config;

// config values are generated at compile time from cfg.toml, see build.rs
include!(concat!(env!("OUT_DIR"), "/config.rs"));
