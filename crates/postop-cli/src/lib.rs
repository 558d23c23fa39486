//! The `postop` command-line application.
//!
//! Loads configuration, brings the vector index to ready, and answers
//! questions about post-surgery care guides with and without retrieved
//! context.
//!
//! - [`config`]: `PostopConfig`, loaded with `confyg`
//! - [`cli`]: clap argument definitions
//! - [`app`]: command dispatch, chat loop, output rendering
//! - [`providers`]: embedding and generation clients from config

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod providers;

pub use app::{PostopCli, chat_loop, describe_error, init_logging, render_both, run};
pub use cli::{CliArgs, Command};
pub use config::PostopConfig;
