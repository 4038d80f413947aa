// Library surface for the binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod calibration;
pub mod config;
pub mod deadline;
pub mod display;
pub mod logging;
pub mod progression;
pub mod question_log;
pub mod questions;
pub mod runtime;
pub mod selector;
pub mod session;
pub mod stats;
pub mod ui;
pub mod util;
