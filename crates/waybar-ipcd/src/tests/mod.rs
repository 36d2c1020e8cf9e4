//! Test suites for the waybar IPC daemon.

mod lifecycle_behaviour;
mod support;
