//! Plan Builders (C7): one module per public verb (§4.7). Each exposes an
//! `Options` type (typed-builder) and a `pub async fn run(...)` entry point
//! that validates, builds a [`crate::engine::Plan`], and runs it.

mod common;

pub mod add_node;
pub mod add_subcluster;
pub mod cluster_health;
pub mod create_database;
pub mod remove_node;
pub mod remove_subcluster;
pub mod replace_node;
pub mod replicate_database;
pub mod restore_points;
pub mod rotate_tls_certs;
pub mod stage_system_tables;
pub mod start_nodes;
pub mod stop_nodes;
