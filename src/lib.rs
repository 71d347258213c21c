//! Plan-level unit test fixtures for Terraform templates.
//!
//! A [`fixture::UnitTestFixture`] runs `init`, switches to an isolated
//! workspace, runs `plan`, decodes `show -json` and checks the plan against
//! partial expectations before restoring the original workspace.

pub mod config;
pub mod expectation;
pub mod fixture;
pub mod matcher;
pub mod plan;
pub mod policy;
pub mod terraform;
pub mod workspace;
