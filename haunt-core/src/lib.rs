#![doc = "haunt-core: core pipeline library for haunt."]

//! This crate contains the transfer and analysis pipeline for haunt: splitting files into
//! ordered chunks, tracking per-file progress, sequencing a session through finalize, and
//! classifying the analysis response into a status model.
//!
//! Transport is abstracted behind [`contract::TransferClient`]; the CLI crate provides the
//! HTTP implementation and tests use the generated `MockTransferClient`.
//!
//! # Usage
//! Build a [`session::SessionCoordinator`] from a client, a preprocessor and a
//! [`config::TransferConfig`], then call `run` with the selected files.

pub mod analysis;
pub mod config;
pub mod contract;
pub mod error;
pub mod preprocess;
pub mod progress;
pub mod session;
pub mod status;
pub mod uploader;
