#![doc = "minio-uploader-core: core logic library for minio-uploader."]

//! This crate holds everything the `minio-uploader` binary does apart from argument
//! parsing and process exit codes: the run transcript, manifest parsing, locating or
//! installing the `mc` client, and the sequential upload batch driven through it.
//!
//! # Usage
//! Construct a [`logger::RunLog`], a [`config::StorageConfig`] and an
//! [`install::McInstaller`], then hand them to [`batch::run_batch`].

pub mod batch;
pub mod client;
pub mod config;
pub mod install;
pub mod logger;
pub mod manifest;
pub mod runner;
