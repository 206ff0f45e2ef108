#![doc = "fpr-sync-core: artifact synchronisation engine for fpr-sync."]

//! This crate holds the data models and pipelines shared by the upload, download and commit flows:
//! resolving application/version names to ids, transferring artifact files, and the failure ledger
//! that lets a bulk run resume later. It has no knowledge of HTTP; the service is reached through the
//! [`contract::SscClient`] trait.
//!
//! # Usage
//! Build an `SscClient` (the `fpr-sync` crate provides the HTTP one), then call one of the pass
//! entrypoints in [`synchronise`] or [`commit`].

pub mod commit;
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod naming;
pub mod resolver;
pub mod synchronise;
pub mod toolkit;
pub mod transfer;

pub use error::{Result, SyncError};
