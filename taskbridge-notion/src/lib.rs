//! # taskbridge-notion
//!
//! Notion-flavored [`RemoteStore`](taskbridge_sync::remote::RemoteStore)
//! client (API 2025-09-03): data source resolution, cursor pagination, and
//! the property projection mapping. Thin plumbing — the reconciler knows
//! nothing about any of this.

pub mod client;
pub mod props;

pub use client::{NotionStore, NOTION_VERSION};
