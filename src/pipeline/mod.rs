//! Pipeline stages for caption reconciliation.
//!
//! Each submodule implements exactly one transformation step and none of
//! them performs I/O, so every stage can be tested on plain strings.
//!
//! ## Data Flow
//!
//! ```text
//! text ───▶ scan ──────────┐
//!                          ├──▶ rewrite ──▶ stray-link pass ──▶ text + report
//! listing ─▶ inventory ────┘       ▲
//!                 paths ───────────┘
//! ```
//!
//! 1. [`scan`]      locate generated-caption placeholders, in order, and the
//!                  reference definitions shortcut captions point at
//! 2. [`inventory`] filter the media listing down to raster images
//! 3. [`paths`]     relativise absolute paths against the vault root
//! 4. [`rewrite`]   pair placeholders with images, emit real links, and drop
//!                  definition lines folded into a placeholder

pub mod inventory;
pub mod paths;
pub mod rewrite;
pub mod scan;
