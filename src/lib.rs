//! # Pocket Poem
//!
//! Offline build pipeline for the Pocket Poem app's poetry database.
//!
//! Pocket Poem reads a tree of heterogeneous classical-poetry JSON corpora
//! (Tang and Song poetry, Song lyrics, Yuan opera, chaptered anthologies),
//! normalizes every record into one shape, and bulk-loads the result into a
//! single indexed SQLite file that the mobile app opens read-only. A
//! popularity shortlist built from search-engine ranking data then marks a
//! small "hot" subset.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  convert  │──▶│  catalog  │──▶│ normalize  │──▶│  ingest  │
//! │ 繁 → 简   │   │ families  │   │ 12 shapes  │   │  SQLite  │
//! └───────────┘   └───────────┘   └────────────┘   └────┬─────┘
//!                                                       │
//!                              ┌──────────┐   ┌─────────▼┐
//!                              │   rank   │──▶│   hot    │
//!                              │ top-N    │   │ hot = 1  │
//!                              └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! poemdb sources                # what the catalog resolves
//! poemdb convert                # write *.simplified.json siblings
//! poemdb build                  # fresh database from the corpus
//! poemdb rank                   # popularity shortlist
//! poemdb mark-hot               # flag shortlisted poems
//! poemdb stats                  # verification report
//! poemdb pipeline               # all of the above, in order
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection and artifact reset |
//! | [`migrate`] | Schema initialization |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors |
//! | [`catalog`] | Source file discovery |
//! | [`normalize`] | Per-corpus record normalization |
//! | [`ingest`] | Bulk loading |
//! | [`rank`] | Popularity shortlist |
//! | [`hot`] | Hot-poem marking |
//! | [`zhdict`] | Script conversion stages |
//! | [`convert`] | Corpus-wide conversion pass |
//! | [`collections`] | Collection queries |
//! | [`stats`] | Verification report |
//! | [`sources`] | Catalog overview |
//! | [`progress`] | Progress reporting |
//! | [`chat`] | AI text service client |
//! | [`pipeline`] | End-to-end orchestration |

pub mod catalog;
pub mod chat;
pub mod collections;
pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod hot;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod rank;
pub mod sources;
pub mod stats;
pub mod zhdict;
