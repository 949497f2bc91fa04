//! # MGB Catalog
//!
//! Ingestion pipeline for a media catalog of games, movies, TV shows and
//! books.
//!
//! Connectors page through Google Books, IGDB, TMDb and the YouTube Data
//! API, normalize each provider's payload into one flat schema, and upsert
//! the result into SQLite keyed by the provider's own identifier. Reference
//! entities (genres, actors, crew) and "similar item" links are stitched in
//! as titles are stored.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │  Connectors  │──▶│  Paginate   │──▶│ Normalize │──▶│  SQLite  │
//! │ Books/IGDB/  │   │ Idle→Fetch  │   │ + Upsert  │   │ catalog  │
//! │ TMDb/YouTube │   │ →Done|Abort │   │ + Links   │   │          │
//! └──────────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                                                          │
//!                                                     ┌────▼─────┐
//!                                                     │ Library  │
//!                                                     │ fav/rate │
//!                                                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mgb init                       # create database
//! mgb sync games                 # IGDB, 10 000 games in batches of 500
//! mgb sync movies --pages 5      # TMDb popular movies
//! mgb sync tv --start-page 3     # TMDb popular shows
//! mgb sync trailers              # YouTube lookups for items without one
//! mgb backfill release-dates
//! mgb stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`error`] | Provider failure taxonomy |
//! | [`http`] | Outbound HTTP with bounded retry |
//! | [`normalize`] | Field normalization rules |
//! | [`connector_books`] | Google Books connector |
//! | [`connector_igdb`] | IGDB connector |
//! | [`connector_tmdb`] | TMDb connector |
//! | [`connector_youtube`] | YouTube trailer search |
//! | [`paginate`] | Pagination state machine |
//! | [`store`] | Idempotent upserts and link maintenance |
//! | [`ingest`] | Per-source pipelines |
//! | [`backfill`] | Derived-field recomputation |
//! | [`library`] | Favorites, status and ratings |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod backfill;
pub mod config;
pub mod connector_books;
pub mod connector_igdb;
pub mod connector_tmdb;
pub mod connector_youtube;
pub mod db;
pub mod error;
pub mod http;
pub mod ingest;
pub mod library;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod paginate;
pub mod progress;
pub mod sources;
pub mod stats;
pub mod store;
