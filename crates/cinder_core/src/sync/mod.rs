//! # Background Work
//!
//! Scenes are single-threaded: every structural change happens on the thread
//! that calls `simulate`. Heavy work (meshing, pathfinding, asset decoding)
//! goes to a [`Worker`] and comes back as plain values a system applies in
//! its turn.
//!
//! ```text
//! process()  ──submit──►  worker thread
//!     ▲                        │
//!     └────────drain───────────┘
//! ```

mod worker;

pub use worker::Worker;
