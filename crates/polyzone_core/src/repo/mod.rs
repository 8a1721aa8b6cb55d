//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the geometry store contract used by registry services.
//! - Isolate SQLite and R*Tree query details from service orchestration.
//!
//! # Invariants
//! - Every mutation runs in one immediate transaction and either commits
//!   fully or leaves the pre-mutation state untouched.
//! - Repository APIs return semantic errors (`NotFound`, `Duplicate`) in
//!   addition to DB transport errors.

pub mod polygon_repo;
