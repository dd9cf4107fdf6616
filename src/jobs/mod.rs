//! Time-driven booking lifecycle work.
//!
//! Handlers never mutate state on a clock; everything that happens "by
//! itself" (stale-booking expiry, the pending reminder cascade, overdue
//! handling, escrow release, compensation bans) lives here and is driven
//! by [`scheduler`].

pub mod booking_jobs;
pub mod scheduler;
