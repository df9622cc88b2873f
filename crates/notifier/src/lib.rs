//! Redis-driven trigger worker.
//!
//! The game-state writer pushes one event per created queue record onto a
//! Redis list. The worker pops events, loads the record and hands it to the
//! dispatcher. Events whose dispatch fails are re-queued until the attempt
//! budget runs out, then parked on a dead-letter list.

pub mod trigger;
pub mod worker;
