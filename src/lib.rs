//! **zonesnap**: zone assignment and snap policy engine for window tiling.
//!
//! A screen is divided into *zones* by a layout.  zonesnap tracks which
//! window occupies which zone, decides where newly opened windows should
//! snap, navigates between zones by geometry, rotates windows around a
//! layout and moves them along when the layout changes.  Assignments survive
//! restarts through a stable per-application identity.
//!
//! # Architecture
//!
//! The crate is organised around the [`engine::SnapEngine`], a
//! single-threaded orchestrator fed with [`command::Event`]s that answers
//! with [`command::Request`]s.  It is decoupled from its surroundings by
//! the traits in [`traits`]:
//!
//! * [`traits::LayoutProvider`] and [`traits::ScreenProvider`] supply the
//!   active layouts and the physical screens.
//! * [`traits::CommandSource`] abstracts the transport that delivers events
//!   (the Unix socket in [`ipc`], a test harness, …).
//!
//! The algorithms live in their own modules: [`store`] (the authoritative
//! window → zone mapping), [`policy`] (auto-snap chain), [`navigation`]
//! (adjacency), [`rotation`] (rotate / resnap) and [`persistence`]
//! (debounced durable state).

pub mod command;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod identity;
pub mod ipc;
pub mod layout;
pub mod navigation;
pub mod persistence;
pub mod policy;
pub mod rotation;
pub mod screen;
pub mod store;
pub mod traits;
