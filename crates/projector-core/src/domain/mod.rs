//! Domain entities for the presentation remote bridge.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core rules of the application.
//! - Has **no** imports from OS APIs, network libraries, or async runtimes.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here the domain is small: the slideshow status automaton.  Everything that
//! talks to sockets or subprocesses lives in the `projector-bridge` crate and
//! depends on this module, never the other way round.

/// Slideshow status automaton.
///
/// See [`status::PresentationStatus`] for the main type.
pub mod status;
