//! # linkplay-core
//!
//! Core types for the linkplay library.
//!
//! This crate provides the building blocks shared by the Matroska metadata
//! parser and the timeline demuxer:
//! - Error handling types
//! - Rational arithmetic and time base conversion
//! - Packet and timestamp management

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod packet;
pub mod rational;
pub mod timestamp;

pub use error::{ContainerError, Error, Result};
pub use packet::{OwnedPacket, Packet, PacketFlags};
pub use rational::Rational;
pub use timestamp::{Duration, TimeBase, Timestamp};
