//! # sdstore-ipc
//!
//! Wire frames, length-delimited codec, and Unix-domain-socket transport
//! used by `sdstored` and `sdstore` to talk to each other.
//!
//! ## Architecture
//!
//! - `frame`: `Request`/`Reply` enums
//! - `codec`: 4-byte big-endian length prefix + `bincode` payload
//! - `transport`: `Connection` trait and the `UnixTransport` listener
//!
//! Only a Unix-domain-socket transport is implemented. `Connection` is the
//! seam a different transport (FIFOs, TCP) would plug into.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod frame;
pub mod transport;

pub use codec::{read_frame, write_frame, CodecError};
pub use frame::{JobRow, Reply, Request, TransformRow};
pub use transport::{Connection, TransportError, UnixTransport};
