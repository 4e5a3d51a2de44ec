//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the link
//! against mock or in-memory serial ports. All tests run on the host with
//! no real hardware required.

mod link_tests;
mod loopback_tests;
mod mock_port;
mod pool_tests;
