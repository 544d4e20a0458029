//! RF front-end collaborator boundary
//!
//! The control core talks to the transceiver chip only through the
//! [`traits::RfTransceiver`] contract; register bit layouts stay inside
//! this module.

pub mod frontend;
pub mod registers;
pub mod traits;
