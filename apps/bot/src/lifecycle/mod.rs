//! Request and response lifecycles, including the supplier selection protocol.
//!
//! State changes commit first; notifications go out afterwards and never roll
//! anything back.

pub mod requests;
pub mod responses;
pub mod texts;

pub use responses::choose_supplier;
