//! Portal rules that do not touch storage: who may see and message whom, how
//! threads are addressed, and the derived score statistics.

pub mod access;
pub mod email;
pub mod error;
pub mod identity;
pub mod scores;
pub mod threading;

pub use error::PortalError;
