//! Types shared between the classify server and the page it serves.
pub mod protocol;
