//! Classify your webcam stream with an image model and watch the class probabilities in the browser.
pub mod config;
pub mod endpoints;
pub mod frame_loop;
pub mod labels;
pub mod meter;
pub mod nn;
pub mod pubsub;
pub mod sensors;
pub mod session;
pub mod surface;
