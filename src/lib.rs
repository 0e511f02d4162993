// Library exports for Emotion Overlay - webcam emotion detection client

pub mod camera;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod render;
pub mod transport;
pub mod ui;
