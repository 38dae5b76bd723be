//! Wardrobe: a personal clothing catalog with weather-aware outfit
//! suggestions, purchase advice and try-on renders backed by a generation API.

pub mod config;
pub mod error;
pub mod filter;
pub mod genai;
pub mod image;
pub mod models;
pub mod parse;
pub mod proxy;
pub mod retry;
pub mod store;
pub mod stylist;
pub mod weather;

pub use error::{Result, WardrobeError};
