//! Numeric building blocks for the anomaly and forecast engines.

pub mod adf;
pub mod autoencoder;
pub mod decomposition;
pub mod holt_winters;
pub mod kmeans;
pub mod optimize;
pub mod sarima;
pub mod stats;
pub mod tsne;
