/// Integration tests running the engines end to end over files on disk:
/// anomaly detection, forecasting and synthetic data generation.

mod anomaly;
mod forecast;
mod helpers;
mod synthetic;
