pub mod detector;

pub use detector::{DetectorParams, ThreeCandleDetector};
