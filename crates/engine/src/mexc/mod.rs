mod rest;

pub use rest::MexcClient;
