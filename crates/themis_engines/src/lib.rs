#![forbid(unsafe_code)]

pub mod gateway;
pub mod sealer;

pub use gateway::{DecryptionGateway, GatewayError, InProcessDecryptionGateway};
pub use sealer::{AttributeSealer, SealerError};
