//! Method-channel adapter for the `webcrypto` engine.
//!
//! Hosts send [`MethodCall`]s naming a WebCrypto operation; keys never leave
//! the process and are referred to by UUID handles from the [`KeyStore`].
//!
//! ```
//! use serde_json::json;
//! use webcrypto_channel::{MethodCall, MethodHandler, WebCryptoChannel};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! runtime.block_on(async {
//!     let channel = WebCryptoChannel::default();
//!     let call = MethodCall::new("digest", json!({"algorithm": "SHA-256", "data": ""}));
//!     let response = channel.handle(call).await;
//!     assert!(response.is_success());
//! });
//! ```

pub mod api;
pub mod channel;
pub mod error;
pub mod logging;
pub mod platform;
pub mod store;
pub mod wire;

pub use api::{ErrorBody, MethodCall, MethodHandler, MethodResponse};
pub use channel::{WebCryptoChannel, METHODS};
pub use error::{codes, ChannelError, ChannelResult};
pub use logging::{init_tracing, LogFormat};
pub use platform::platform_version;
pub use store::KeyStore;
pub use wire::{AlgorithmArg, AlgorithmDto, Bytes, KeyDescriptor, KeyPairDescriptor, NameRef};
