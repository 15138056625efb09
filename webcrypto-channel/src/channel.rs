//! The method channel: JSON calls in, engine operations, JSON results out.
//!
//! Engine work runs on tokio's blocking pool.

use crate::api::{MethodCall, MethodHandler, MethodResponse};
use crate::error::{ChannelError, ChannelResult};
use crate::platform::platform_version;
use crate::store::KeyStore;
use crate::wire::{AlgorithmArg, Bytes, KeyDescriptor, KeyPairDescriptor, NameRef};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use webcrypto::{
    CryptoEngine, CryptoKey, CryptoResult, JsonWebKey, KeyData, KeyFormat, KeyUsages, OperationRequest, OperationResult,
};

/// Every method the channel answers.
pub const METHODS: [&str; 16] = [
    "getPlatformVersion",
    "digest",
    "getRandomValues",
    "randomUUID",
    "generateKey",
    "importKey",
    "exportKey",
    "encrypt",
    "decrypt",
    "sign",
    "verify",
    "deriveBits",
    "deriveKey",
    "wrapKey",
    "unwrapKey",
    "releaseKey",
];

#[derive(Deserialize)]
struct DigestArgs {
    algorithm: NameRef,
    data: Bytes,
}

#[derive(Deserialize)]
struct RandomArgs {
    length: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateKeyArgs {
    algorithm: AlgorithmArg,
    #[serde(default)]
    extractable: bool,
    key_usages: KeyUsages,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportKeyArgs {
    format: KeyFormat,
    key_data: Value,
    algorithm: AlgorithmArg,
    #[serde(default)]
    extractable: bool,
    key_usages: KeyUsages,
}

#[derive(Deserialize)]
struct ExportKeyArgs {
    format: KeyFormat,
    key: Uuid,
}

#[derive(Deserialize)]
struct CipherArgs {
    algorithm: AlgorithmArg,
    key: Uuid,
    data: Bytes,
}

#[derive(Deserialize)]
struct VerifyArgs {
    algorithm: AlgorithmArg,
    key: Uuid,
    signature: Bytes,
    data: Bytes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeriveBitsArgs {
    algorithm: AlgorithmArg,
    base_key: Uuid,
    length: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeriveKeyArgs {
    algorithm: AlgorithmArg,
    base_key: Uuid,
    derived_key_type: AlgorithmArg,
    #[serde(default)]
    extractable: bool,
    key_usages: KeyUsages,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrapKeyArgs {
    format: KeyFormat,
    key: Uuid,
    wrapping_key: Uuid,
    wrap_algorithm: AlgorithmArg,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnwrapKeyArgs {
    format: KeyFormat,
    wrapped_key: Bytes,
    unwrapping_key: Uuid,
    unwrap_algorithm: AlgorithmArg,
    unwrapped_key_algorithm: AlgorithmArg,
    #[serde(default)]
    extractable: bool,
    key_usages: KeyUsages,
}

#[derive(Deserialize)]
struct ReleaseKeyArgs {
    key: Uuid,
}

fn parse<T: DeserializeOwned>(arguments: Value) -> ChannelResult<T> {
    Ok(serde_json::from_value(arguments)?)
}

fn bytes_value(bytes: Vec<u8>) -> ChannelResult<Value> {
    Ok(serde_json::to_value(Bytes(bytes))?)
}

fn key_data_from_wire(format: KeyFormat, value: Value) -> ChannelResult<KeyData> {
    match format {
        KeyFormat::Jwk => Ok(KeyData::Jwk(serde_json::from_value::<JsonWebKey>(value)?)),
        _ => Ok(KeyData::Bytes(serde_json::from_value::<Bytes>(value)?.into_inner())),
    }
}

fn key_data_to_wire(data: KeyData) -> ChannelResult<Value> {
    match data {
        KeyData::Jwk(jwk) => Ok(serde_json::to_value(jwk)?),
        KeyData::Bytes(bytes) => bytes_value(bytes),
    }
}

/// Method-channel front end for a [`CryptoEngine`].
#[derive(Debug, Clone)]
pub struct WebCryptoChannel {
    engine: Arc<CryptoEngine>,
    keys: Arc<KeyStore>,
}

impl Default for WebCryptoChannel {
    fn default() -> Self {
        Self::new(CryptoEngine::default())
    }
}

impl WebCryptoChannel {
    pub fn new(engine: CryptoEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            keys: Arc::new(KeyStore::new()),
        }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Answer one method call.
    ///
    /// # Errors
    ///
    /// `UnknownMethod` for names outside [`METHODS`], `BadArguments` when the
    /// arguments do not deserialize, otherwise whatever the engine reports.
    pub async fn dispatch(&self, method: &str, arguments: Value) -> ChannelResult<Value> {
        match method {
            "getPlatformVersion" => Ok(Value::String(platform_version())),
            "randomUUID" => Ok(Value::String(self.engine.random_uuid())),
            "getRandomValues" => {
                let args: RandomArgs = parse(arguments)?;
                bytes_value(self.engine.get_random_values(args.length)?)
            }
            "releaseKey" => {
                let args: ReleaseKeyArgs = parse(arguments)?;
                Ok(Value::Bool(self.keys.release(&args.key)))
            }
            "digest" => {
                let DigestArgs { algorithm, data } = parse(arguments)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::Digest {
                        algorithm: algorithm.name(),
                        data: &data.0,
                    })
                })
                .await
            }
            "generateKey" => {
                let args: GenerateKeyArgs = parse(arguments)?;
                let params = args.algorithm.into_dto().key_gen_params()?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::GenerateKey {
                        params,
                        extractable: args.extractable,
                        usages: args.key_usages,
                    })
                })
                .await
            }
            "importKey" => {
                let args: ImportKeyArgs = parse(arguments)?;
                let params = args.algorithm.into_dto().import_params()?;
                let data = key_data_from_wire(args.format, args.key_data)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::ImportKey {
                        format: args.format,
                        data,
                        params,
                        extractable: args.extractable,
                        usages: args.key_usages,
                    })
                })
                .await
            }
            "exportKey" => {
                let args: ExportKeyArgs = parse(arguments)?;
                let key = self.keys.get(&args.key)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::ExportKey {
                        format: args.format,
                        key: &key,
                    })
                })
                .await
            }
            "encrypt" | "decrypt" => {
                let args: CipherArgs = parse(arguments)?;
                let params = args.algorithm.into_dto().cipher_params()?;
                let key = self.keys.get(&args.key)?;
                let encrypt = method == "encrypt";
                self.run(move |engine| {
                    let (key, data) = (&*key, args.data.0.as_slice());
                    engine.execute(if encrypt {
                        OperationRequest::Encrypt { params, key, data }
                    } else {
                        OperationRequest::Decrypt { params, key, data }
                    })
                })
                .await
            }
            "sign" => {
                let args: CipherArgs = parse(arguments)?;
                let params = args.algorithm.into_dto().sign_params()?;
                let key = self.keys.get(&args.key)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::Sign {
                        params,
                        key: &key,
                        data: &args.data.0,
                    })
                })
                .await
            }
            "verify" => {
                let args: VerifyArgs = parse(arguments)?;
                let params = args.algorithm.into_dto().sign_params()?;
                let key = self.keys.get(&args.key)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::Verify {
                        params,
                        key: &key,
                        data: &args.data.0,
                        signature: &args.signature.0,
                    })
                })
                .await
            }
            "deriveBits" => {
                let args: DeriveBitsArgs = parse(arguments)?;
                let dto = args.algorithm.into_dto();
                let peer = self.peer(dto.public)?;
                let base = self.keys.get(&args.base_key)?;
                self.run_checked(move |engine| {
                    let params = dto.derive_params(peer.as_deref())?;
                    Ok(engine.execute(OperationRequest::DeriveBits {
                        params,
                        key: &base,
                        length: args.length,
                        abort: None,
                    })?)
                })
                .await
            }
            "deriveKey" => {
                let args: DeriveKeyArgs = parse(arguments)?;
                let dto = args.algorithm.into_dto();
                let derived = args.derived_key_type.into_dto().derived_key_params()?;
                let peer = self.peer(dto.public)?;
                let base = self.keys.get(&args.base_key)?;
                self.run_checked(move |engine| {
                    let params = dto.derive_params(peer.as_deref())?;
                    Ok(engine.execute(OperationRequest::DeriveKey {
                        params,
                        key: &base,
                        derived,
                        extractable: args.extractable,
                        usages: args.key_usages,
                        abort: None,
                    })?)
                })
                .await
            }
            "wrapKey" => {
                let args: WrapKeyArgs = parse(arguments)?;
                let params = args.wrap_algorithm.into_dto().wrap_params()?;
                let key = self.keys.get(&args.key)?;
                let wrapping_key = self.keys.get(&args.wrapping_key)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::WrapKey {
                        format: args.format,
                        key: &key,
                        wrapping_key: &wrapping_key,
                        params,
                    })
                })
                .await
            }
            "unwrapKey" => {
                let args: UnwrapKeyArgs = parse(arguments)?;
                let params = args.unwrap_algorithm.into_dto().wrap_params()?;
                let import_params = args.unwrapped_key_algorithm.into_dto().import_params()?;
                let unwrapping_key = self.keys.get(&args.unwrapping_key)?;
                self.run(move |engine| {
                    engine.execute(OperationRequest::UnwrapKey {
                        format: args.format,
                        wrapped: &args.wrapped_key.0,
                        unwrapping_key: &unwrapping_key,
                        params,
                        import_params,
                        extractable: args.extractable,
                        usages: args.key_usages,
                    })
                })
                .await
            }
            other => Err(ChannelError::UnknownMethod(other.to_string())),
        }
    }

    /// Run one engine request on the blocking pool and encode its result.
    async fn run<F>(&self, request: F) -> ChannelResult<Value>
    where
        F: FnOnce(&CryptoEngine) -> CryptoResult<OperationResult> + Send + 'static,
    {
        self.run_checked(move |engine| Ok(request(engine)?)).await
    }

    /// Like [`Self::run`], for requests whose arguments can still fail to
    /// convert once the keys are in hand.
    async fn run_checked<F>(&self, request: F) -> ChannelResult<Value>
    where
        F: FnOnce(&CryptoEngine) -> ChannelResult<OperationResult> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || request(&engine))
            .await
            .map_err(|e| ChannelError::Internal(format!("engine task failed: {e}")))??;
        self.reply(result)
    }

    fn reply(&self, result: OperationResult) -> ChannelResult<Value> {
        match result {
            OperationResult::Bytes(bytes) => bytes_value(bytes),
            OperationResult::Exported(data) => key_data_to_wire(data),
            OperationResult::Verified(valid) => Ok(Value::Bool(valid)),
            OperationResult::Key(key) => {
                let mut descriptor = KeyDescriptor::new(Uuid::nil(), &key);
                descriptor.handle = self.keys.insert(key);
                Ok(serde_json::to_value(descriptor)?)
            }
            OperationResult::KeyPair(pair) => {
                let mut descriptor = KeyPairDescriptor::new(Uuid::nil(), Uuid::nil(), &pair);
                descriptor.public_key.handle = self.keys.insert(pair.public_key);
                descriptor.private_key.handle = self.keys.insert(pair.private_key);
                Ok(serde_json::to_value(descriptor)?)
            }
        }
    }

    fn peer(&self, handle: Option<Uuid>) -> ChannelResult<Option<Arc<CryptoKey>>> {
        handle.map(|h| self.keys.get(&h)).transpose()
    }
}

#[async_trait]
impl MethodHandler for WebCryptoChannel {
    async fn handle(&self, call: MethodCall) -> MethodResponse {
        debug!(method = %call.method, "method call");
        match self.dispatch(&call.method, call.arguments).await {
            Ok(result) => MethodResponse::success(call.id, result),
            Err(err) => {
                warn!(method = %call.method, code = err.code(), "method call failed");
                MethodResponse::failure(call.id, &err)
            }
        }
    }
}
