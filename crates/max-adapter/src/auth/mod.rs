/*
[INPUT]:  API key pair and payloads to sign
[OUTPUT]: HMAC signatures and strictly increasing nonces
[POS]:    Auth layer - primitives shared by REST signing and stream auth
[UPDATE]: When auth primitives or credential handling change
*/

pub mod nonce;
pub mod signer;

pub use nonce::NonceGenerator;
pub use signer::{Credentials, sign_payload};
