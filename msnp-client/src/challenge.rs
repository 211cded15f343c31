//! The `CHL`/`QRY` challenge-response.
//!
//! The server periodically issues a nonce; the client must answer with
//! MD5(nonce + product key) as lowercase hex within the deadline or be
//! disconnected. Client id and product key are protocol constants.

/// The client id submitted in `QRY`.
pub(crate) const PRODUCT_ID: &str = "msmsgs@msnmsgr.com";

/// The well-known product key salted into the hash.
const PRODUCT_KEY: &str = "Q1P7W2E4J9R8U3S5";

/// Compute the 32-character lowercase hex digest for `challenge`.
pub(crate) fn respond(challenge: &str) -> String {
    let digest = md5::compute(format!("{challenge}{PRODUCT_KEY}"));

    format!("{digest:x}")
}
