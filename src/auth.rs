//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Authorization seam: USER/PASS and APOP verification
//!
//! The server drives the APOP challenge (the timestamp banner in the
//! greeting) and forwards the client's digest to the [`Authorizer`]; it
//! never sees the shared secret. [`apop_verify`] is a helper for
//! implementing the digest comparison on the authorizer side.

use crate::error::{Pop3Error, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::fmt::Write as _;

/// Credential verification backend.
///
/// Either method may return [`Pop3Error::AuthMethodNotSupported`] to mark
/// that authentication method permanently disabled: the session then drops
/// the matching CAPA capability and, for APOP, the banner in the greeting.
/// Support is probed once per session with empty arguments; implementations
/// must treat a probe as a lookup only, never as an authentication attempt.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Verify a USER/PASS credential pair.
    async fn user_pass(&self, user: &str, pass: &str) -> Result<()>;

    /// Verify an APOP digest for `user` against the session's timestamp
    /// banner.
    async fn apop(&self, user: &str, banner: &str, digest: &str) -> Result<()>;
}

/// Check an APOP digest: MD5 over the banner concatenated with the shared
/// secret, compared byte-for-byte against the client's lowercase hex digest
/// (RFC 1939 §7).
pub fn apop_verify(banner: &str, digest: &str, password: &str) -> bool {
    let mut hasher = Md5::new();
    hasher.update(banner.as_bytes());
    hasher.update(password.as_bytes());
    let hash = hasher.finalize();

    let mut hex = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(hex, "{byte:02x}");
    }
    hex == digest
}

/// Authorizer that accepts any credentials. For demos and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn user_pass(&self, _user: &str, _pass: &str) -> Result<()> {
        Ok(())
    }

    async fn apop(&self, _user: &str, _banner: &str, _digest: &str) -> Result<()> {
        Ok(())
    }
}

/// Decorator that forwards USER/PASS and disables APOP.
///
/// Sessions built over this wrapper greet without a timestamp banner.
#[derive(Debug, Clone)]
pub struct UserPassOnly<A>(pub A);

#[async_trait]
impl<A: Authorizer> Authorizer for UserPassOnly<A> {
    async fn user_pass(&self, user: &str, pass: &str) -> Result<()> {
        self.0.user_pass(user, pass).await
    }

    async fn apop(&self, _user: &str, _banner: &str, _digest: &str) -> Result<()> {
        Err(Pop3Error::AuthMethodNotSupported)
    }
}

/// Decorator that forwards APOP and disables USER/PASS.
///
/// Sessions built over this wrapper omit `USER` from the CAPA response.
#[derive(Debug, Clone)]
pub struct ApopOnly<A>(pub A);

#[async_trait]
impl<A: Authorizer> Authorizer for ApopOnly<A> {
    async fn user_pass(&self, _user: &str, _pass: &str) -> Result<()> {
        Err(Pop3Error::AuthMethodNotSupported)
    }

    async fn apop(&self, user: &str, banner: &str, digest: &str) -> Result<()> {
        self.0.apop(user, banner, digest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from RFC 1939 §7.
    const BANNER: &str = "<1896.697170952@dbc.mtview.ca.us>";
    const SECRET: &str = "tanstaaf";
    const DIGEST: &str = "c4c9334bac560ecc979e58001b3e22fb";

    #[test]
    fn test_apop_verify_rfc_example() {
        assert!(apop_verify(BANNER, DIGEST, SECRET));
    }

    #[test]
    fn test_apop_verify_rejects_wrong_secret() {
        assert!(!apop_verify(BANNER, DIGEST, "wrong"));
    }

    #[test]
    fn test_apop_verify_is_case_sensitive() {
        assert!(!apop_verify(BANNER, &DIGEST.to_uppercase(), SECRET));
    }

    #[tokio::test]
    async fn test_user_pass_only_disables_apop() {
        let authorizer = UserPassOnly(AllowAllAuthorizer);
        assert!(authorizer.user_pass("u", "p").await.is_ok());
        assert!(matches!(
            authorizer.apop("u", "<b>", "d").await,
            Err(Pop3Error::AuthMethodNotSupported)
        ));
    }

    #[tokio::test]
    async fn test_apop_only_disables_user_pass() {
        let authorizer = ApopOnly(AllowAllAuthorizer);
        assert!(authorizer.apop("u", "<b>", "d").await.is_ok());
        assert!(matches!(
            authorizer.user_pass("u", "p").await,
            Err(Pop3Error::AuthMethodNotSupported)
        ));
    }
}
