use super::{Claims, Error};
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;
use tracing::trace;

pub const ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        }
    }
}

/// Why a token was turned away. Never leaves this module.
#[derive(Debug)]
enum Rejection {
    Format,
    Encoding,
    Json,
    Algorithm,
    NotYetValid,
    Expired,
    Signature,
}

/// Signs and verifies `HS256` session tokens.
///
/// The HMAC key is derived from the secret on first use and memoized; concurrent
/// first callers wait on the same initialization.
pub struct TokenCodec {
    secret: SecretString,
    key: OnceCell<HmacSha256>,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            key: OnceCell::new(),
        }
    }

    async fn key(&self) -> Result<&HmacSha256, Error> {
        self.key
            .get_or_try_init(|| async {
                let secret = self.secret.expose_secret();
                if secret.is_empty() {
                    return Err(Error::MissingSecret);
                }
                HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::MissingSecret)
            })
            .await
    }

    /// Initialize the key eagerly so a missing secret fails before serving traffic.
    ///
    /// # Errors
    /// Returns `Error::MissingSecret` if the secret is empty.
    pub async fn warm_up(&self) -> Result<(), Error> {
        self.key().await.map(|_| ())
    }

    /// Sign `claims`, stamping `exp = now + ttl` when a TTL is given.
    ///
    /// # Errors
    /// Returns an error if the secret is missing, the TTL overflows, or the claims
    /// cannot be encoded.
    pub async fn sign(&self, claims: &Claims, ttl: Option<Duration>) -> Result<String, Error> {
        self.sign_at(claims, ttl, unix_now()).await
    }

    /// Same as [`Self::sign`] with an explicit clock.
    ///
    /// # Errors
    /// See [`Self::sign`].
    pub async fn sign_at(
        &self,
        claims: &Claims,
        ttl: Option<Duration>,
        now_unix_seconds: i64,
    ) -> Result<String, Error> {
        let key = self.key().await?;

        let mut claims = claims.clone();
        if let Some(ttl) = ttl {
            let ttl = i64::try_from(ttl.as_secs()).map_err(|_| Error::InvalidTtl)?;
            claims.exp = Some(now_unix_seconds.checked_add(ttl).ok_or(Error::InvalidTtl)?);
        }

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = key.clone();
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return its claims.
    ///
    /// Every malformed, expired, not-yet-valid, wrongly-signed or foreign-algorithm
    /// token yields `Ok(None)`; the caller is not told which check failed.
    ///
    /// # Errors
    /// Returns `Error::MissingSecret` if the secret is not configured.
    pub async fn verify(&self, token: &str) -> Result<Option<Claims>, Error> {
        self.verify_at(token, unix_now()).await
    }

    /// Same as [`Self::verify`] with an explicit clock.
    ///
    /// # Errors
    /// See [`Self::verify`].
    pub async fn verify_at(
        &self,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<Option<Claims>, Error> {
        let key = self.key().await?;
        match decode_and_check(key, token, now_unix_seconds) {
            Ok(claims) => Ok(Some(claims)),
            Err(rejection) => {
                trace!(?rejection, "token rejected");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"***")
            .field("key_initialized", &self.key.initialized())
            .finish()
    }
}

fn decode_and_check(key: &HmacSha256, token: &str, now: i64) -> Result<Claims, Rejection> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Rejection::Format)?;
    let claims_b64 = parts.next().ok_or(Rejection::Format)?;
    let sig_b64 = parts.next().ok_or(Rejection::Format)?;
    if parts.next().is_some() {
        return Err(Rejection::Format);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(Rejection::Algorithm);
    }

    let claims: Claims = b64d_json(claims_b64)?;
    if claims.is_not_yet_valid(now) {
        return Err(Rejection::NotYetValid);
    }
    if claims.is_expired(now) {
        return Err(Rejection::Expired);
    }

    // The MAC covers the segments exactly as received, not a re-encoding of the claims.
    let signature = decode_segment(sig_b64).ok_or(Rejection::Encoding)?;
    let mut mac = key.clone();
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature).map_err(|_| Rejection::Signature)?;

    Ok(claims)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Rejection> {
    let bytes = decode_segment(segment).ok_or(Rejection::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|_| Rejection::Json)
}

/// Decode a base64url segment, restoring the standard alphabet and padding first.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let mut normalized: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let remainder = normalized.len() % 4;
    if remainder != 0 {
        normalized.push_str(&"=".repeat(4 - remainder));
    }
    Base64::decode_vec(&normalized).ok()
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use serde_json::json;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(SecretString::from(secret.to_string()))
    }

    fn forge(header: &serde_json::Value, claims: &serde_json::Value, secret: &str) -> Result<String> {
        let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(header)?);
        let claims_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims)?);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|err| anyhow!("hmac key: {err}"))?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        let sig = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        Ok(format!("{header_b64}.{claims_b64}.{sig}"))
    }

    #[tokio::test]
    async fn sign_then_verify_round_trips() -> Result<()> {
        let codec = codec("s3cr3t");
        let claims = Claims {
            user_id: Some("u1".to_string()),
            exp: Some(NOW + 3600),
            ..Claims::default()
        };

        let token = codec.sign_at(&claims, None, NOW).await?;
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));

        let verified = codec.verify_at(&token, NOW).await?;
        assert_eq!(verified, Some(claims));
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_is_invalid() -> Result<()> {
        let codec = codec("s3cr3t");
        let claims = Claims {
            user_id: Some("u1".to_string()),
            exp: Some(NOW - 1),
            ..Claims::default()
        };
        let token = codec.sign_at(&claims, None, NOW).await?;
        assert_eq!(codec.verify_at(&token, NOW).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn not_yet_valid_token_is_invalid() -> Result<()> {
        let codec = codec("s3cr3t");
        let claims = Claims {
            nbf: Some(NOW + 3600),
            ..Claims::for_user("u1")
        };
        let token = codec.sign_at(&claims, None, NOW).await?;
        assert_eq!(codec.verify_at(&token, NOW).await?, None);
        assert!(codec.verify_at(&token, NOW + 3600).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn unbounded_token_never_fails_on_time() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec.sign_at(&Claims::for_user("u1"), None, NOW).await?;
        assert!(codec.verify_at(&token, 0).await?.is_some());
        assert!(codec.verify_at(&token, i64::MAX).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn ttl_stamps_exp_without_iat() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec
            .sign_at(&Claims::for_user("u1"), Some(Duration::from_secs(3600)), NOW)
            .await?;
        let claims = codec
            .verify_at(&token, NOW)
            .await?
            .ok_or_else(|| anyhow!("expected valid token"))?;
        assert_eq!(claims.exp, Some(NOW + 3600));
        assert!(!claims.extra.contains_key("iat"));
        assert_eq!(codec.verify_at(&token, NOW + 3601).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn other_secret_rejects_token() -> Result<()> {
        let token = codec("s3cr3t")
            .sign_at(&Claims::for_user("u1"), None, NOW)
            .await?;
        assert_eq!(codec("other").verify_at(&token, NOW).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn any_signature_mutation_is_rejected() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec.sign_at(&Claims::for_user("u1"), None, NOW).await?;
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| anyhow!("token has no signature"))?;
        let mut raw = Base64UrlUnpadded::decode_vec(signature)
            .map_err(|err| anyhow!("signature decode: {err}"))?;

        for index in 0..raw.len() {
            raw[index] ^= 0x01;
            let tampered = format!(
                "{signing_input}.{}",
                Base64UrlUnpadded::encode_string(&raw)
            );
            assert_eq!(codec.verify_at(&tampered, NOW).await?, None);
            raw[index] ^= 0x01;
        }
        Ok(())
    }

    #[tokio::test]
    async fn foreign_algorithms_are_rejected() -> Result<()> {
        let codec = codec("s3cr3t");
        let claims = json!({"userId": "u1"});
        for alg in ["none", "RS256", "HS512", "hs256"] {
            let token = forge(&json!({"alg": alg, "typ": "JWT"}), &claims, "s3cr3t")?;
            assert_eq!(codec.verify_at(&token, NOW).await?, None, "alg {alg}");
        }

        let token = forge(&json!({"alg": "HS256"}), &claims, "s3cr3t")?;
        assert!(codec.verify_at(&token, NOW).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_tokens_are_rejected() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec.sign_at(&Claims::for_user("u1"), None, NOW).await?;
        let mut segments = token.split('.');
        let header = segments.next().unwrap_or_default();
        let payload = segments.next().unwrap_or_default();

        let cases = [
            String::new(),
            "a.b".to_string(),
            format!("{token}.extra"),
            format!("{header}.{payload}"),
            format!("!!!.{payload}.sig"),
            format!("{header}.bm90LWpzb24.sig"),
        ];
        for case in cases {
            assert_eq!(codec.verify_at(&case, NOW).await?, None, "case {case}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn signature_covers_segments_as_received() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec.sign_at(&Claims::for_user("u1"), None, NOW).await?;
        let mut segments = token.split('.');
        let header = segments.next().unwrap_or_default();
        let _payload = segments.next();
        let signature = segments.next().unwrap_or_default();

        // Same claims, different bytes on the wire.
        let reencoded = Base64UrlUnpadded::encode_string(br#"{ "userId": "u1", "sub": "u1" }"#);
        let spliced = format!("{header}.{reencoded}.{signature}");
        assert_eq!(codec.verify_at(&spliced, NOW).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn padded_segments_are_accepted() -> Result<()> {
        let codec = codec("s3cr3t");
        let token = codec.sign_at(&Claims::for_user("u1"), None, NOW).await?;
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| anyhow!("token has no signature"))?;
        let padding = (4 - signature.len() % 4) % 4;
        let padded = format!("{signing_input}.{signature}{}", "=".repeat(padding));
        assert!(codec.verify_at(&padded, NOW).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn missing_secret_fails_at_first_use() {
        let codec = TokenCodec::new(SecretString::default());
        assert!(matches!(codec.warm_up().await, Err(Error::MissingSecret)));
        assert!(matches!(
            codec.sign(&Claims::for_user("u1"), None).await,
            Err(Error::MissingSecret)
        ));
        assert!(matches!(
            codec.verify("a.b.c").await,
            Err(Error::MissingSecret)
        ));
    }

    #[tokio::test]
    async fn concurrent_first_use_shares_one_key() -> Result<()> {
        let codec = Arc::new(codec("s3cr3t"));
        let mut handles = Vec::new();
        for index in 0..16 {
            let codec = Arc::clone(&codec);
            handles.push(tokio::spawn(async move {
                let claims = Claims::for_user(&format!("u{index}"));
                let token = codec.sign_at(&claims, None, NOW).await?;
                codec.verify_at(&token, NOW).await
            }));
        }
        for handle in handles {
            assert!(handle.await??.is_some());
        }
        assert!(codec.key.initialized());
        Ok(())
    }

    #[test]
    fn decode_segment_restores_alphabet_and_padding() {
        assert_eq!(decode_segment("_-8"), Some(vec![0xff, 0xef]));
        assert_eq!(decode_segment("YQ"), Some(b"a".to_vec()));
        assert_eq!(decode_segment("YQ=="), Some(b"a".to_vec()));
        assert_eq!(decode_segment("Y"), None);
    }
}
