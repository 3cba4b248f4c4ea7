use crate::{error::AppError, schemas::UserId};
use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::future::{ready, Ready};
use std::num::ParseIntError;

type HmacSha256 = Hmac<Sha256>;

/// Key material for verifying caller tokens, registered as app data.
#[derive(Clone)]
pub struct AuthSecret(String);

impl AuthSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        AuthSecret(secret.into())
    }

    fn mac(&self, user_id: UserId) -> HmacSha256 {
        let mut sha256_hasher = Sha256::new();
        sha256_hasher.update(self.0.as_bytes());
        let key = sha256_hasher.finalize();

        // HMAC accepts keys of any length.
        let mut hmac_hasher = HmacSha256::new_from_slice(&key).expect("HMAC takes any key size");
        hmac_hasher.update(format!("id={}", user_id).as_bytes());
        hmac_hasher
    }

    /// Hex signature the login flow attaches to `user_id`.
    pub fn sign(&self, user_id: UserId) -> String {
        self.mac(user_id)
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Parses `<userId>.<hex signature>` and checks the signature.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let (id, signature) = token.split_once('.')?;
        let user_id = id.parse::<UserId>().ok()?;
        let signature = decode_hex(signature).ok()?;
        self.mac(user_id).verify_slice(&signature).ok()?;
        Some(user_id)
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, ParseIntError> {
    hex.chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect()
}

/// The authenticated user behind the current request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
}

fn authenticate(request: &HttpRequest) -> Result<Caller, AppError> {
    let unauthorized = || AppError::Unauthorized("Authentification requise".to_string());
    let secret = request
        .app_data::<web::Data<AuthSecret>>()
        .ok_or_else(unauthorized)?;
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .ok_or_else(unauthorized)?;
    let token = authorization
        .strip_prefix("Bearer ")
        .unwrap_or(authorization)
        .trim();
    secret
        .verify(token)
        .map(|user_id| Caller { user_id })
        .ok_or_else(|| AppError::Unauthorized("Jeton invalide".to_string()))
}

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
