use crate::errors::LogfileError;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session tokens scoping a request to a customer.
/// Stands in for the original service's cluster-wide session auth; a real
/// deployment would delegate to a dedicated auth service instead.
#[async_trait]
pub trait Auth: Send + Sync {
	fn sign(&self, customer: &str) -> String;
	fn verify(&self, token: &str) -> Result<String, LogfileError>;
}

pub struct HmacAuth {
	secret: Vec<u8>,
}

impl HmacAuth {
	pub fn new(secret: impl Into<Vec<u8>>) -> Self {
		Self {
			secret: secret.into(),
		}
	}

	fn mac(&self, customer: &str) -> Vec<u8> {
		let mut mac = HmacSha256::new_from_slice(&self.secret)
			.expect("HMAC accepts a key of any length");
		mac.update(customer.as_bytes());
		mac.finalize().into_bytes().to_vec()
	}
}

impl Auth for HmacAuth {
	fn sign(&self, customer: &str) -> String {
		let sig = URL_SAFE_NO_PAD.encode(self.mac(customer));
		let payload = URL_SAFE_NO_PAD.encode(customer.as_bytes());
		format!("{payload}.{sig}")
	}

	fn verify(&self, token: &str) -> Result<String, LogfileError> {
		let (payload, sig) = token.split_once('.').ok_or_else(|| {
			LogfileError::Unauthorized("malformed token".into())
		})?;
		let customer_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| {
			LogfileError::Unauthorized("malformed token payload".into())
		})?;
		let customer = String::from_utf8(customer_bytes).map_err(|_| {
			LogfileError::Unauthorized("malformed token payload".into())
		})?;
		let expected = URL_SAFE_NO_PAD.encode(self.mac(&customer));
		if expected != sig {
			return Err(LogfileError::Unauthorized(
				"signature mismatch".into(),
			));
		}
		Ok(customer)
	}
}
