// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption for secret values.
//!
//! Each tenant gets its own AES-256-GCM key, derived from a master key with
//! HKDF-SHA256 and the tenant id in `info`. Derived keys are never stored;
//! they are recomputed per call and zeroized on drop.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{SecretsError, SecretsResult};
use crate::master_key::{MasterKey, MasterKeyring};
use crate::types::TenantId;

/// Size of derived tenant keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM IV in bytes.
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const HKDF_SALT: &[u8] = b"keyward/vault/hkdf-salt/v1";
const HKDF_INFO_PREFIX: &str = "keyward/tenant-secret/v1:";

/// Ciphertext with everything needed to decrypt it except the key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
	pub ciphertext: Vec<u8>,
	pub iv: [u8; IV_SIZE],
	pub tag: [u8; TAG_SIZE],
	/// Label of the master key the tenant key was derived from.
	pub key_version: String,
}

impl std::fmt::Debug for EncryptedBlob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EncryptedBlob")
			.field("ciphertext_len", &self.ciphertext.len())
			.field("key_version", &self.key_version)
			.finish()
	}
}

/// Derive the per-tenant data key from a master key.
pub fn derive_tenant_key(
	master: &MasterKey,
	tenant_id: &TenantId,
) -> SecretsResult<Zeroizing<[u8; KEY_SIZE]>> {
	let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master.as_bytes());
	let info = format!("{HKDF_INFO_PREFIX}{tenant_id}");

	let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
	hk.expand(info.as_bytes(), &mut okm[..])
		.map_err(|e| SecretsError::Encryption(format!("key derivation failed: {e}")))?;
	Ok(okm)
}

/// Generate a random IV.
///
/// 96-bit random IVs from OsRng; a (key, IV) pair must never repeat.
pub fn generate_iv() -> [u8; IV_SIZE] {
	let mut iv = [0u8; IV_SIZE];
	OsRng.fill_bytes(&mut iv);
	iv
}

/// Encrypt `plaintext` for `tenant_id` under the keyring's current key.
pub fn encrypt_for_tenant(
	keyring: &MasterKeyring,
	plaintext: &[u8],
	tenant_id: &TenantId,
) -> SecretsResult<EncryptedBlob> {
	let (master, key_version) = keyring.current()?;
	let tenant_key = derive_tenant_key(master, tenant_id)?;

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&tenant_key[..]));
	let iv = generate_iv();

	let mut sealed = cipher
		.encrypt(Nonce::from_slice(&iv), plaintext)
		.map_err(|e| SecretsError::Encryption(format!("secret encryption failed: {e}")))?;

	if sealed.len() < TAG_SIZE {
		return Err(SecretsError::Encryption(
			"cipher output shorter than tag".to_string(),
		));
	}
	let tag_bytes = sealed.split_off(sealed.len() - TAG_SIZE);
	let mut tag = [0u8; TAG_SIZE];
	tag.copy_from_slice(&tag_bytes);

	Ok(EncryptedBlob {
		ciphertext: sealed,
		iv,
		tag,
		key_version: key_version.to_string(),
	})
}

/// Decrypt a blob written by [`encrypt_for_tenant`] for the same tenant.
///
/// Wrong tenant, wrong key, or any tampering with ciphertext, IV or tag all
/// fail with [`SecretsError::Decryption`]. A missing key version fails with
/// [`SecretsError::UnknownKeyVersion`].
pub fn decrypt_for_tenant(
	keyring: &MasterKeyring,
	blob: &EncryptedBlob,
	tenant_id: &TenantId,
) -> SecretsResult<Zeroizing<Vec<u8>>> {
	let master = keyring.get(&blob.key_version)?;
	let tenant_key = derive_tenant_key(master, tenant_id)?;

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&tenant_key[..]));

	let mut sealed = Vec::with_capacity(blob.ciphertext.len() + TAG_SIZE);
	sealed.extend_from_slice(&blob.ciphertext);
	sealed.extend_from_slice(&blob.tag);

	let plaintext = cipher
		.decrypt(Nonce::from_slice(&blob.iv), sealed.as_slice())
		.map_err(|_| SecretsError::Decryption("authentication tag mismatch".to_string()))?;

	Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::master_key::MASTER_KEY_SIZE;
	use proptest::prelude::*;
	use std::collections::HashSet;

	fn keyring() -> MasterKeyring {
		MasterKeyring::new("v1", MasterKey::from_bytes([9u8; MASTER_KEY_SIZE])).unwrap()
	}

	fn tenant(id: &str) -> TenantId {
		TenantId::new(id).unwrap()
	}

	mod derivation {
		use super::*;

		#[test]
		fn same_inputs_same_key() {
			let master = MasterKey::from_bytes([9u8; MASTER_KEY_SIZE]);
			let a = derive_tenant_key(&master, &tenant("acme")).unwrap();
			let b = derive_tenant_key(&master, &tenant("acme")).unwrap();
			assert_eq!(a.as_slice(), b.as_slice());
		}

		#[test]
		fn tenants_get_distinct_keys() {
			let master = MasterKey::from_bytes([9u8; MASTER_KEY_SIZE]);
			let a = derive_tenant_key(&master, &tenant("acme")).unwrap();
			let b = derive_tenant_key(&master, &tenant("globex")).unwrap();
			assert_ne!(a.as_slice(), b.as_slice());
			assert_ne!(a.as_slice(), &[9u8; MASTER_KEY_SIZE]);
		}
	}

	mod round_trip {
		use super::*;

		#[test]
		fn decrypts_what_it_encrypts() {
			let ring = keyring();
			let blob = encrypt_for_tenant(&ring, b"sk_live_abc123", &tenant("acme")).unwrap();
			assert_eq!(blob.key_version, "v1");
			assert_ne!(blob.ciphertext.as_slice(), b"sk_live_abc123");
			assert_eq!(blob.ciphertext.len(), b"sk_live_abc123".len());

			let plain = decrypt_for_tenant(&ring, &blob, &tenant("acme")).unwrap();
			assert_eq!(plain.as_slice(), b"sk_live_abc123");
		}

		#[test]
		fn unconfigured_keyring_fails_fast() {
			let ring = MasterKeyring::empty();
			assert!(matches!(
				encrypt_for_tenant(&ring, b"x", &tenant("acme")),
				Err(SecretsError::MasterKeyNotConfigured)
			));
		}

		#[test]
		fn retired_key_still_decrypts() {
			let old = MasterKeyring::new("v1", MasterKey::from_bytes([1u8; MASTER_KEY_SIZE])).unwrap();
			let blob = encrypt_for_tenant(&old, b"legacy", &tenant("acme")).unwrap();

			let rotated = MasterKeyring::new("v2", MasterKey::from_bytes([2u8; MASTER_KEY_SIZE]))
				.unwrap()
				.with_retired("v1", MasterKey::from_bytes([1u8; MASTER_KEY_SIZE]))
				.unwrap();
			let plain = decrypt_for_tenant(&rotated, &blob, &tenant("acme")).unwrap();
			assert_eq!(plain.as_slice(), b"legacy");

			let fresh = encrypt_for_tenant(&rotated, b"new", &tenant("acme")).unwrap();
			assert_eq!(fresh.key_version, "v2");
		}

		#[test]
		fn missing_key_version_is_reported() {
			let blob = encrypt_for_tenant(&keyring(), b"x", &tenant("acme")).unwrap();
			let other = MasterKeyring::new("v2", MasterKey::from_bytes([2u8; MASTER_KEY_SIZE])).unwrap();
			assert!(matches!(
				decrypt_for_tenant(&other, &blob, &tenant("acme")),
				Err(SecretsError::UnknownKeyVersion(_))
			));
		}
	}

	mod tampering {
		use super::*;

		#[test]
		fn wrong_tenant_fails() {
			let ring = keyring();
			let blob = encrypt_for_tenant(&ring, b"secret", &tenant("acme")).unwrap();
			assert!(matches!(
				decrypt_for_tenant(&ring, &blob, &tenant("globex")),
				Err(SecretsError::Decryption(_))
			));
		}

		#[test]
		fn flipped_bits_fail() {
			let ring = keyring();
			let blob = encrypt_for_tenant(&ring, b"secret", &tenant("acme")).unwrap();

			let mut bad_ct = blob.clone();
			bad_ct.ciphertext[0] ^= 0x01;
			assert!(decrypt_for_tenant(&ring, &bad_ct, &tenant("acme")).is_err());

			let mut bad_tag = blob.clone();
			bad_tag.tag[15] ^= 0x80;
			assert!(decrypt_for_tenant(&ring, &bad_tag, &tenant("acme")).is_err());

			let mut bad_iv = blob;
			bad_iv.iv[0] ^= 0xff;
			assert!(matches!(
				decrypt_for_tenant(&ring, &bad_iv, &tenant("acme")),
				Err(SecretsError::Decryption(_))
			));
		}

		#[test]
		fn wrong_master_key_with_same_label_fails() {
			let blob = encrypt_for_tenant(&keyring(), b"secret", &tenant("acme")).unwrap();
			let impostor =
				MasterKeyring::new("v1", MasterKey::from_bytes([8u8; MASTER_KEY_SIZE])).unwrap();
			assert!(matches!(
				decrypt_for_tenant(&impostor, &blob, &tenant("acme")),
				Err(SecretsError::Decryption(_))
			));
		}

		#[test]
		fn debug_hides_ciphertext() {
			let blob = encrypt_for_tenant(&keyring(), b"secret", &tenant("acme")).unwrap();
			let debug = format!("{blob:?}");
			assert!(debug.contains("ciphertext_len"));
			assert!(!debug.contains("iv"));
		}
	}

	#[test]
	fn ivs_are_unique_across_many_encryptions() {
		let ring = keyring();
		let ivs: HashSet<[u8; IV_SIZE]> = (0..1000)
			.map(|_| encrypt_for_tenant(&ring, b"same", &tenant("acme")).unwrap().iv)
			.collect();
		assert_eq!(ivs.len(), 1000);
	}

	proptest! {
		#[test]
		fn round_trip_any_value(
			value in proptest::collection::vec(any::<u8>(), 1..2048),
			tenant_id in "[a-z0-9-]{1,32}",
		) {
			let ring = keyring();
			let tenant_id = tenant(&tenant_id);
			let blob = encrypt_for_tenant(&ring, &value, &tenant_id).unwrap();
			let plain = decrypt_for_tenant(&ring, &blob, &tenant_id).unwrap();
			prop_assert_eq!(plain.as_slice(), value.as_slice());
		}

		#[test]
		fn other_tenants_cannot_decrypt(
			value in proptest::collection::vec(any::<u8>(), 1..256),
			a in "[a-m]{1,16}",
			b in "[n-z]{1,16}",
		) {
			let ring = keyring();
			let blob = encrypt_for_tenant(&ring, &value, &tenant(&a)).unwrap();
			prop_assert!(decrypt_for_tenant(&ring, &blob, &tenant(&b)).is_err());
		}

		#[test]
		fn same_plaintext_never_repeats_ciphertext(value in proptest::collection::vec(any::<u8>(), 1..64)) {
			let ring = keyring();
			let a = encrypt_for_tenant(&ring, &value, &tenant("acme")).unwrap();
			let b = encrypt_for_tenant(&ring, &value, &tenant("acme")).unwrap();
			prop_assert_ne!(a.iv, b.iv);
			prop_assert_ne!(a.ciphertext, b.ciphertext);
		}
	}
}
