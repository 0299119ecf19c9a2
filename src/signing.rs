//! Signing identity: signer sets, rotation history and capability checks.
//!
//! A package signed by a single signer may carry a chain of past signing
//! certificates, oldest first, whose last entry is the current signer. Each
//! past entry records the capabilities it retains; the current signer holds
//! all of them implicitly.

use crate::error::ParseResult;
use crate::flags::CertCapabilities;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// One signing certificate (DER bytes) plus its recorded capabilities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
    flags: CertCapabilities,
}

impl Signature {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Signature {
            bytes: bytes.into(),
            flags: CertCapabilities::empty(),
        }
    }

    /// Parses the hex form produced by [`Signature::to_chars_string`].
    pub fn from_hex(text: &str) -> ParseResult<Self> {
        hex::decode(text)
            .map(Signature::new)
            .map_err(|e| err!(CertificateEncoding, "Bad signature encoding: {}", e))
    }

    pub fn with_flags(mut self, flags: CertCapabilities) -> Self {
        self.flags = flags;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn flags(&self) -> CertCapabilities {
        self.flags
    }

    pub fn to_chars_string(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn sha256_digest(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&self.bytes));
        out
    }

    /// Same certificate, ignoring capability flags.
    pub fn same_certificate(&self, other: &Signature) -> bool {
        self.bytes == other.bytes
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.sha256_digest()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum SignatureSchemeVersion {
    #[default]
    Unknown = 0,
    Jar = 1,
    SigningBlockV2 = 2,
    SigningBlockV3 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Dsa,
}

impl KeyAlgorithm {
    /// Trial order for keys of unknown algorithm.
    pub const DECODE_ORDER: [KeyAlgorithm; 3] = [KeyAlgorithm::Rsa, KeyAlgorithm::Ec, KeyAlgorithm::Dsa];

    /// DER content bytes of the algorithm's SubjectPublicKeyInfo OID.
    pub fn oid(self) -> &'static [u8] {
        match self {
            KeyAlgorithm::Rsa => &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01],
            KeyAlgorithm::Ec => &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01],
            KeyAlgorithm::Dsa => &[0x2a, 0x86, 0x48, 0xce, 0x38, 0x04, 0x01],
        }
    }
}

/// A decoded public key in X.509 SubjectPublicKeyInfo encoding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    pub algorithm: KeyAlgorithm,
    pub encoded: Vec<u8>,
}

/// Verified signer identity of a package file.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SigningDetails {
    signatures: Option<Vec<Signature>>,
    scheme_version: SignatureSchemeVersion,
    public_keys: Vec<PublicKey>,
    past_signing_certificates: Option<Vec<Signature>>,
}

impl SigningDetails {
    /// Not yet verified. Every identity check against it fails.
    pub const UNKNOWN: SigningDetails = SigningDetails {
        signatures: None,
        scheme_version: SignatureSchemeVersion::Unknown,
        public_keys: Vec::new(),
        past_signing_certificates: None,
    };

    pub fn builder() -> SigningDetailsBuilder {
        SigningDetailsBuilder::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.signatures.is_none()
    }

    pub fn signatures(&self) -> &[Signature] {
        self.signatures.as_deref().unwrap_or(&[])
    }

    pub fn scheme_version(&self) -> SignatureSchemeVersion {
        self.scheme_version
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn past_signing_certificates(&self) -> &[Signature] {
        self.past_signing_certificates.as_deref().unwrap_or(&[])
    }

    pub fn has_signatures(&self) -> bool {
        !self.signatures().is_empty()
    }

    pub fn has_past_signing_certificates(&self) -> bool {
        !self.past_signing_certificates().is_empty()
    }

    /// Past entries excluding the trailing current signer.
    fn ancestors(&self) -> &[Signature] {
        let past = self.past_signing_certificates();
        &past[..past.len().saturating_sub(1)]
    }

    fn has_certificate_internal(&self, cert: &Signature, flags: CertCapabilities) -> bool {
        if self.is_unknown() {
            return false;
        }
        let in_history = self
            .ancestors()
            .iter()
            .any(|past| past.same_certificate(cert) && past.flags.contains(flags));
        if in_history {
            return true;
        }
        matches!(self.signatures(), [only] if only.same_certificate(cert))
    }

    /// Whether `cert` is the current signer or any ancestor in its history.
    pub fn has_certificate(&self, cert: &Signature) -> bool {
        self.has_certificate_internal(cert, CertCapabilities::empty())
    }

    /// Whether `cert` is the current signer, or an ancestor still holding `flags`.
    pub fn has_certificate_with_capability(
        &self,
        cert: &Signature,
        flags: CertCapabilities,
    ) -> bool {
        self.has_certificate_internal(cert, flags)
    }

    fn has_sha256_internal(&self, digest: &[u8], flags: CertCapabilities) -> bool {
        if self.is_unknown() {
            return false;
        }
        let in_history = self
            .ancestors()
            .iter()
            .any(|past| past.sha256_digest() == digest && past.flags.contains(flags));
        if in_history {
            return true;
        }
        matches!(self.signatures(), [only] if only.sha256_digest() == digest)
    }

    pub fn has_sha256_certificate(&self, digest: &[u8]) -> bool {
        self.has_sha256_internal(digest, CertCapabilities::empty())
    }

    /// Capability check keyed by a certificate's SHA-256 digest.
    pub fn check_capability_sha256(&self, digest: &[u8], flags: CertCapabilities) -> bool {
        self.has_sha256_internal(digest, flags)
    }

    /// Whether `old` is this package's signer or one of its ancestors.
    ///
    /// Multi-signer identities have no history and must match exactly.
    pub fn has_ancestor_or_self(&self, old: &SigningDetails) -> bool {
        if self.is_unknown() || old.is_unknown() {
            return false;
        }
        match old.signatures() {
            [single] => self.has_certificate(single),
            _ => self.signatures_match_exactly(old),
        }
    }

    /// Whether `old` is a strict ancestor of the current signer.
    pub fn has_ancestor(&self, old: &SigningDetails) -> bool {
        if self.is_unknown() || old.is_unknown() {
            return false;
        }
        match old.signatures() {
            [single] if self.has_past_signing_certificates() => self
                .ancestors()
                .iter()
                .any(|past| past.same_certificate(single)),
            _ => false,
        }
    }

    /// Whether `old` is trusted by this identity with at least `flags`.
    pub fn check_capability(&self, old: &SigningDetails, flags: CertCapabilities) -> bool {
        if self.is_unknown() || old.is_unknown() {
            return false;
        }
        match old.signatures() {
            [single] => self.has_certificate_internal(single, flags),
            _ => self.signatures_match_exactly(old),
        }
    }

    /// Like [`check_capability`](Self::check_capability), but requires an
    /// exact flag match on the historical entry (used to recover from a
    /// capability being revoked).
    pub fn check_capability_recover(&self, old: &SigningDetails, flags: CertCapabilities) -> bool {
        if self.is_unknown() || old.is_unknown() {
            return false;
        }
        match old.signatures() {
            [single] if self.has_past_signing_certificates() => self
                .past_signing_certificates()
                .iter()
                .any(|past| past.same_certificate(single) && past.flags == flags),
            _ => self.signatures_match_exactly(old),
        }
    }

    /// Set equality of the current signers.
    pub fn signatures_match_exactly(&self, other: &SigningDetails) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return false;
        }
        let mut mine: Vec<&[u8]> = self.signatures().iter().map(|s| s.bytes()).collect();
        let mut theirs: Vec<&[u8]> = other.signatures().iter().map(|s| s.bytes()).collect();
        mine.sort_unstable();
        mine.dedup();
        theirs.sort_unstable();
        theirs.dedup();
        mine == theirs
    }
}

/// Builds [`SigningDetails`], enforcing that rotation history only appears
/// with exactly one current signer.
#[derive(Clone, Debug, Default)]
pub struct SigningDetailsBuilder {
    signatures: Vec<Signature>,
    scheme_version: SignatureSchemeVersion,
    public_keys: Vec<PublicKey>,
    past_signing_certificates: Vec<Signature>,
}

impl SigningDetailsBuilder {
    pub fn signatures(mut self, signatures: Vec<Signature>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn scheme_version(mut self, version: SignatureSchemeVersion) -> Self {
        self.scheme_version = version;
        self
    }

    pub fn public_keys(mut self, keys: Vec<PublicKey>) -> Self {
        self.public_keys = keys;
        self
    }

    pub fn past_signing_certificates(mut self, past: Vec<Signature>) -> Self {
        self.past_signing_certificates = past;
        self
    }

    pub fn build(self) -> ParseResult<SigningDetails> {
        if self.signatures.is_empty() {
            fail!(NoCertificates, "Signing details require at least one signature");
        }
        if !self.past_signing_certificates.is_empty() {
            if self.signatures.len() != 1 {
                fail!(
                    CertificateEncoding,
                    "Signing certificate history is only allowed with a single signer, found {}",
                    self.signatures.len()
                );
            }
            let current = &self.signatures[0];
            let last_matches = self
                .past_signing_certificates
                .last()
                .map_or(false, |last| last.same_certificate(current));
            if !last_matches {
                fail!(
                    CertificateEncoding,
                    "Signing certificate history must end with the current signer"
                );
            }
        }
        Ok(SigningDetails {
            signatures: Some(self.signatures),
            scheme_version: self.scheme_version,
            public_keys: self.public_keys,
            past_signing_certificates: if self.past_signing_certificates.is_empty() {
                None
            } else {
                Some(self.past_signing_certificates)
            },
        })
    }
}

/// Key decoding and signature verification primitives.
pub trait CryptoProvider {
    /// Decodes SubjectPublicKeyInfo bytes as a key of `algorithm`.
    fn decode_public_key(&self, algorithm: KeyAlgorithm, der: &[u8]) -> Option<PublicKey> {
        let oid = spki_algorithm_oid(der)?;
        if oid == algorithm.oid() {
            Some(PublicKey {
                algorithm,
                encoded: der.to_vec(),
            })
        } else {
            None
        }
    }

    /// Verifies every signature of the file at `path`.
    fn verify_signatures(
        &self,
        path: &Path,
        min_scheme: SignatureSchemeVersion,
    ) -> ParseResult<SigningDetails>;

    /// Reads signer certificates without verifying file contents, for files
    /// from trusted system locations.
    fn certificates_without_verification(
        &self,
        path: &Path,
        min_scheme: SignatureSchemeVersion,
    ) -> ParseResult<SigningDetails> {
        self.verify_signatures(path, min_scheme)
    }
}

/// A provider that can decode keys but verifies nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyDecoderOnly;

impl CryptoProvider for KeyDecoderOnly {
    fn verify_signatures(
        &self,
        path: &Path,
        _min_scheme: SignatureSchemeVersion,
    ) -> ParseResult<SigningDetails> {
        Err(err!(
            NoCertificates,
            "No signature verifier available for {}",
            path.display()
        ))
    }
}

/// Decodes a base64 public key, trying RSA, then EC, then DSA.
pub fn parse_public_key(crypto: &dyn CryptoProvider, encoded: &str) -> Option<PublicKey> {
    let der = match STANDARD.decode(encoded.trim()) {
        Ok(der) => der,
        Err(e) => {
            log::warn!("Could not parse public key: {}", e);
            return None;
        }
    };
    let key = KeyAlgorithm::DECODE_ORDER
        .iter()
        .find_map(|algorithm| crypto.decode_public_key(*algorithm, &der));
    if key.is_none() {
        log::warn!("Could not parse public key: unsupported key algorithm");
    }
    key
}

fn der_length(input: &[u8]) -> IResult<&[u8], usize> {
    let (input, first) = be_u8(input)?;
    if first & 0x80 == 0 {
        return Ok((input, first as usize));
    }
    let count = (first & 0x7f) as usize;
    if count == 0 || count > 4 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    let (input, bytes) = take(count)(input)?;
    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((input, len))
}

/// One DER TLV with the expected tag; returns its contents.
fn der_tlv(tag: u8, input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, found) = be_u8(input)?;
    if found != tag {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (input, len) = der_length(input)?;
    take(len)(input)
}

const DER_SEQUENCE: u8 = 0x30;
const DER_OID: u8 = 0x06;

/// Algorithm OID of a SubjectPublicKeyInfo structure.
fn spki_algorithm_oid(der: &[u8]) -> Option<&[u8]> {
    let (_, spki) = der_tlv(DER_SEQUENCE, der).ok()?;
    let (_, algorithm) = der_tlv(DER_SEQUENCE, spki).ok()?;
    let (_, oid) = der_tlv(DER_OID, algorithm).ok()?;
    Some(oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(b: u8) -> Signature {
        Signature::new(vec![b; 4])
    }

    fn single(s: Signature) -> SigningDetails {
        SigningDetails::builder()
            .signatures(vec![s])
            .scheme_version(SignatureSchemeVersion::SigningBlockV3)
            .build()
            .unwrap()
    }

    fn rotated() -> SigningDetails {
        SigningDetails::builder()
            .signatures(vec![sig(2)])
            .scheme_version(SignatureSchemeVersion::SigningBlockV3)
            .past_signing_certificates(vec![
                sig(1).with_flags(CertCapabilities::INSTALLED_DATA | CertCapabilities::PERMISSION),
                sig(2),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn rotation_history_grants_ancestry() {
        let details = rotated();
        assert!(details.has_certificate(&sig(1)));
        assert!(details.has_certificate(&sig(2)));
        assert!(!details.has_certificate(&sig(3)));
        assert!(details.has_ancestor_or_self(&single(sig(1))));
        assert!(details.has_ancestor_or_self(&single(sig(2))));
        assert!(details.has_ancestor(&single(sig(1))));
        assert!(!details.has_ancestor(&single(sig(2))));
        assert!(!details.has_ancestor_or_self(&SigningDetails::UNKNOWN));
    }

    #[test]
    fn unknown_never_matches() {
        let unknown = SigningDetails::UNKNOWN;
        assert!(!unknown.has_ancestor_or_self(&unknown));
        assert!(!unknown.signatures_match_exactly(&unknown));
        assert!(!unknown.check_capability(&unknown, CertCapabilities::empty()));
        assert!(!unknown.has_certificate(&sig(1)));
        assert!(!rotated().check_capability(&unknown, CertCapabilities::empty()));
    }

    #[test]
    fn capabilities_are_subset_checked() {
        let details = rotated();
        let old = single(sig(1));
        assert!(details.check_capability(&old, CertCapabilities::PERMISSION));
        assert!(details.check_capability(
            &old,
            CertCapabilities::PERMISSION | CertCapabilities::INSTALLED_DATA
        ));
        assert!(!details.check_capability(&old, CertCapabilities::SHARED_USER_ID));
        // The current signer holds every capability.
        assert!(details.check_capability(&single(sig(2)), CertCapabilities::all()));
        assert!(!details.check_capability_recover(&old, CertCapabilities::PERMISSION));
        assert!(details.check_capability_recover(
            &old,
            CertCapabilities::PERMISSION | CertCapabilities::INSTALLED_DATA
        ));
    }

    #[test]
    fn sha256_lookup() {
        let details = rotated();
        let digest = sig(1).sha256_digest();
        assert!(details.has_sha256_certificate(&digest));
        assert!(details.check_capability_sha256(&digest, CertCapabilities::PERMISSION));
        assert!(!details.check_capability_sha256(&digest, CertCapabilities::ROLLBACK));
        assert!(details.has_sha256_certificate(&sig(2).sha256_digest()));
    }

    #[test]
    fn multi_signer_degrades_to_exact_match() {
        let multi = SigningDetails::builder()
            .signatures(vec![sig(1), sig(2)])
            .build()
            .unwrap();
        let reordered = SigningDetails::builder()
            .signatures(vec![sig(2), sig(1)])
            .build()
            .unwrap();
        assert!(multi.has_ancestor_or_self(&reordered));
        assert!(!multi.has_ancestor_or_self(&single(sig(1))));
        assert!(!multi.has_certificate(&sig(1)));
        assert!(!single(sig(1)).has_ancestor_or_self(&multi));
    }

    #[test]
    fn builder_rejects_history_with_many_signers() {
        let err = SigningDetails::builder()
            .signatures(vec![sig(1), sig(2)])
            .past_signing_certificates(vec![sig(0), sig(1)])
            .build()
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ParseErrorCode::CertificateEncoding);
        assert!(SigningDetails::builder().build().is_err());
    }

    #[test]
    fn public_key_algorithm_trial() {
        // SEQUENCE { SEQUENCE { OID ecPublicKey }, BIT STRING {} }
        let der = [
            0x30, 0x0d, 0x30, 0x09, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x03,
            0x00,
        ];
        let key = parse_public_key(&KeyDecoderOnly, &STANDARD.encode(der)).unwrap();
        assert_eq!(key.algorithm, KeyAlgorithm::Ec);
        assert!(parse_public_key(&KeyDecoderOnly, "not base64!").is_none());
        assert!(parse_public_key(&KeyDecoderOnly, &STANDARD.encode([0x30, 0x00])).is_none());
    }
}
