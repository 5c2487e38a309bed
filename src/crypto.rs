//! SAE group 19 (NIST P-256) primitives for commit flooding.
//!
//! Only what a flooder needs is implemented: hunting-and-pecking PWE
//! derivation and commit scalar/element generation. There is no confirm
//! step and no key derivation.

use libwifi::frame::components::MacAddress;
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar, U256};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hunting-and-pecking gives up after this many counters.
pub const PWE_MAX_ITERATIONS: u8 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("no password element found within {0} iterations")]
    PweNotFound(u8),
    #[error("point is not on the curve")]
    InvalidPoint,
    #[error("commit element is the point at infinity")]
    Identity,
}

/// Inputs to PWE derivation. Address order does not matter.
pub struct PweRequest<'a> {
    pub password: &'a str,
    pub addr1: MacAddress,
    pub addr2: MacAddress,
}

/// Password element as affine coordinates.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pwe {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl std::fmt::Debug for Pwe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pwe(..)")
    }
}

/// Commit scalar and element, big endian, element as `x || y`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SaeCommitMaterial {
    pub scalar: [u8; 32],
    pub element: [u8; 64],
}

impl std::fmt::Debug for SaeCommitMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SaeCommitMaterial(..)")
    }
}

pub trait SaeCrypto: Send + Sync {
    fn derive_pwe(&self, request: &PweRequest) -> Result<Pwe, CryptoError>;

    /// Fresh commit material for `pwe`. Every call draws new randomness.
    fn commit(&self, pwe: &Pwe) -> Result<SaeCommitMaterial, CryptoError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct P256Sae;

fn random_scalar() -> Scalar {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    let scalar = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&bytes));
    bytes.zeroize();
    scalar
}

fn nonzero(scalar: Scalar) -> Scalar {
    if scalar == Scalar::ZERO {
        Scalar::ONE
    } else {
        scalar
    }
}

fn point_from_candidate(prefix: u8, x: &[u8]) -> Option<AffinePoint> {
    let mut compressed = [0u8; 33];
    compressed[0] = prefix;
    compressed[1..].copy_from_slice(x);
    let encoded = EncodedPoint::from_bytes(compressed).ok()?;
    Option::from(AffinePoint::from_encoded_point(&encoded))
}

fn affine_coordinates(point: &AffinePoint) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let encoded = point.to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => {
            let mut out_x = [0u8; 32];
            let mut out_y = [0u8; 32];
            out_x.copy_from_slice(x);
            out_y.copy_from_slice(y);
            Ok((out_x, out_y))
        }
        _ => Err(CryptoError::Identity),
    }
}

impl SaeCrypto for P256Sae {
    fn derive_pwe(&self, request: &PweRequest) -> Result<Pwe, CryptoError> {
        let (high, low) = if request.addr1 >= request.addr2 {
            (request.addr1, request.addr2)
        } else {
            (request.addr2, request.addr1)
        };

        for counter in 1..=PWE_MAX_ITERATIONS {
            let mut seed: [u8; 32] = Sha256::new()
                .chain_update(high.0)
                .chain_update(low.0)
                .chain_update(request.password.as_bytes())
                .chain_update([counter])
                .finalize()
                .into();

            let point = point_from_candidate(0x02, &seed)
                .or_else(|| point_from_candidate(0x03, &seed));
            seed.zeroize();

            if let Some(point) = point {
                let (x, y) = affine_coordinates(&point)?;
                return Ok(Pwe { x, y });
            }
        }
        Err(CryptoError::PweNotFound(PWE_MAX_ITERATIONS))
    }

    fn commit(&self, pwe: &Pwe) -> Result<SaeCommitMaterial, CryptoError> {
        let encoded = EncodedPoint::from_affine_coordinates(
            &FieldBytes::clone_from_slice(&pwe.x),
            &FieldBytes::clone_from_slice(&pwe.y),
            false,
        );
        let point: AffinePoint = Option::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or(CryptoError::InvalidPoint)?;

        let private = random_scalar();
        let mask = random_scalar();
        let scalar = nonzero(private + mask);
        let neg_mask = nonzero(-nonzero(mask));

        let element = (ProjectivePoint::from(point) * neg_mask).to_affine();
        let (x, y) = affine_coordinates(&element)?;

        let mut material = SaeCommitMaterial {
            scalar: [0u8; 32],
            element: [0u8; 64],
        };
        material.scalar.copy_from_slice(&scalar.to_bytes());
        material.element[..32].copy_from_slice(&x);
        material.element[32..].copy_from_slice(&y);
        Ok(material)
    }
}
