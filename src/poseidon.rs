//! Circom-compatible Poseidon over the BN254 scalar field.
//!
//! Widths up to 13 use the parameter sets bundled with `light-poseidon`. The circuits
//! also hash 13 to 16 inputs (name chunks, packed certificate keys), so the remaining
//! widths are derived from the same Grain LFSR construction that produced the bundled
//! constants. [`init_crypto`] builds every set once; the hash functions call it lazily
//! as well.

use crate::error::CryptoError;
use crate::field::FieldElement;
use ark_bn254::Fr;
use ark_ff::Field;
use light_poseidon::parameters::bn254_x5::get_poseidon_parameters;
use light_poseidon::{Poseidon, PoseidonHasher, PoseidonParameters};
use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::OnceLock;

/// Largest number of inputs a single Poseidon call accepts.
pub const MAX_POSEIDON_INPUTS: usize = 16;

const FULL_ROUNDS: usize = 8;
const ALPHA: u64 = 5;
const FIELD_BITS: usize = 254;
const LARGEST_BUNDLED_WIDTH: usize = 13;

/// Partial rounds for widths 2..=17.
const PARTIAL_ROUNDS: [usize; MAX_POSEIDON_INPUTS] =
    [56, 57, 56, 60, 60, 63, 64, 63, 60, 66, 60, 65, 70, 60, 64, 68];

#[derive(Clone)]
struct RoundConstants {
    ark: Vec<Fr>,
    mds: Vec<Vec<Fr>>,
    partial_rounds: usize,
    width: usize,
}

impl RoundConstants {
    fn hasher(&self) -> Poseidon<Fr> {
        Poseidon::new(PoseidonParameters::new(
            self.ark.clone(),
            self.mds.clone(),
            FULL_ROUNDS,
            self.partial_rounds,
            self.width,
            ALPHA,
        ))
    }
}

static PARAMETERS: OnceLock<Vec<RoundConstants>> = OnceLock::new();

/// Builds the Poseidon parameter sets for every supported width.
///
/// Idempotent; the host may call it once at startup to keep the first hash fast.
pub fn init_crypto() {
    parameters();
}

fn parameters() -> &'static [RoundConstants] {
    PARAMETERS.get_or_init(|| {
        let sets: Vec<RoundConstants> = (2..=MAX_POSEIDON_INPUTS + 1)
            .map(|width| {
                let bundled = if width <= LARGEST_BUNDLED_WIDTH {
                    get_poseidon_parameters::<Fr>(width as u8).ok()
                } else {
                    None
                };
                match bundled {
                    Some(params) => RoundConstants {
                        ark: params.ark,
                        mds: params.mds,
                        partial_rounds: params.partial_rounds,
                        width,
                    },
                    None => generate_round_constants(width),
                }
            })
            .collect();
        debug!("Initialized Poseidon parameters for {} widths", sets.len());
        sets
    })
}

/// Grain LFSR in self-shrinking mode, seeded with the parameter description.
struct GrainLfsr {
    state: [bool; 80],
    head: usize,
}

impl GrainLfsr {
    fn new(width: usize, partial_rounds: usize) -> Self {
        let mut seed = Vec::with_capacity(80);
        let mut push = |value: usize, bits: usize| {
            for i in (0..bits).rev() {
                seed.push((value >> i) & 1 == 1);
            }
        };
        push(1, 2); // prime field
        push(0, 4); // x^alpha s-box
        push(FIELD_BITS, 12);
        push(width, 12);
        push(FULL_ROUNDS, 10);
        push(partial_rounds, 10);
        seed.extend(std::iter::repeat(true).take(30));

        let mut state = [false; 80];
        state.copy_from_slice(&seed);
        let mut lfsr = GrainLfsr { state, head: 0 };
        for _ in 0..160 {
            lfsr.clock();
        }
        lfsr
    }

    fn clock(&mut self) -> bool {
        let tap = |i: usize| self.state[(self.head + i) % 80];
        let bit = tap(62) ^ tap(51) ^ tap(38) ^ tap(23) ^ tap(13) ^ tap(0);
        self.state[self.head] = bit;
        self.head = (self.head + 1) % 80;
        bit
    }

    fn next_bit(&mut self) -> bool {
        loop {
            if self.clock() {
                return self.clock();
            }
            self.clock();
        }
    }

    fn next_integer(&mut self) -> BigUint {
        let mut value = BigUint::zero();
        for _ in 0..FIELD_BITS {
            value <<= 1;
            if self.next_bit() {
                value += 1u32;
            }
        }
        value
    }
}

fn generate_round_constants(width: usize) -> RoundConstants {
    let partial_rounds = PARTIAL_ROUNDS[width - 2];
    let modulus = FieldElement::modulus();
    let mut lfsr = GrainLfsr::new(width, partial_rounds);

    let ark = (0..(FULL_ROUNDS + partial_rounds) * width)
        .map(|_| loop {
            let candidate = lfsr.next_integer();
            if candidate < modulus {
                break Fr::from(candidate);
            }
        })
        .collect();

    let mds = loop {
        let points: Vec<Fr> = (0..2 * width)
            .map(|_| Fr::from(lfsr.next_integer()))
            .collect();
        let mut distinct = points.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() != points.len() {
            continue;
        }
        let (xs, ys) = points.split_at(width);
        let matrix: Option<Vec<Vec<Fr>>> = xs
            .iter()
            .map(|x| ys.iter().map(|y| (*x + *y).inverse()).collect())
            .collect();
        if let Some(matrix) = matrix {
            break matrix;
        }
    };

    RoundConstants {
        ark,
        mds,
        partial_rounds,
        width,
    }
}

/// Poseidon over 1 to 16 field elements, matching circomlib's `Poseidon(n)`.
pub fn flexible_poseidon(inputs: &[FieldElement]) -> Result<FieldElement, CryptoError> {
    if inputs.is_empty() || inputs.len() > MAX_POSEIDON_INPUTS {
        return Err(CryptoError::PoseidonArity {
            got: inputs.len(),
            max: MAX_POSEIDON_INPUTS,
        });
    }
    let fields: Vec<Fr> = inputs.iter().map(|f| f.inner()).collect();
    let mut hasher = parameters()[inputs.len() - 1].hasher();
    hasher
        .hash(&fields)
        .map(FieldElement::from)
        .map_err(|e| CryptoError::Poseidon(e.to_string()))
}

/// Fixed-arity form of [`flexible_poseidon`], e.g. `poseidon([secret, id])`.
pub fn poseidon<const N: usize>(inputs: [FieldElement; N]) -> Result<FieldElement, CryptoError> {
    flexible_poseidon(&inputs)
}

/// Two-to-one compression used by every Merkle tree in the protocol.
pub fn poseidon2(left: FieldElement, right: FieldElement) -> Result<FieldElement, CryptoError> {
    flexible_poseidon(&[left, right])
}

/// Hashes an arbitrary number of elements the way the circuits' `CustomHasher` does.
///
/// Fewer than 16 inputs hash in one call. Otherwise the inputs are split into
/// zero-padded chunks of 16, each chunk is hashed in order, and the chunk digests
/// are hashed together. At most 16 chunks are accepted.
pub fn custom_hasher(inputs: &[FieldElement]) -> Result<FieldElement, CryptoError> {
    if inputs.len() < MAX_POSEIDON_INPUTS {
        return flexible_poseidon(inputs);
    }
    let rounds = inputs.len().div_ceil(MAX_POSEIDON_INPUTS);
    if rounds > MAX_POSEIDON_INPUTS {
        return Err(CryptoError::HasherCapacity {
            count: rounds,
            max: MAX_POSEIDON_INPUTS,
        });
    }
    let chunk_hashes = inputs
        .chunks(MAX_POSEIDON_INPUTS)
        .map(|chunk| {
            let mut padded = chunk.to_vec();
            padded.resize(MAX_POSEIDON_INPUTS, FieldElement::zero());
            flexible_poseidon(&padded)
        })
        .collect::<Result<Vec<_>, _>>()?;
    flexible_poseidon(&chunk_hashes)
}

/// Reduces a field element to its low 64 bits, as used for sparse tree keys.
pub fn to_small_key(value: &FieldElement) -> FieldElement {
    let bytes = value.to_be_bytes();
    FieldElement::from_be_bytes_mod_order(&bytes[bytes.len() - 8..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str) -> FieldElement {
        s.parse().unwrap()
    }

    fn range(n: u64) -> Vec<FieldElement> {
        (1..=n).map(FieldElement::from).collect()
    }

    #[test]
    fn test_poseidon_matches_circomlib_vectors() {
        init_crypto();
        assert_eq!(
            poseidon2(FieldElement::from(1u64), FieldElement::from(2u64)).unwrap(),
            field("7853200120776062878684798364095072458815029376092732009249414926327459813530")
        );
        assert_eq!(
            flexible_poseidon(&range(1)).unwrap(),
            field("18586133768512220936620570745912940619677854269274689475585506675881198879027")
        );
        assert_eq!(
            flexible_poseidon(&range(5)).unwrap(),
            field("6183221330272524995739186171720101788151706631170188140075976616310159254464")
        );
    }

    #[test]
    fn test_generated_widths() {
        assert_eq!(
            flexible_poseidon(&range(13)).unwrap(),
            field("7041832639553862712666971417715061873827921493498355005117622707743491651590")
        );
        assert_eq!(
            flexible_poseidon(&range(16)).unwrap(),
            field("9989051620750914585850546081941653841776809718687451684622678807385399211877")
        );
    }

    #[test]
    fn test_generator_reproduces_bundled_parameters() {
        for width in [2usize, 3, 7, 13] {
            let bundled = get_poseidon_parameters::<Fr>(width as u8).unwrap();
            let generated = generate_round_constants(width);
            assert_eq!(generated.ark, bundled.ark, "ark mismatch for t={width}");
            assert_eq!(generated.mds, bundled.mds, "mds mismatch for t={width}");
        }
    }

    #[test]
    fn test_arity_bounds() {
        assert!(matches!(
            flexible_poseidon(&[]),
            Err(CryptoError::PoseidonArity { got: 0, .. })
        ));
        assert!(flexible_poseidon(&range(17)).is_err());
    }

    #[test]
    fn test_custom_hasher_chunking() {
        let inputs = range(20);
        let expected =
            field("18123228123459463635180137242960051884394567443002739862425445800253241177855");
        assert_eq!(custom_hasher(&inputs).unwrap(), expected);

        let mut second = inputs[16..].to_vec();
        second.resize(16, FieldElement::zero());
        let manual = flexible_poseidon(&[
            flexible_poseidon(&inputs[..16]).unwrap(),
            flexible_poseidon(&second).unwrap(),
        ])
        .unwrap();
        assert_eq!(manual, expected);

        let short = range(15);
        assert_eq!(
            custom_hasher(&short).unwrap(),
            flexible_poseidon(&short).unwrap()
        );
    }

    #[test]
    fn test_custom_hasher_capacity() {
        let too_many = vec![FieldElement::from(1u64); 16 * 16 + 1];
        assert!(matches!(
            custom_hasher(&too_many),
            Err(CryptoError::HasherCapacity { count: 17, .. })
        ));
    }

    #[test]
    fn test_small_key() {
        let value = field("0x0102030405060708090a0b0c0d0e0f10");
        assert_eq!(to_small_key(&value), field("0x090a0b0c0d0e0f10"));
    }
}
