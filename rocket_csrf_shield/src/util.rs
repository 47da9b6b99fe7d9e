use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

/// A source of cryptographically secure random bytes.
///
/// Implementations are shared by every request the shield handles, so they must be
/// usable from many threads at once without external locking.
pub trait SecureRandom: Send + Sync + 'static {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// The operating system's random number generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// Generates `len` random bytes from the given source.
pub(crate) fn random_bytes(random: &dyn SecureRandom, len: usize) -> Result<Vec<u8>, rand::Error> {
    let mut buf = vec![0; len];
    random.fill(&mut buf)?;
    Ok(buf)
}

/// Compares two byte slices without leaking the position of the first difference.
///
/// Slices of different lengths are never equal. Only the lengths themselves, which
/// are public for tokens, can influence timing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// XORs `a` and `b` into `out`, up to the shortest of the three.
pub(crate) fn xor_into(a: &[u8], b: &[u8], out: &mut [u8]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x ^ y;
    }
}
