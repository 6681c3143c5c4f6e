//! AES Block Cipher
//!
//! Table-driven AES-128/192/256 (FIPS-197). Each full round fuses SubBytes,
//! ShiftRows and MixColumns into four 256-entry `u32` lookups; the final round
//! uses the plain S-box. All tables are generated at compile time.
//!
//! Only the raw block transform lives here. Modes of operation (counter mode,
//! key derivation) are built by the suites on top of it.

use thiserror::Error;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Largest round-key schedule (AES-256: 4 * (14 + 1) words)
const MAX_SCHEDULE_WORDS: usize = 60;

/// Block cipher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid key size: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeySize(usize),

    #[error("Input length {0} is not a multiple of the block size")]
    InvalidLength(usize),
}

const fn xtime(b: u8) -> u8 {
    (b << 1) ^ if b & 0x80 != 0 { 0x1B } else { 0x00 }
}

const fn gmul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        a = xtime(a);
        b >>= 1;
    }
    product
}

/// S-box built by walking the multiplicative group with generator 3
const fn build_sbox() -> [u8; 256] {
    let mut sbox = [0u8; 256];
    let mut p: u8 = 1;
    let mut q: u8 = 1;
    loop {
        // p *= 3
        p = p ^ (p << 1) ^ if p & 0x80 != 0 { 0x1B } else { 0x00 };

        // q /= 3
        q ^= q << 1;
        q ^= q << 2;
        q ^= q << 4;
        if q & 0x80 != 0 {
            q ^= 0x09;
        }

        // affine transform of the inverse
        let x = q ^ q.rotate_left(1) ^ q.rotate_left(2) ^ q.rotate_left(3) ^ q.rotate_left(4);
        sbox[p as usize] = x ^ 0x63;

        if p == 1 {
            break;
        }
    }
    sbox[0] = 0x63;
    sbox
}

const fn invert(sbox: &[u8; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inverse[sbox[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

/// Column table for `coefficients` (big-endian row order), rotated right by `rotation` bits
const fn build_table(sbox: &[u8; 256], coefficients: [u8; 4], rotation: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let s = sbox[i];
        let word = (gmul(s, coefficients[0]) as u32) << 24
            | (gmul(s, coefficients[1]) as u32) << 16
            | (gmul(s, coefficients[2]) as u32) << 8
            | gmul(s, coefficients[3]) as u32;
        table[i] = word.rotate_right(rotation);
        i += 1;
    }
    table
}

const MIX: [u8; 4] = [0x02, 0x01, 0x01, 0x03];
const INV_MIX: [u8; 4] = [0x0E, 0x09, 0x0D, 0x0B];

static SBOX: [u8; 256] = build_sbox();
static INV_SBOX: [u8; 256] = invert(&build_sbox());

static TE0: [u32; 256] = build_table(&build_sbox(), MIX, 0);
static TE1: [u32; 256] = build_table(&build_sbox(), MIX, 8);
static TE2: [u32; 256] = build_table(&build_sbox(), MIX, 16);
static TE3: [u32; 256] = build_table(&build_sbox(), MIX, 24);

static TD0: [u32; 256] = build_table(&invert(&build_sbox()), INV_MIX, 0);
static TD1: [u32; 256] = build_table(&invert(&build_sbox()), INV_MIX, 8);
static TD2: [u32; 256] = build_table(&invert(&build_sbox()), INV_MIX, 16);
static TD3: [u32; 256] = build_table(&invert(&build_sbox()), INV_MIX, 24);

#[inline(always)]
fn byte(word: u32, shift: u32) -> usize {
    ((word >> shift) & 0xFF) as usize
}

#[inline]
fn sub_word(word: u32) -> u32 {
    (SBOX[byte(word, 24)] as u32) << 24
        | (SBOX[byte(word, 16)] as u32) << 16
        | (SBOX[byte(word, 8)] as u32) << 8
        | SBOX[byte(word, 0)] as u32
}

#[inline]
fn load(block: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        block[offset],
        block[offset + 1],
        block[offset + 2],
        block[offset + 3],
    ])
}

/// Expanded AES key
///
/// Holds the encryption schedule and the equivalent inverse schedule used by
/// [`Aes::decrypt_block`].
#[derive(Clone)]
pub struct Aes {
    enc: [u32; MAX_SCHEDULE_WORDS],
    dec: [u32; MAX_SCHEDULE_WORDS],
    rounds: usize,
}

impl Aes {
    /// Expand a 16, 24 or 32 byte key
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(CipherError::InvalidKeySize(key.len()));
        }

        let nk = key.len() / 4;
        let rounds = 6 + nk;
        let words = 4 * (rounds + 1);

        let mut enc = [0u32; MAX_SCHEDULE_WORDS];
        for (i, word) in enc.iter_mut().enumerate().take(nk) {
            *word = load(key, i * 4);
        }

        let mut rcon: u8 = 1;
        for i in nk..words {
            let mut temp = enc[i - 1];
            if i % nk == 0 {
                temp = sub_word(temp.rotate_left(8)) ^ (rcon as u32) << 24;
                rcon = xtime(rcon);
            } else if nk > 6 && i % nk == 4 {
                temp = sub_word(temp);
            }
            enc[i] = enc[i - nk] ^ temp;
        }

        // Inverse schedule: round keys in reverse order, with InvMixColumns
        // applied to every round key except the first and last.
        let mut dec = [0u32; MAX_SCHEDULE_WORDS];
        for round in 0..=rounds {
            let src = (rounds - round) * 4;
            for col in 0..4 {
                let word = enc[src + col];
                dec[round * 4 + col] = if round == 0 || round == rounds {
                    word
                } else {
                    TD0[SBOX[byte(word, 24)] as usize]
                        ^ TD1[SBOX[byte(word, 16)] as usize]
                        ^ TD2[SBOX[byte(word, 8)] as usize]
                        ^ TD3[SBOX[byte(word, 0)] as usize]
                };
            }
        }

        Ok(Aes { enc, dec, rounds })
    }

    /// Number of rounds (10, 12 or 14)
    #[inline]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Encrypt one 16-byte block in place
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let rk = &self.enc;
        let mut s0 = load(block, 0) ^ rk[0];
        let mut s1 = load(block, 4) ^ rk[1];
        let mut s2 = load(block, 8) ^ rk[2];
        let mut s3 = load(block, 12) ^ rk[3];

        for round in 1..self.rounds {
            let k = round * 4;
            let t0 = TE0[byte(s0, 24)] ^ TE1[byte(s1, 16)] ^ TE2[byte(s2, 8)] ^ TE3[byte(s3, 0)] ^ rk[k];
            let t1 = TE0[byte(s1, 24)] ^ TE1[byte(s2, 16)] ^ TE2[byte(s3, 8)] ^ TE3[byte(s0, 0)] ^ rk[k + 1];
            let t2 = TE0[byte(s2, 24)] ^ TE1[byte(s3, 16)] ^ TE2[byte(s0, 8)] ^ TE3[byte(s1, 0)] ^ rk[k + 2];
            let t3 = TE0[byte(s3, 24)] ^ TE1[byte(s0, 16)] ^ TE2[byte(s1, 8)] ^ TE3[byte(s2, 0)] ^ rk[k + 3];
            s0 = t0;
            s1 = t1;
            s2 = t2;
            s3 = t3;
        }

        let k = self.rounds * 4;
        let out = [
            final_round(&SBOX, s0, s1, s2, s3) ^ rk[k],
            final_round(&SBOX, s1, s2, s3, s0) ^ rk[k + 1],
            final_round(&SBOX, s2, s3, s0, s1) ^ rk[k + 2],
            final_round(&SBOX, s3, s0, s1, s2) ^ rk[k + 3],
        ];
        store(block, out);
    }

    /// Decrypt one 16-byte block in place
    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let rk = &self.dec;
        let mut s0 = load(block, 0) ^ rk[0];
        let mut s1 = load(block, 4) ^ rk[1];
        let mut s2 = load(block, 8) ^ rk[2];
        let mut s3 = load(block, 12) ^ rk[3];

        for round in 1..self.rounds {
            let k = round * 4;
            let t0 = TD0[byte(s0, 24)] ^ TD1[byte(s3, 16)] ^ TD2[byte(s2, 8)] ^ TD3[byte(s1, 0)] ^ rk[k];
            let t1 = TD0[byte(s1, 24)] ^ TD1[byte(s0, 16)] ^ TD2[byte(s3, 8)] ^ TD3[byte(s2, 0)] ^ rk[k + 1];
            let t2 = TD0[byte(s2, 24)] ^ TD1[byte(s1, 16)] ^ TD2[byte(s0, 8)] ^ TD3[byte(s3, 0)] ^ rk[k + 2];
            let t3 = TD0[byte(s3, 24)] ^ TD1[byte(s2, 16)] ^ TD2[byte(s1, 8)] ^ TD3[byte(s0, 0)] ^ rk[k + 3];
            s0 = t0;
            s1 = t1;
            s2 = t2;
            s3 = t3;
        }

        let k = self.rounds * 4;
        let out = [
            final_round(&INV_SBOX, s0, s3, s2, s1) ^ rk[k],
            final_round(&INV_SBOX, s1, s0, s3, s2) ^ rk[k + 1],
            final_round(&INV_SBOX, s2, s1, s0, s3) ^ rk[k + 2],
            final_round(&INV_SBOX, s3, s2, s1, s0) ^ rk[k + 3],
        ];
        store(block, out);
    }

    /// Encrypt each 16-byte block of `data` independently (no chaining)
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::InvalidLength(data.len()));
        }

        let mut output = data.to_vec();
        for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.encrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Aes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Round keys are secret
        f.debug_struct("Aes").field("rounds", &self.rounds).finish()
    }
}

#[inline]
fn final_round(sbox: &[u8; 256], a: u32, b: u32, c: u32, d: u32) -> u32 {
    (sbox[byte(a, 24)] as u32) << 24
        | (sbox[byte(b, 16)] as u32) << 16
        | (sbox[byte(c, 8)] as u32) << 8
        | sbox[byte(d, 0)] as u32
}

#[inline]
fn store(block: &mut [u8; BLOCK_SIZE], words: [u32; 4]) {
    for (chunk, word) in block.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
}
