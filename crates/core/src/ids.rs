use sha2::{Digest, Sha256};

/// Derives a replacement identifier for `original` under `seed`.
///
/// The result is lowercase hex with the same character count as `original`.
/// It depends only on `(original, seed)`, so a parent reference and the span
/// it points at always map to the same value within one seed. The first
/// SHA-256 block covers `seed || original`; longer identifiers are extended
/// with blocks over `seed:original:n` for `n = 1, 2, ...` and truncated.
pub fn map_id(original: &str, seed: &str) -> String {
    let target = original.chars().count();
    if target == 0 {
        return String::new();
    }

    let first = Sha256::new()
        .chain_update(seed.as_bytes())
        .chain_update(original.as_bytes())
        .finalize();
    let mut out = hex::encode(first);

    let mut counter: u64 = 1;
    while out.len() < target {
        let block = Sha256::new()
            .chain_update(seed.as_bytes())
            .chain_update(b":")
            .chain_update(original.as_bytes())
            .chain_update(b":")
            .chain_update(counter.to_string().as_bytes())
            .finalize();
        out.push_str(&hex::encode(block));
        counter += 1;
    }

    out.truncate(target);
    out
}

/// A seed bound to one replay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMapper {
    seed: String,
}

impl IdMapper {
    pub fn new(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn map(&self, original: &str) -> String {
        map_id(original, &self.seed)
    }

    /// Mapper for retry `attempt` of the same run. Attempt 0 is the run's own seed.
    pub fn attempt(&self, attempt: u32) -> Self {
        if attempt == 0 {
            return self.clone();
        }
        Self::new(format!("{}#{attempt}", self.seed))
    }
}
