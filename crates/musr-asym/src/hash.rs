use musr_core::errors::MusrError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided serialisable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, MusrError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hash_ignores_map_insertion_order() {
        let a: HashMap<&str, u32> = [("a", 1), ("b", 2)].into_iter().collect();
        let b: HashMap<&str, u32> = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(stable_hash_string(&a).unwrap(), stable_hash_string(&b).unwrap());
    }

    #[test]
    fn hash_distinguishes_values() {
        assert_ne!(
            stable_hash_string(&[1.0_f64, 2.0]).unwrap(),
            stable_hash_string(&[1.0_f64, 2.5]).unwrap()
        );
    }
}
