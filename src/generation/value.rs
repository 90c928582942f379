use rand::Rng;

use crate::model::{Affinity, SqlValue};

const LOWERCASE_A: u32 = 'a' as u32;
const LOWERCASE_Z: u32 = 'z' as u32;

/// A random value whose storage class is the natural one for `affinity`.
///
/// Values of that class pass through the column's affinity unchanged, both
/// when inserted and when compared against the column, which keeps pivot
/// evaluation exact. Ranges are narrow so equalities actually happen.
pub fn random_value<R: Rng + ?Sized>(rng: &mut R, affinity: Affinity) -> SqlValue {
    match affinity {
        Affinity::Integer | Affinity::Numeric => SqlValue::Integer(rng.random_range(-100..=100)),
        // Quarters are exact in binary, so the literal round-trips through SQL text.
        Affinity::Real => SqlValue::Real(rng.random_range(-400i32..=400) as f64 / 4.0),
        Affinity::Text => SqlValue::Text(random_text(rng)),
        // No reals here: `2` and `2.0` in the same untyped column are equal
        // to DISTINCT but render differently, so either could come back.
        Affinity::Blob => match rng.random_range(0..3) {
            0 => SqlValue::Integer(rng.random_range(-100..=100)),
            1 => SqlValue::Text(random_text(rng)),
            _ => SqlValue::Blob((0..rng.random_range(0..=4usize)).map(|_| rng.random()).collect()),
        },
    }
}

fn random_text<R: Rng + ?Sized>(rng: &mut R) -> String {
    if rng.random_ratio(1, 20) {
        return String::new();
    }
    let len = rng.random_range(1..=6);
    (0..len)
        .map(|_| {
            char::from_u32(rng.random_range(LOWERCASE_A..=LOWERCASE_Z))
                .unwrap_or('a')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_storage_class_follows_affinity() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(matches!(random_value(&mut rng, Affinity::Integer), SqlValue::Integer(_)));
            assert!(matches!(random_value(&mut rng, Affinity::Numeric), SqlValue::Integer(_)));
            assert!(matches!(random_value(&mut rng, Affinity::Real), SqlValue::Real(_)));
            match random_value(&mut rng, Affinity::Text) {
                SqlValue::Text(t) => assert!(t.chars().all(|c| c.is_ascii_lowercase())),
                other => panic!("expected text, got {other:?}"),
            }
            let untyped = random_value(&mut rng, Affinity::Blob);
            assert!(!untyped.is_null());
            assert!(!matches!(untyped, SqlValue::Real(_)));
        }
    }
}
