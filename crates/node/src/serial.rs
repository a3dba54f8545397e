//! Device serial number: a 32-character hex identifier generated on first
//! boot and persisted so it survives reflashes of everything but storage.

use plantmon_engine::{KvStore, PersistenceError};
use tracing::{info, warn};

const SERIAL_KEY: &str = "serial";
const SERIAL_LEN: usize = 32;

fn is_valid(serial: &str) -> bool {
    serial.len() == SERIAL_LEN && serial.chars().all(|c| c.is_ascii_hexdigit())
}

fn generate() -> String {
    (0..SERIAL_LEN)
        .map(|_| char::from_digit(fastrand::u32(0..16), 16).unwrap_or('0'))
        .collect()
}

/// Return the persisted serial number, generating and storing a fresh one
/// when none exists or the stored value is unusable.
pub fn load_or_generate(store: &mut dyn KvStore) -> Result<String, PersistenceError> {
    match store.load(SERIAL_KEY, 64) {
        Ok(bytes) => {
            if let Ok(s) = String::from_utf8(bytes) {
                let s = s.trim().to_string();
                if is_valid(&s) {
                    return Ok(s);
                }
            }
            warn!("stored serial number unusable, regenerating");
        }
        Err(PersistenceError::NotFound(_)) => {}
        Err(e) => warn!(error = %e, "serial load failed, regenerating"),
    }

    let serial = generate();
    store.save(SERIAL_KEY, serial.as_bytes())?;
    info!(%serial, "generated new device serial");
    Ok(serial)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use plantmon_engine::MemStore;

    #[test]
    fn generated_serial_is_32_hex_chars() {
        let s = generate();
        assert!(is_valid(&s), "bad serial: {s}");
    }

    #[test]
    fn serial_is_stable_across_calls() {
        let mut store = MemStore::new();
        let a = load_or_generate(&mut store).unwrap();
        let b = load_or_generate(&mut store).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn corrupt_stored_serial_is_replaced() {
        let mut store = MemStore::new();
        store.insert_raw(SERIAL_KEY, b"not-a-serial".to_vec());
        let s = load_or_generate(&mut store).unwrap();
        assert!(is_valid(&s));

        // The replacement was persisted.
        let again = load_or_generate(&mut store).unwrap();
        assert_eq!(s, again);
    }

    #[test]
    fn whitespace_around_stored_serial_is_tolerated() {
        let mut store = MemStore::new();
        let serial = generate();
        store.insert_raw(SERIAL_KEY, format!("{serial}\n").into_bytes());
        assert_eq!(load_or_generate(&mut store).unwrap(), serial);
    }
}
