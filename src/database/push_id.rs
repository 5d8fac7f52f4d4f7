//! Chronologically ordered push ids
//!
//! 8 characters encode the timestamp in milliseconds, 12 are random. Ids
//! generated within the same millisecond increment the random part so they
//! still sort in creation order.

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of every push id
pub const PUSH_ID_LENGTH: usize = 20;

/// Generator state shared by the pushes of one database
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    last_push_time: i64,
    last_rand_chars: [u8; 12],
}

impl PushIdGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for the given (server adjusted) time in milliseconds
    pub fn next_id(&mut self, now_millis: i64) -> String {
        let duplicate_time = now_millis == self.last_push_time;
        self.last_push_time = now_millis;

        let mut id = [0u8; PUSH_ID_LENGTH];
        let mut remaining = now_millis.max(0) as u64;
        for slot in id[..8].iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }

        if duplicate_time {
            self.increment_random();
        } else {
            let mut rng = rand::thread_rng();
            for c in self.last_rand_chars.iter_mut() {
                *c = rng.gen_range(0..64);
            }
        }

        for (slot, value) in id[8..].iter_mut().zip(self.last_rand_chars.iter()) {
            *slot = PUSH_CHARS[*value as usize];
        }

        id.iter().map(|b| *b as char).collect()
    }

    fn increment_random(&mut self) {
        for c in self.last_rand_chars.iter_mut().rev() {
            if *c == 63 {
                *c = 0;
            } else {
                *c += 1;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_alphabet() {
        let mut generator = PushIdGenerator::new();
        let id = generator.next_id(1_700_000_000_000);
        assert_eq!(id.len(), PUSH_ID_LENGTH);
        assert!(id.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn test_timestamp_prefix_sorts() {
        let mut generator = PushIdGenerator::new();
        let earlier = generator.next_id(1_000);
        let later = generator.next_id(2_000);
        assert!(earlier[..8] < later[..8]);
        assert!(earlier < later);
    }

    #[test]
    fn test_monotonic_within_same_millisecond() {
        let mut generator = PushIdGenerator::new();
        let mut previous = generator.next_id(42);
        for _ in 0..1_000 {
            let next = generator.next_id(42);
            assert!(next > previous, "{} should sort after {}", next, previous);
            assert_eq!(next[..8], previous[..8]);
            previous = next;
        }
    }

    #[test]
    fn test_increment_carries() {
        let mut generator = PushIdGenerator::new();
        generator.last_rand_chars = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 63];
        generator.increment_random();
        assert_eq!(generator.last_rand_chars[10..], [6, 0]);
    }
}
