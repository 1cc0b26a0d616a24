//! IdGenerator port - ID 生成の抽象化
//!
//! Clock から timestamp を取り、ULID のランダム部を `rand` で埋めます。
//! テストでは `FixedClock` を使って timestamp 部を固定できます。

use crate::domain::ids::PeerId;
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_peer_id(&self) -> PeerId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_peer_id(&self) -> PeerId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        PeerId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);
        let a = id_gen.generate_peer_id();
        let b = id_gen.generate_peer_id();
        assert_ne!(a, b);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let a = id_gen.generate_peer_id();
        let b = id_gen.generate_peer_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(a, b);
        assert_eq!(a.timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(b.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
