//! Boundary arithmetic for fixed-point energy.

use std::time::Duration;

use client_api_core::{EnergyState, RawEnergy};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Computes when the visible energy value will next change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyModel {
    /// Delays shorter than this are rounded up to it.
    pub min_delay: Duration,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
        }
    }
}

impl EnergyModel {
    pub fn new(min_delay: Duration) -> Self {
        Self { min_delay }
    }

    /// Time until `raw` crosses its next whole-unit boundary.
    ///
    /// Returns `None` when energy is at or above `capacity` (visible units),
    /// when nothing regenerates, or when there is no distance left. The
    /// result is exact to the nanosecond, rounded up, then floored at
    /// `min_delay`.
    pub fn next_boundary_delay(
        &self,
        raw: RawEnergy,
        capacity: u64,
        regen_per_second: u64,
    ) -> Option<Duration> {
        if regen_per_second == 0 || raw >= RawEnergy::from_units(capacity) {
            return None;
        }

        let next_boundary = (raw.units() + 1).checked_mul(RawEnergy::SCALE)?;
        let distance = next_boundary
            .checked_sub(raw.get())
            .filter(|distance| *distance > 0)?;

        let nanos = (u128::from(distance) * NANOS_PER_SECOND).div_ceil(u128::from(regen_per_second));
        let delay = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        Some(delay.max(self.min_delay))
    }

    pub fn delay_for(&self, energy: &EnergyState) -> Option<Duration> {
        self.next_boundary_delay(energy.raw, energy.capacity, energy.regen_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: u64 = RawEnergy::SCALE;

    fn model() -> EnergyModel {
        EnergyModel::default()
    }

    /// Visible units after regenerating for `delay`.
    fn units_after(raw: u64, regen: u64, delay: Duration) -> u64 {
        let gained = u128::from(regen) * delay.as_nanos() / NANOS_PER_SECOND;
        ((u128::from(raw) + gained) / u128::from(SCALE)) as u64
    }

    #[test]
    fn full_or_stalled_energy_has_no_boundary() {
        let m = model();
        assert_eq!(m.next_boundary_delay(RawEnergy::from_units(100), 100, SCALE), None);
        assert_eq!(m.next_boundary_delay(RawEnergy::from_units(150), 100, SCALE), None);
        assert_eq!(m.next_boundary_delay(RawEnergy::from_units(10), 100, 0), None);
    }

    #[test]
    fn one_unit_per_second_from_a_fraction() {
        // 49.75 units at 1 unit/s: a quarter second to 50.
        let raw = RawEnergy(49 * SCALE + 750_000_000);
        let delay = model().next_boundary_delay(raw, 100, SCALE).unwrap();
        assert_eq!(delay, Duration::from_millis(250));
    }

    #[test]
    fn exactly_on_a_boundary_waits_a_full_unit() {
        let raw = RawEnergy::from_units(10);
        let delay = model().next_boundary_delay(raw, 100, SCALE / 4).unwrap();
        assert_eq!(delay, Duration::from_secs(4));
    }

    #[test]
    fn rounds_up_to_the_nanosecond() {
        // distance 1 raw unit at 3 raw units/s: 333_333_333.33ns, rounded up.
        let raw = RawEnergy(SCALE - 1);
        let m = EnergyModel::new(Duration::ZERO);
        let delay = m.next_boundary_delay(raw, 100, 3).unwrap();
        assert_eq!(delay, Duration::from_nanos(333_333_334));
    }

    #[test]
    fn short_delays_are_floored() {
        let raw = RawEnergy(SCALE - 1);
        let delay = model().next_boundary_delay(raw, 100, SCALE).unwrap();
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn delay_lands_exactly_on_the_next_unit() {
        let m = EnergyModel::new(Duration::ZERO);
        let regens = [1, 7, 333_333, SCALE / 3, SCALE, 2 * SCALE + 17];
        let raws = [0, 1, SCALE - 1, 5 * SCALE, 5 * SCALE + 123_456_789, 98 * SCALE + 999_999_999];

        for &regen in &regens {
            for &raw in &raws {
                let delay = m.next_boundary_delay(RawEnergy(raw), 100, regen).unwrap();
                assert!(delay > Duration::ZERO);

                let start = raw / SCALE;
                assert_eq!(units_after(raw, regen, delay), start + 1, "raw={raw} regen={regen}");

                // One nanosecond earlier is still short of the boundary.
                let earlier = delay - Duration::from_nanos(1);
                assert_eq!(units_after(raw, regen, earlier), start, "raw={raw} regen={regen}");
            }
        }
    }

    #[test]
    fn delay_for_reads_energy_state() {
        let energy = EnergyState {
            raw: RawEnergy::from_units(3),
            capacity: 10,
            regen_per_second: SCALE / 2,
            boosted: false,
        };
        assert_eq!(model().delay_for(&energy), Some(Duration::from_secs(2)));
    }
}
