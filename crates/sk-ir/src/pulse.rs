//! Tick (pulse) arithmetic.

/// Time position in MIDI pulses.
///
/// Signed so that replay offsets computed during song export and
/// deliberately corrupt deltas can be represented and detected.
pub type Pulse = i64;

/// Default pulses per quarter note for new sequences.
pub const DEFAULT_PPQN: u16 = 192;

/// Default beats per bar.
pub const DEFAULT_BEATS_PER_BAR: u8 = 4;

/// Default beat width (the denominator of the time signature).
pub const DEFAULT_BEAT_WIDTH: u8 = 4;

/// Round `tick` to the nearest multiple of `snap`, half-way values going up.
///
/// A non-positive `snap` returns `tick` unchanged.
pub fn snap_nearest(tick: Pulse, snap: Pulse) -> Pulse {
    if snap <= 0 {
        return tick;
    }
    let rem = tick.rem_euclid(snap);
    let base = tick - rem;
    if rem * 2 >= snap {
        base + snap
    } else {
        base
    }
}

/// Round `tick` down to a multiple of `snap`.
pub fn snap_down(tick: Pulse, snap: Pulse) -> Pulse {
    if snap <= 0 {
        return tick;
    }
    tick - tick.rem_euclid(snap)
}

/// `value mod length`, or `None` when `length` cannot be used as a modulus.
pub fn wrap(value: Pulse, length: Pulse) -> Option<Pulse> {
    (length > 0).then(|| value.rem_euclid(length))
}

/// Pulses in one measure for the given time signature.
pub fn measure_ticks(ppqn: u16, beats_per_bar: u8, beat_width: u8) -> Pulse {
    if beat_width == 0 {
        return 0;
    }
    ppqn as Pulse * 4 * beats_per_bar as Pulse / beat_width as Pulse
}

/// Scale a tick value by `factor`, rounding to the nearest pulse.
pub fn scale(tick: Pulse, factor: f64) -> Pulse {
    libm::round(tick as f64 * factor) as Pulse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_nearest_rounds_half_up() {
        assert_eq!(snap_nearest(0, 48), 0);
        assert_eq!(snap_nearest(23, 48), 0);
        assert_eq!(snap_nearest(24, 48), 48);
        assert_eq!(snap_nearest(70, 48), 48);
        assert_eq!(snap_nearest(72, 48), 96);
    }

    #[test]
    fn snap_with_zero_is_identity() {
        assert_eq!(snap_nearest(17, 0), 17);
        assert_eq!(snap_down(17, 0), 17);
    }

    #[test]
    fn wrap_guards_zero_length() {
        assert_eq!(wrap(250, 192), Some(58));
        assert_eq!(wrap(-10, 192), Some(182));
        assert_eq!(wrap(5, 0), None);
    }

    #[test]
    fn measure_ticks_common_signatures() {
        assert_eq!(measure_ticks(192, 4, 4), 768);
        assert_eq!(measure_ticks(192, 3, 4), 576);
        assert_eq!(measure_ticks(192, 6, 8), 576);
        assert_eq!(measure_ticks(192, 4, 0), 0);
    }

    #[test]
    fn scale_rounds() {
        assert_eq!(scale(100, 1.5), 150);
        assert_eq!(scale(3, 0.5), 2);
    }
}
