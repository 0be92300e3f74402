// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now_ms();
    let b = clock.now_ms();
    assert!(b >= a);
}

#[test]
fn fixed_clock_is_pinned() {
    let clock = FixedClock::at_ms(1_700_000_000_000);
    assert_eq!(clock.now_ms(), 1_700_000_000_000);
    assert_eq!(clock.now_ms(), 1_700_000_000_000);
}

#[test]
fn fixed_clock_advance() {
    let clock = FixedClock::at_ms(1_000);
    clock.advance_ms(500);
    assert_eq!(clock.now_ms(), 1_500);
    clock.advance_ms(500);
    assert_eq!(clock.now().timestamp_millis(), 2_000);
}

#[test]
fn clock_source_by_reference() {
    fn takes_clock<C: ClockSource>(c: C) -> u64 {
        c.now_ms()
    }

    let clock = FixedClock::at_ms(42);
    assert_eq!(takes_clock(&clock), 42);
}
