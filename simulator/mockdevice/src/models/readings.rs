//! Per-tick payload generation.
//!
//! Everything here is a pure function of `(tick, kind)`; nothing is cached
//! between ticks.

use crate::error::SimulatorResult;
use crate::models::types::{
    AlarmChannels, AlarmReading, AlertStatus, DeviceKind, Envelope, GenericReading, Payload,
    ReadingGroups,
};

pub const GENERIC_READING_COUNT: usize = 15;

/// `component = tick * 100 + offset`
pub const GENERIC_OFFSETS: [u32; GENERIC_READING_COUNT] =
    [1, 2, 5, 6, 4, 12, 17, 13, 24, 23, 25, 26, 27, 27, 27];

/// `id = tick + delta`
pub const GENERIC_ID_DELTAS: [u32; GENERIC_READING_COUNT] =
    [1, 0, 0, 0, 1, 1, 1, 2, 2, 3, 4, 3, 4, 10, 12];

pub const GENERIC_KIND_CODES: [u32; GENERIC_READING_COUNT] =
    [50, 53, 52, 51, 54, 54, 55, 56, 57, 55, 50, 52, 51, 52, 53];

pub fn generic_readings(tick: u32) -> Vec<GenericReading> {
    GENERIC_OFFSETS
        .iter()
        .zip(GENERIC_ID_DELTAS.iter())
        .zip(GENERIC_KIND_CODES.iter())
        .map(|((offset, delta), kind)| GenericReading {
            id: tick + delta,
            component: tick * 100 + offset,
            kind: *kind,
        })
        .collect()
}

fn safe(id: u32, component: u32, value: u32) -> AlarmReading {
    AlarmReading { id, component, value, alert: AlertStatus::Safe }
}

/// Static alarm fixture; tick progression does not change it.
pub fn alarm_fixture() -> AlarmChannels {
    AlarmChannels {
        fire: vec![safe(0, 8, 460)],
        smoke: vec![
            safe(0, 0, 120),
            safe(0, 1, 240),
            safe(1, 0, 120),
            safe(2, 0, 120),
            safe(0, 0, 120),
        ],
        co: vec![safe(0, 4, 460), safe(1, 4, 460)],
        heat: vec![safe(2, 2, 460), safe(3, 2, 460)],
        fire_button: vec![safe(1, 10, 1)],
        lpg: vec![safe(1, 6, 20)],
    }
}

pub fn reading_groups(kind: DeviceKind, tick: u32) -> ReadingGroups {
    match kind {
        DeviceKind::Generic => ReadingGroups::Generic { data: generic_readings(tick) },
        DeviceKind::Alarm => ReadingGroups::Alarm(alarm_fixture()),
        DeviceKind::Unconfigured => ReadingGroups::Empty {},
    }
}

pub fn build_envelope(kind_tag: &str, token: &str, kind: DeviceKind, tick: u32) -> Envelope {
    Envelope {
        kind: kind_tag.to_string(),
        payload: Payload {
            token: token.to_string(),
            body: reading_groups(kind, tick),
        },
    }
}

/// Compact UTF-8 JSON, as published on the wire.
pub fn encode(env: &Envelope) -> SimulatorResult<Vec<u8>> {
    Ok(serde_json::to_vec(env)?)
}
