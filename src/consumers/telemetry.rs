// src/consumers/telemetry.rs
//
// CSV telemetry frames from the flight computer.
//
// Field order (14 values):
//   x, y, z, roll, pitch, yaw, pressure, altitude,
//   raw_angle, filtered_angle, velocity, temperature, signal, battery

use serde::Serialize;

/// Number of comma-separated values in one telemetry frame.
pub const TELEMETRY_FIELDS: usize = 14;

/// Log one malformed frame out of this many.
const WARN_EVERY: u64 = 50;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TelemetrySample {
    // IMU
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    // Barometer
    pub pressure: f64,
    pub altitude: f64,
    // Kalman filter
    pub raw_angle: f64,
    pub filtered_angle: f64,
    // Link / power
    pub velocity: f64,
    pub temperature: f64,
    pub signal: f64,
    pub battery: f64,
}

impl TelemetrySample {
    fn from_values(v: [f64; TELEMETRY_FIELDS]) -> Self {
        TelemetrySample {
            x: v[0],
            y: v[1],
            z: v[2],
            roll: v[3],
            pitch: v[4],
            yaw: v[5],
            pressure: v[6],
            altitude: v[7],
            raw_angle: v[8],
            filtered_angle: v[9],
            velocity: v[10],
            temperature: v[11],
            signal: v[12],
            battery: v[13],
        }
    }
}

/// Counts occurrences and says when one should be logged.
#[derive(Clone, Debug)]
pub struct WarnThrottle {
    every: u64,
    count: u64,
}

impl WarnThrottle {
    pub fn new(every: u64) -> Self {
        WarnThrottle {
            every: every.max(1),
            count: 0,
        }
    }

    /// Record one occurrence. True on every `every`-th call.
    pub fn hit(&mut self) -> bool {
        self.count += 1;
        self.count % self.every == 0
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

pub struct TelemetryParser {
    throttle: WarnThrottle,
}

impl Default for TelemetryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryParser {
    pub fn new() -> Self {
        TelemetryParser {
            throttle: WarnThrottle::new(WARN_EVERY),
        }
    }

    /// Parse one line. Blank lines and lines with the wrong field count give
    /// `None`; a value that is not a number reads as 0.0.
    pub fn parse(&mut self, line: &str) -> Option<TelemetrySample> {
        if line.trim().is_empty() {
            return None;
        }

        let fields: Vec<&str> = line.split(',').filter(|f| !f.is_empty()).collect();
        if fields.len() != TELEMETRY_FIELDS {
            if self.throttle.hit() {
                tlog!(
                    "[telemetry] Expected {} CSV fields, got {} ({} malformed so far): {:?}",
                    TELEMETRY_FIELDS,
                    fields.len(),
                    self.throttle.count(),
                    line
                );
            }
            return None;
        }

        let mut values = [0.0; TELEMETRY_FIELDS];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.trim().parse().unwrap_or(0.0);
        }
        Some(TelemetrySample::from_values(values))
    }

    /// Lines rejected for a wrong field count.
    pub fn malformed(&self) -> u64 {
        self.throttle.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = "0.1,0.2,9.8,1.5,-2.0,180,1013.2,120.5,3.0,2.9,12.4,21.5,-70,3.9";

    #[test]
    fn test_full_frame() {
        let mut parser = TelemetryParser::new();
        let s = parser.parse(FRAME).unwrap();
        assert_eq!(s.z, 9.8);
        assert_eq!(s.yaw, 180.0);
        assert_eq!(s.altitude, 120.5);
        assert_eq!(s.filtered_angle, 2.9);
        assert_eq!(s.signal, -70.0);
        assert_eq!(s.battery, 3.9);
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        let mut parser = TelemetryParser::new();
        let line = FRAME.replace(',', ",,");
        assert_eq!(parser.parse(&line), parser.parse(FRAME));
    }

    #[test]
    fn test_bad_number_reads_zero() {
        let mut parser = TelemetryParser::new();
        let line = FRAME.replacen("9.8", "nan?", 1);
        let s = parser.parse(&line).unwrap();
        assert_eq!(s.z, 0.0);
        assert_eq!(s.x, 0.1);
    }

    #[test]
    fn test_blank_and_short_lines() {
        let mut parser = TelemetryParser::new();
        assert_eq!(parser.parse("   "), None);
        assert_eq!(parser.malformed(), 0);
        assert_eq!(parser.parse("1,2,3"), None);
        assert_eq!(parser.malformed(), 1);
    }

    #[test]
    fn test_throttle_fires_every_nth() {
        let mut throttle = WarnThrottle::new(50);
        let fired: Vec<u64> = (1..=120).filter(|_| throttle.hit()).collect();
        assert_eq!(fired.len(), 2);
        assert_eq!(throttle.count(), 120);
    }
}
