//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::frame::Geometry;

/// Named geometry presets, largest first. `parse_geometry` walks this
/// for the `<name` / `>name` relative forms.
const GEOMETRY_PRESETS: &[(&str, Geometry)] = &[
    ("16cif", Geometry::new(1408, 1152)),
    ("xga", Geometry::new(1024, 768)),
    ("4cif", Geometry::new(704, 576)),
    ("vga", Geometry::new(640, 480)),
    ("cif", Geometry::new(352, 288)),
    ("qvga", Geometry::new(320, 240)),
    ("qcif", Geometry::new(176, 144)),
    ("sqcif", Geometry::new(128, 96)),
];

/// Fallback when a geometry string is unparseable.
const DEFAULT_GEOMETRY: Geometry = Geometry::new(352, 288);

/// Top-level configuration for one video session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capture device name handed to the backend probe list.
    pub device: String,
    /// Codec name for both directions.
    pub codec: String,
    /// Negotiated frame geometry: `WxH`, a preset name, or a
    /// relative form like `<cif` / `>qcif`.
    pub video_size: String,
    /// Capture geometry requested from the device; empty means same
    /// as `video_size`.
    pub camera_size: String,
    /// Target capture rate in frames per second.
    pub fps: u32,
    /// Encoder bitrate hint, bits per second.
    pub bitrate: u32,
    /// Encoder quality knob (lower is better).
    pub quality: u8,
    /// Largest fragment payload in bytes.
    pub mtu: usize,
    /// Whether to encode and send the captured stream.
    pub send_video: bool,
    /// Inbound ring size; clamped up to the minimum of 3.
    pub ring_slots: usize,
    /// Scheduler tick period in milliseconds.
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: "test".into(),
            codec: "zstd".into(),
            video_size: "cif".into(),
            camera_size: String::new(),
            fps: 15,
            bitrate: 65_000,
            quality: 3,
            mtu: 1400,
            send_video: true,
            ring_slots: 3,
            tick_ms: 50,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SessionConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Negotiated frame geometry.
    pub fn video_geometry(&self) -> Geometry {
        parse_geometry(&self.video_size)
    }

    /// Geometry requested from the capture device.
    pub fn camera_geometry(&self) -> Geometry {
        if self.camera_size.is_empty() {
            self.video_geometry()
        } else {
            parse_geometry(&self.camera_size)
        }
    }
}

// ── Geometry parsing ─────────────────────────────────────────────

/// Parse a geometry string.
///
/// Accepts `WxH` or a preset name, optionally prefixed with `<` or
/// `>`. A prefixed form picks the nearest preset strictly smaller or
/// larger than the anchor: `<352x288` gives QVGA, `>cif` gives VGA.
/// Relative forms clamp at the table ends. Anything unparseable falls
/// back to CIF.
pub fn parse_geometry(s: &str) -> Geometry {
    let s = s.trim();

    let (anchor, larger) = match s.as_bytes().first() {
        Some(b'<') => (&s[1..], Some(false)),
        Some(b'>') => (&s[1..], Some(true)),
        _ => (s, None),
    };

    if let Some(g) = parse_dimensions(anchor) {
        return match larger {
            None => g,
            Some(larger) => nearest_preset(g, larger),
        };
    }

    if let Some(i) = GEOMETRY_PRESETS
        .iter()
        .position(|(n, _)| n.eq_ignore_ascii_case(anchor))
    {
        let step = match larger {
            Some(false) => 1isize,
            Some(true) => -1,
            None => 0,
        };
        let i = (i as isize + step).clamp(0, GEOMETRY_PRESETS.len() as isize - 1);
        return GEOMETRY_PRESETS[i as usize].1;
    }

    warn!(size = s, "unknown video size, using {DEFAULT_GEOMETRY}");
    DEFAULT_GEOMETRY
}

fn parse_dimensions(s: &str) -> Option<Geometry> {
    let (w, h) = s.split_once(['x', 'X'])?;
    let (width, height) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    (width > 0 && height > 0).then_some(Geometry::new(width, height))
}

/// Nearest preset strictly smaller or larger than `anchor`, by width,
/// clamped to the ends of the table.
fn nearest_preset(anchor: Geometry, larger: bool) -> Geometry {
    let last = GEOMETRY_PRESETS.len() - 1;
    let i = if larger {
        match GEOMETRY_PRESETS
            .iter()
            .position(|(_, g)| g.width <= anchor.width)
        {
            Some(i) => i.saturating_sub(1),
            None => last,
        }
    } else {
        GEOMETRY_PRESETS
            .iter()
            .position(|(_, g)| g.width < anchor.width)
            .unwrap_or(last)
    };
    GEOMETRY_PRESETS[i].1
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.video_geometry(), Geometry::new(352, 288));
        assert_eq!(cfg.camera_geometry(), cfg.video_geometry());
        assert_eq!(cfg.fps, 15);
        assert_eq!(cfg.mtu, 1400);
    }

    #[test]
    fn roundtrip_config() {
        let cfg = SessionConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.video_size, "cif");
        assert_eq!(parsed.bitrate, 65_000);
    }

    #[test]
    fn explicit_dimensions() {
        assert_eq!(parse_geometry("640x480"), Geometry::new(640, 480));
        assert_eq!(parse_geometry(" 320X240 "), Geometry::new(320, 240));
    }

    #[test]
    fn preset_names() {
        assert_eq!(parse_geometry("sqcif"), Geometry::new(128, 96));
        assert_eq!(parse_geometry("QCIF"), Geometry::new(176, 144));
        assert_eq!(parse_geometry("16cif"), Geometry::new(1408, 1152));
    }

    #[test]
    fn relative_presets_step_and_clamp() {
        assert_eq!(parse_geometry("<cif"), Geometry::new(320, 240));
        assert_eq!(parse_geometry(">cif"), Geometry::new(640, 480));
        assert_eq!(parse_geometry("<sqcif"), Geometry::new(128, 96));
        assert_eq!(parse_geometry(">16cif"), Geometry::new(1408, 1152));
    }

    #[test]
    fn relative_dimensions_walk_the_preset_table() {
        assert_eq!(parse_geometry("<352x288"), Geometry::new(320, 240));
        assert_eq!(parse_geometry("<1024x768"), Geometry::new(704, 576));
        assert_eq!(parse_geometry(">352x288"), Geometry::new(640, 480));
        assert_eq!(parse_geometry(">1000x700"), Geometry::new(1024, 768));
        // Anchors off either end of the table clamp.
        assert_eq!(parse_geometry("<100x100"), Geometry::new(128, 96));
        assert_eq!(parse_geometry(">2000x2000"), Geometry::new(1408, 1152));
    }

    #[test]
    fn garbage_falls_back_to_cif() {
        assert_eq!(parse_geometry("huge"), Geometry::new(352, 288));
        assert_eq!(parse_geometry("0x0"), Geometry::new(352, 288));
        assert_eq!(parse_geometry(""), Geometry::new(352, 288));
    }
}
