//! Resolution Catalog
//!
//! Static table of named width x height presets matching social-platform
//! formats. The set is fixed at process start; consumers go through [`find`]
//! and [`all`] only, so extending the catalog means adding one table row.

/// A named target resolution for one exported slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionPreset {
    /// Stable identifier, stored in frame metadata and sent over the wire.
    pub key: &'static str,
    /// Slide width in pixels.
    pub width: u32,
    /// Slide height in pixels.
    pub height: u32,
    /// Human-readable name for UI display.
    pub display_name: &'static str,
}

impl ResolutionPreset {
    /// Formatted as "Name (WxH)" for notices and reports.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} ({}x{})", self.display_name, self.width, self.height)
    }
}

/// The presets offered by the plugin, in display order.
const PRESETS: [ResolutionPreset; 4] = [
    ResolutionPreset {
        key: "square",
        width: 1080,
        height: 1080,
        display_name: "Square 1:1",
    },
    ResolutionPreset {
        key: "portrait",
        width: 1080,
        height: 1350,
        display_name: "Portrait 4:5",
    },
    ResolutionPreset {
        key: "story",
        width: 1080,
        height: 1920,
        display_name: "Story 9:16",
    },
    ResolutionPreset {
        key: "landscape",
        width: 1920,
        height: 1080,
        display_name: "Landscape 16:9",
    },
];

/// All known presets, in display order.
#[must_use]
pub fn all() -> &'static [ResolutionPreset] {
    &PRESETS
}

/// Look up a preset by its stable key.
#[must_use]
pub fn find(key: &str) -> Option<&'static ResolutionPreset> {
    PRESETS.iter().find(|p| p.key == key)
}
