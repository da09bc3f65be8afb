#![forbid(unsafe_code)]
//! Shell regions.
//!
//! The shell is a fixed tree of eight named regions. Two of them (the main
//! and bottom panels) host dock layouts that users rearrange; the rest are
//! simple ordered containers (bars and sidebars).
//!
//! Every region has a stable pseudo-URI so that widget factories can claim a
//! region the same way they claim document URIs.

use serde::{Deserialize, Serialize};
use std::fmt;
use wharf_core::Uri;

/// Named region of the application shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Area {
    /// Horizontal strip across the top of the window.
    TopBar,
    /// Narrow vertical strip on the far left.
    ActivityBar,
    /// Collapsible panel between the activity bar and the main panel.
    PrimarySidebar,
    /// Central dock panel. Always visible.
    Main,
    /// Collapsible panel right of the main panel.
    SecondarySidebar,
    /// Dock panel below the main panel. Hidden until populated.
    Bottom,
    /// Horizontal strip across the bottom of the window.
    StatusBar,
    /// Narrow vertical strip on the far right.
    RightBar,
}

impl Area {
    /// Every region, in rendering order.
    pub const ALL: [Area; 8] = [
        Area::TopBar,
        Area::ActivityBar,
        Area::PrimarySidebar,
        Area::Main,
        Area::SecondarySidebar,
        Area::Bottom,
        Area::StatusBar,
        Area::RightBar,
    ];

    /// Stable identifier used in logs and region URIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Area::TopBar => "top-bar",
            Area::ActivityBar => "activity-bar",
            Area::PrimarySidebar => "primary-sidebar",
            Area::Main => "main",
            Area::SecondarySidebar => "secondary-sidebar",
            Area::Bottom => "bottom",
            Area::StatusBar => "status-bar",
            Area::RightBar => "right-bar",
        }
    }

    /// Pseudo-URI for the region itself, used to resolve region content
    /// widgets through the ordinary factory machinery.
    #[must_use]
    pub fn uri(self) -> Uri {
        Uri::from_path("wharf", &format!("/panel/{}", self.as_str()))
    }

    /// Whether the region hosts a rearrangeable dock layout.
    #[must_use]
    pub const fn is_dock(self) -> bool {
        matches!(self, Area::Main | Area::Bottom)
    }

    /// Whether the region is a collapsible sidebar.
    #[must_use]
    pub const fn is_sidebar(self) -> bool {
        matches!(self, Area::PrimarySidebar | Area::SecondarySidebar)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_uris_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for area in Area::ALL {
            assert!(seen.insert(area.uri().to_string()));
        }
    }

    #[test]
    fn dock_and_sidebar_partition() {
        for area in Area::ALL {
            assert!(!(area.is_dock() && area.is_sidebar()));
        }
        assert!(Area::Main.is_dock());
        assert!(Area::Bottom.is_dock());
        assert!(Area::PrimarySidebar.is_sidebar());
        assert!(Area::SecondarySidebar.is_sidebar());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Area::PrimarySidebar).unwrap();
        assert_eq!(json, "\"primary-sidebar\"");
        let back: Area = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Area::PrimarySidebar);
    }
}
