#![forbid(unsafe_code)]

//! Recompute triggers.
//!
//! Element resize observation, viewport resize, and the post-render hook all
//! funnel into one "recompute requested" event. The scheduler treats every
//! source the same way; the source is carried only for diagnostics.

/// Where a recompute request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// Initial observation when the container is attached.
    Attach,
    /// The grid's root element changed size.
    ElementResize,
    /// The browser viewport changed size.
    ViewportResize,
    /// A render pass finished; the tile count may have changed.
    PostUpdate,
}

impl TriggerSource {
    /// All trigger sources, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Attach,
        Self::ElementResize,
        Self::ViewportResize,
        Self::PostUpdate,
    ];

    /// Get the stable string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attach => "attach",
            Self::ElementResize => "element_resize",
            Self::ViewportResize => "viewport_resize",
            Self::PostUpdate => "post_update",
        }
    }

    /// Whether the request reflects a size change rather than a render pass.
    #[must_use]
    pub const fn is_resize(self) -> bool {
        matches!(self, Self::ElementResize | Self::ViewportResize)
    }
}

impl core::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
