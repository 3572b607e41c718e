use rover_core::control::{Asset, AssetSource};

/// Operator UI bundled into the emulator binary.
pub struct EmulatorAssets;

impl AssetSource for EmulatorAssets {
    fn body(&self, asset: Asset) -> &str {
        match asset {
            Asset::Page => include_str!("../../ui/index.html"),
            Asset::Stylesheet => include_str!("../../ui/style.css"),
            Asset::Script => include_str!("../../ui/script.js"),
        }
    }
}
