use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub type GraphicsSettings = BTreeMap<GraphicsSetting, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub branch: Branch,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_graphics", deserialize_with = "known_graphics")]
    pub graphics_settings: GraphicsSettings,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            branch: Branch::default(),
            debug_mode: false,
            graphics_settings: default_graphics(),
        }
    }
}

impl Profile {
    /// Current value for `setting`, falling back to the setting's default.
    pub fn graphics_value(&self, setting: GraphicsSetting) -> &str {
        self.graphics_settings
            .get(&setting)
            .map(|value| value.as_str())
            .unwrap_or_else(|| setting.default_value())
    }

    pub fn fill_missing_graphics(&mut self) {
        for setting in GraphicsSetting::ALL {
            self.graphics_settings
                .entry(setting)
                .or_insert_with(|| setting.default_value().to_string());
        }
    }
}

/// Keeps the recognized settings with string values. Hand-added keys such as
/// `MotionBlur` are dropped instead of failing the whole store.
fn known_graphics<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GraphicsSettings, D::Error> {
    let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let setting = GraphicsSetting::parse(&key)?;
            let value = value.as_str()?.to_string();
            Some((setting, value))
        })
        .collect())
}

fn default_graphics() -> GraphicsSettings {
    GraphicsSetting::ALL
        .iter()
        .map(|setting| (*setting, setting.default_value().to_string()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Release,
    Rc,
    Dev,
}

impl Default for Branch {
    fn default() -> Self {
        Branch::Release
    }
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Release, Branch::Rc, Branch::Dev];

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::Release => "release",
            Branch::Rc => "rc",
            Branch::Dev => "dev",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "release" => Some(Branch::Release),
            "rc" => Some(Branch::Rc),
            "dev" => Some(Branch::Dev),
            _ => None,
        }
    }

    pub fn cycle(self, forward: bool) -> Self {
        let index = Branch::ALL
            .iter()
            .position(|branch| *branch == self)
            .unwrap_or(0);
        Branch::ALL[step_index(index, Branch::ALL.len(), forward)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GraphicsSetting {
    TextureQuality,
    ShaderQuality,
    ShadowQuality,
    ReflectionQuality,
    WaterQuality,
    GrassQuality,
    AnisotropicFiltering,
    AmbientOcclusion,
    AntiAliasing,
    VSync,
}

const QUALITY_3: &[&str] = &["Normal", "High", "Very High"];
const QUALITY_4: &[&str] = &["Normal", "High", "Very High", "Ultra"];

impl GraphicsSetting {
    pub const ALL: [GraphicsSetting; 10] = [
        GraphicsSetting::TextureQuality,
        GraphicsSetting::ShaderQuality,
        GraphicsSetting::ShadowQuality,
        GraphicsSetting::ReflectionQuality,
        GraphicsSetting::WaterQuality,
        GraphicsSetting::GrassQuality,
        GraphicsSetting::AnisotropicFiltering,
        GraphicsSetting::AmbientOcclusion,
        GraphicsSetting::AntiAliasing,
        GraphicsSetting::VSync,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GraphicsSetting::TextureQuality => "TextureQuality",
            GraphicsSetting::ShaderQuality => "ShaderQuality",
            GraphicsSetting::ShadowQuality => "ShadowQuality",
            GraphicsSetting::ReflectionQuality => "ReflectionQuality",
            GraphicsSetting::WaterQuality => "WaterQuality",
            GraphicsSetting::GrassQuality => "GrassQuality",
            GraphicsSetting::AnisotropicFiltering => "AnisotropicFiltering",
            GraphicsSetting::AmbientOcclusion => "AmbientOcclusion",
            GraphicsSetting::AntiAliasing => "AntiAliasing",
            GraphicsSetting::VSync => "VSync",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GraphicsSetting::TextureQuality => "Texture Quality",
            GraphicsSetting::ShaderQuality => "Shader Quality",
            GraphicsSetting::ShadowQuality => "Shadow Quality",
            GraphicsSetting::ReflectionQuality => "Reflection Quality",
            GraphicsSetting::WaterQuality => "Water Quality",
            GraphicsSetting::GrassQuality => "Grass Quality",
            GraphicsSetting::AnisotropicFiltering => "Anisotropic Filtering",
            GraphicsSetting::AmbientOcclusion => "Ambient Occlusion",
            GraphicsSetting::AntiAliasing => "Anti-Aliasing",
            GraphicsSetting::VSync => "VSync",
        }
    }

    /// Case-insensitive lookup by key name.
    pub fn parse(value: &str) -> Option<Self> {
        let needle = value.trim();
        GraphicsSetting::ALL
            .into_iter()
            .find(|setting| setting.as_str().eq_ignore_ascii_case(needle))
    }

    pub fn options(self) -> &'static [&'static str] {
        match self {
            GraphicsSetting::TextureQuality
            | GraphicsSetting::ShaderQuality
            | GraphicsSetting::WaterQuality => QUALITY_3,
            GraphicsSetting::ShadowQuality
            | GraphicsSetting::ReflectionQuality
            | GraphicsSetting::GrassQuality => QUALITY_4,
            GraphicsSetting::AnisotropicFiltering => &["Off", "x2", "x4", "x8", "x16"],
            GraphicsSetting::AmbientOcclusion => &["Off", "High", "Very High"],
            GraphicsSetting::AntiAliasing => &["Off", "FXAA", "MSAA x2", "MSAA x4", "MSAA x8"],
            GraphicsSetting::VSync => &["Off", "On", "Half"],
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            GraphicsSetting::AnisotropicFiltering => "x16",
            GraphicsSetting::AntiAliasing => "FXAA",
            GraphicsSetting::VSync => "On",
            _ => "High",
        }
    }

    /// Matches `value` against the option list, returning the canonical spelling.
    pub fn canonical_option(self, value: &str) -> Option<&'static str> {
        let needle = value.trim();
        self.options()
            .iter()
            .copied()
            .find(|option| option.eq_ignore_ascii_case(needle))
    }

    /// Next (or previous) option after `current`. Values outside the option
    /// list restart from the first option.
    pub fn cycle(self, current: &str, forward: bool) -> &'static str {
        let options = self.options();
        match options.iter().position(|option| *option == current) {
            Some(index) => options[step_index(index, options.len(), forward)],
            None => options[0],
        }
    }
}

fn step_index(index: usize, len: usize, forward: bool) -> usize {
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}
