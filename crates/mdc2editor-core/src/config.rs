use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub highlight: HighlightOptions,
    #[serde(default)]
    pub links: LinkOptions,
    #[serde(default)]
    pub components: ComponentOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub theme: ThemeConfig,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            theme: ThemeConfig::default(),
        }
    }
}

/// Highlight theme names. `dark` and `light` are emitted as CSS custom
/// properties next to the default color so a stylesheet can switch between them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThemeConfig {
    #[serde(default = "default_theme")]
    pub default: String,
    #[serde(default = "default_dark_theme")]
    pub dark: Option<String>,
    #[serde(default)]
    pub light: Option<String>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            default: default_theme(),
            dark: default_dark_theme(),
            light: None,
        }
    }
}

/// Attributes injected on links with an absolute `href`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkOptions {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_rel")]
    pub rel: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            target: default_target(),
            rel: default_rel(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentOptions {
    /// Component tags that render an image and map to the editor's image node.
    #[serde(default = "default_image_components")]
    pub image: Vec<String>,
}

impl Default for ComponentOptions {
    fn default() -> Self {
        Self {
            image: default_image_components(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_theme() -> String {
    "InspiredGitHub".to_string()
}

fn default_dark_theme() -> Option<String> {
    Some("base16-ocean.dark".to_string())
}

fn default_target() -> String {
    "_blank".to_string()
}

fn default_rel() -> String {
    "noopener noreferrer nofollow".to_string()
}

fn default_image_components() -> Vec<String> {
    vec!["prose-img".to_string()]
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn is_image_component(&self, tag: &str) -> bool {
        self.components.image.iter().any(|t| t == tag)
    }
}
