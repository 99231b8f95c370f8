//! Texture sampling options and their two-level resolution
//!
//! A call site may pass a partial [`TextureOptionsOverride`]. Any field it
//! leaves unset falls back to the cache's default overrides, and any field
//! both leave unset falls back to [`TextureOptions::default`].

/// Filtering applied when sampling a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Disable mipmapping. Only meaningful as a mipmap filter
    MipmapNone,
    /// Blocky interpolation, suited to pixel art
    Nearest,
    /// Smooth interpolation
    Linear,
}

/// Behaviour for texture coordinates outside `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    RepeatMirrored,
}

/// Fully resolved texture options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureOptions {
    pub generate_mipmaps: bool,
    pub min_filter: FilterKind,
    pub mag_filter: FilterKind,
    pub mipmap_filter: FilterKind,
    pub address_mode_x: AddressMode,
    pub address_mode_y: AddressMode,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            generate_mipmaps: false,
            min_filter: FilterKind::Linear,
            mag_filter: FilterKind::Linear,
            mipmap_filter: FilterKind::MipmapNone,
            address_mode_x: AddressMode::ClampToEdge,
            address_mode_y: AddressMode::ClampToEdge,
        }
    }
}

/// A partial set of texture options
///
/// `None` means "not specified here", not "disabled".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextureOptionsOverride {
    pub generate_mipmaps: Option<bool>,
    pub min_filter: Option<FilterKind>,
    pub mag_filter: Option<FilterKind>,
    pub mipmap_filter: Option<FilterKind>,
    pub address_mode_x: Option<AddressMode>,
    pub address_mode_y: Option<AddressMode>,
}

impl TextureOptionsOverride {
    /// An override that specifies nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate_mipmaps(mut self, generate: bool) -> Self {
        self.generate_mipmaps = Some(generate);
        self
    }

    pub fn with_min_filter(mut self, filter: FilterKind) -> Self {
        self.min_filter = Some(filter);
        self
    }

    pub fn with_mag_filter(mut self, filter: FilterKind) -> Self {
        self.mag_filter = Some(filter);
        self
    }

    pub fn with_mipmap_filter(mut self, filter: FilterKind) -> Self {
        self.mipmap_filter = Some(filter);
        self
    }

    pub fn with_address_mode_x(mut self, mode: AddressMode) -> Self {
        self.address_mode_x = Some(mode);
        self
    }

    pub fn with_address_mode_y(mut self, mode: AddressMode) -> Self {
        self.address_mode_y = Some(mode);
        self
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<TextureOptions> for TextureOptionsOverride {
    fn from(options: TextureOptions) -> Self {
        Self {
            generate_mipmaps: Some(options.generate_mipmaps),
            min_filter: Some(options.min_filter),
            mag_filter: Some(options.mag_filter),
            mipmap_filter: Some(options.mipmap_filter),
            address_mode_x: Some(options.address_mode_x),
            address_mode_y: Some(options.address_mode_y),
        }
    }
}

/// Stateless resolver merging call-site options over defaults
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionsResolver;

impl OptionsResolver {
    /// Resolve each field from `caller`, then `defaults`, then the fixed table
    pub fn resolve(
        caller: Option<&TextureOptionsOverride>,
        defaults: &TextureOptionsOverride,
    ) -> TextureOptions {
        let caller = caller.copied().unwrap_or_default();
        let fixed = TextureOptions::default();

        TextureOptions {
            generate_mipmaps: caller
                .generate_mipmaps
                .or(defaults.generate_mipmaps)
                .unwrap_or(fixed.generate_mipmaps),
            min_filter: caller
                .min_filter
                .or(defaults.min_filter)
                .unwrap_or(fixed.min_filter),
            mag_filter: caller
                .mag_filter
                .or(defaults.mag_filter)
                .unwrap_or(fixed.mag_filter),
            mipmap_filter: caller
                .mipmap_filter
                .or(defaults.mipmap_filter)
                .unwrap_or(fixed.mipmap_filter),
            address_mode_x: caller
                .address_mode_x
                .or(defaults.address_mode_x)
                .unwrap_or(fixed.address_mode_x),
            address_mode_y: caller
                .address_mode_y
                .or(defaults.address_mode_y)
                .unwrap_or(fixed.address_mode_y),
        }
    }
}
