//! Typed keys layered over the string-keyed [`ConfigStore`].
use crate::config::{ConfigError, ConfigStore};
use std::fmt;

/// Font selection value for the bundled font.
pub const FONT_SELECTION_BUILTIN: &str = "Built-in";
/// Font selection value that requires [`ConfigKey::CustomFontFilePath`].
pub const FONT_SELECTION_CUSTOM: &str = "Custom";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Text,
    Path,
}

/// The configuration entries onboarding reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    UseBgraFormat,
    ForceConvertTexture,
    TextureUploadMode,
    UseCustomDriver,
    CustomDriverLibraryPath,
    UseLlvmCpu,
    FontFileSelection,
    CustomFontFilePath,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::UseBgraFormat,
        ConfigKey::ForceConvertTexture,
        ConfigKey::TextureUploadMode,
        ConfigKey::UseCustomDriver,
        ConfigKey::CustomDriverLibraryPath,
        ConfigKey::UseLlvmCpu,
        ConfigKey::FontFileSelection,
        ConfigKey::CustomFontFilePath,
    ];

    /// The dotted path of this entry in the store.
    pub fn path(self) -> &'static str {
        match self {
            ConfigKey::UseBgraFormat => "Video.Use_BGRA_Format",
            ConfigKey::ForceConvertTexture => "Video.Force_Convert_Texture",
            ConfigKey::TextureUploadMode => "Video.Texture_Upload_Mode",
            ConfigKey::UseCustomDriver => "Video.Vulkan.Use_Custom_Driver",
            ConfigKey::CustomDriverLibraryPath => "Video.Vulkan.Custom_Driver_Library_Path",
            ConfigKey::UseLlvmCpu => "Core.Use_LLVM_CPU",
            ConfigKey::FontFileSelection => "Miscellaneous.Font_File_Selection",
            ConfigKey::CustomFontFilePath => "Miscellaneous.Custom_Font_File_Path",
        }
    }

    /// The last path segment, e.g. `Use_BGRA_Format`.
    pub fn name(self) -> &'static str {
        let path = self.path();
        path.rsplit('.').next().unwrap_or(path)
    }

    pub fn kind(self) -> ValueKind {
        match self {
            ConfigKey::UseBgraFormat
            | ConfigKey::ForceConvertTexture
            | ConfigKey::UseCustomDriver => ValueKind::Bool,
            ConfigKey::CustomDriverLibraryPath | ConfigKey::CustomFontFilePath => ValueKind::Path,
            ConfigKey::TextureUploadMode | ConfigKey::UseLlvmCpu | ConfigKey::FontFileSelection => {
                ValueKind::Text
            }
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            ConfigKey::UseBgraFormat => "true",
            ConfigKey::ForceConvertTexture => "false",
            ConfigKey::TextureUploadMode => "Auto",
            ConfigKey::UseCustomDriver => "false",
            ConfigKey::CustomDriverLibraryPath => "",
            ConfigKey::UseLlvmCpu => "",
            ConfigKey::FontFileSelection => FONT_SELECTION_BUILTIN,
            ConfigKey::CustomFontFilePath => "",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl ConfigStore {
    /// Reads a typed entry, falling back to its declared default when absent.
    pub fn get(&self, key: ConfigKey) -> Result<String, ConfigError> {
        match self.load_entry(key.path()) {
            Ok(value) => Ok(value),
            Err(ConfigError::KeyNotFound(_)) => Ok(key.default_value().to_string()),
            Err(e) => Err(e),
        }
    }

    /// Reads a boolean entry. Anything other than `true` (case-insensitive) is `false`.
    pub fn get_bool(&self, key: ConfigKey) -> Result<bool, ConfigError> {
        Ok(self.get(key)?.eq_ignore_ascii_case("true"))
    }

    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        self.save_entry(key.path(), value)
    }

    pub fn set_bool(&mut self, key: ConfigKey, value: bool) -> Result<(), ConfigError> {
        self.save_entry(key.path(), if value { "true" } else { "false" })
    }
}
