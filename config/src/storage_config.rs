use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use std::{
    path::PathBuf,
    str::FromStr as _,
    time::Duration,
};
use strum::{
    Display,
    EnumIter,
    EnumString,
};

pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024 * 1024;
pub const DEFAULT_WRITE_STOP_TIMEOUT: Duration = Duration::from_secs(180);

/// Compression codec applied to every column of a written unit.
#[derive(Debug, Default, Clone, Copy, Display, EnumIter, EnumString, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Compression {
    #[default]
    Snappy,
    Gzip,
    Lz4,
    Zstd,
    #[strum(to_string = "none", serialize = "uncompressed")]
    #[serde(rename = "none")]
    None,
}

impl Compression {
    /// Unknown codec names fall back to the default instead of failing the load.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            return Self::default();
        }
        Self::from_str(name).unwrap_or_else(|_| {
            warn!(compression = name, fallback = %Self::default(), "Unknown compression, using fallback");
            Self::default()
        })
    }
}

impl<'de> Deserialize<'de> for Compression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name.as_deref().map(Self::from_name).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Root of the `year=/month=/day=/app=` hierarchy.
    #[serde(default)]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub compression: Compression,

    /// Maximum number of rows buffered per row group.
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,

    /// Upper bound for flushing the last row group and writing the footer.
    #[serde(default = "default_write_stop_timeout", with = "crate::duration")]
    pub write_stop_timeout: Duration,
}

fn default_row_group_size() -> usize {
    DEFAULT_ROW_GROUP_SIZE
}

fn default_write_stop_timeout() -> Duration {
    DEFAULT_WRITE_STOP_TIMEOUT
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            compression: Compression::default(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            write_stop_timeout: DEFAULT_WRITE_STOP_TIMEOUT,
        }
    }
}
