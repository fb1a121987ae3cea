use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest icon size the Finder will render in icon view.
pub const MIN_ICON_SIZE: u32 = 16;

/// Largest icon size the Finder will render in icon view.
pub const MAX_ICON_SIZE: u32 = 512;

/// A file placed in the disk image.
///
/// The coordinates are relative to the top left of the background image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub x: i32,
    pub y: i32,
    /// Path to the file, absolute or relative to the project file.
    pub file: String,
}

/// An alias placed in the disk image, typically a link to `/Applications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkEntry {
    pub x: i32,
    pub y: i32,
    /// Name shown under the icon.
    pub name: String,
    /// Target of the link on the machine that mounts the image.
    pub shortcut: String,
}

/// Position of the icon label relative to the icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    #[default]
    Bottom,
    Right,
}

impl TextPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextPosition::Bottom => "bottom",
            TextPosition::Right => "right",
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bottom" => Ok(TextPosition::Bottom),
            "right" => Ok(TextPosition::Right),
            other => Err(format!("unknown text position '{}' (expected bottom or right)", other)),
        }
    }
}

/// Output format of the disk image, passed to `hdiutil` verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DiskImageFormat {
    #[serde(rename = "UDRW")]
    Udrw,
    #[serde(rename = "UDRO")]
    Udro,
    #[serde(rename = "UDCO")]
    Udco,
    #[serde(rename = "UDZO")]
    Udzo,
    #[default]
    #[serde(rename = "UDBZ")]
    Udbz,
    #[serde(rename = "UFBI")]
    Ufbi,
    #[serde(rename = "UDRo")]
    UdroObsolete,
    #[serde(rename = "UDCo")]
    UdcoObsolete,
    #[serde(rename = "UDTO")]
    Udto,
    #[serde(rename = "UDxx")]
    Udxx,
    #[serde(rename = "UDSP")]
    Udsp,
    #[serde(rename = "UDSB")]
    Udsb,
    #[serde(rename = "RdWr")]
    RdWr,
    #[serde(rename = "Rdxx")]
    Rdxx,
    #[serde(rename = "ROCo")]
    RoCo,
    #[serde(rename = "Rken")]
    Rken,
    #[serde(rename = "DC42")]
    Dc42,
}

impl DiskImageFormat {
    /// Every supported format, in the order they are offered to the user.
    pub const ALL: [DiskImageFormat; 17] = [
        DiskImageFormat::Udrw,
        DiskImageFormat::Udro,
        DiskImageFormat::Udco,
        DiskImageFormat::Udzo,
        DiskImageFormat::Udbz,
        DiskImageFormat::Ufbi,
        DiskImageFormat::UdroObsolete,
        DiskImageFormat::UdcoObsolete,
        DiskImageFormat::Udto,
        DiskImageFormat::Udxx,
        DiskImageFormat::Udsp,
        DiskImageFormat::Udsb,
        DiskImageFormat::RdWr,
        DiskImageFormat::Rdxx,
        DiskImageFormat::RoCo,
        DiskImageFormat::Rken,
        DiskImageFormat::Dc42,
    ];

    /// The four character code understood by `hdiutil`.
    pub fn code(&self) -> &'static str {
        match self {
            DiskImageFormat::Udrw => "UDRW",
            DiskImageFormat::Udro => "UDRO",
            DiskImageFormat::Udco => "UDCO",
            DiskImageFormat::Udzo => "UDZO",
            DiskImageFormat::Udbz => "UDBZ",
            DiskImageFormat::Ufbi => "UFBI",
            DiskImageFormat::UdroObsolete => "UDRo",
            DiskImageFormat::UdcoObsolete => "UDCo",
            DiskImageFormat::Udto => "UDTO",
            DiskImageFormat::Udxx => "UDxx",
            DiskImageFormat::Udsp => "UDSP",
            DiskImageFormat::Udsb => "UDSB",
            DiskImageFormat::RdWr => "RdWr",
            DiskImageFormat::Rdxx => "Rdxx",
            DiskImageFormat::RoCo => "ROCo",
            DiskImageFormat::Rken => "Rken",
            DiskImageFormat::Dc42 => "DC42",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiskImageFormat::Udrw => "UDIF read/write image",
            DiskImageFormat::Udro => "UDIF read-only image",
            DiskImageFormat::Udco => "UDIF ADC-compressed image",
            DiskImageFormat::Udzo => "UDIF zlib-compressed image",
            DiskImageFormat::Udbz => "UDIF bzip2-compressed image (macOS 10.4+ only)",
            DiskImageFormat::Ufbi => "UDIF entire image with MD5 checksum",
            DiskImageFormat::UdroObsolete => "UDIF read-only (obsolete format)",
            DiskImageFormat::UdcoObsolete => "UDIF compressed (obsolete format)",
            DiskImageFormat::Udto => "DVD/CD-R master for export",
            DiskImageFormat::Udxx => "UDIF stub image",
            DiskImageFormat::Udsp => "SPARSE (grows with content)",
            DiskImageFormat::Udsb => "SPARSEBUNDLE (grows with content; bundle-backed)",
            DiskImageFormat::RdWr => "NDIF read/write image (deprecated)",
            DiskImageFormat::Rdxx => "NDIF read-only image (Disk Copy 6.3.3 format)",
            DiskImageFormat::RoCo => "NDIF compressed image (deprecated)",
            DiskImageFormat::Rken => "NDIF compressed (obsolete format)",
            DiskImageFormat::Dc42 => "Disk Copy 4.2 image",
        }
    }
}

impl fmt::Display for DiskImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DiskImageFormat {
    type Err = String;

    /// Codes are case sensitive: `UDRO` and `UDRo` are different formats.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        DiskImageFormat::ALL
            .iter()
            .copied()
            .find(|format| format.code() == code)
            .ok_or_else(|| format!("unknown disk image format '{}'", code))
    }
}

/// Spacing of the placement grid in pixels.
///
/// Persisted as a two element array, `gridsize = [20, 20]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(20, 20)
    }
}

impl From<[u32; 2]> for GridSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<GridSize> for [u32; 2] {
    fn from(size: GridSize) -> Self {
        [size.width, size.height]
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for GridSize {
    type Err = String;

    /// Accepts `20x20`, `20,20` or `20 20`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s
            .split(|c: char| c == 'x' || c == 'X' || c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect();

        match parts.as_slice() {
            [width, height] => {
                let width = width
                    .parse()
                    .map_err(|_| format!("invalid grid width '{}'", width))?;
                let height = height
                    .parse()
                    .map_err(|_| format!("invalid grid height '{}'", height))?;
                Ok(GridSize::new(width, height))
            }
            _ => Err(format!("invalid grid size '{}' (expected WIDTHxHEIGHT)", s)),
        }
    }
}

/// The layout of a disk image window and everything placed inside it.
///
/// This is the document that gets written to and read from a project file.
/// Field names match the keys used in the file; any key that is missing from
/// a file falls back to the value from [`Configuration::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Background image of the window.
    pub background: String,
    /// Icon shown for the mounted volume.
    pub icon: String,
    /// Output filename of the disk image.
    pub filename: String,
    /// Name of the volume when mounted.
    pub volumename: String,
    pub format: DiskImageFormat,
    pub iconsize: u32,
    pub gridsize: GridSize,
    pub snaptogrid: bool,
    pub snaptofeatures: bool,
    pub gridvisible: bool,
    pub iconsvisible: bool,
    /// Minimum area in px² for a detected feature to be used.
    pub featuresize: u32,
    pub detectfeatures: bool,
    /// Label size in points.
    pub textsize: u32,
    pub textposition: TextPosition,
    /// License template shown when the image is opened; empty for none.
    pub license: String,
    pub files: Vec<FileEntry>,
    pub symlinks: Vec<SymlinkEntry>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            background: String::new(),
            icon: String::new(),
            filename: String::new(),
            volumename: String::new(),
            format: DiskImageFormat::default(),
            iconsize: 128,
            gridsize: GridSize::default(),
            snaptogrid: false,
            snaptofeatures: true,
            gridvisible: false,
            iconsvisible: true,
            featuresize: 10000,
            detectfeatures: true,
            textsize: 12,
            textposition: TextPosition::default(),
            license: String::new(),
            files: Vec::new(),
            symlinks: Vec::new(),
        }
    }
}

impl Configuration {
    /// Check the invariants that every configuration must hold.
    ///
    /// Returns the offending key and a reason on failure.
    pub fn check_invariants(&self) -> Result<(), (&'static str, String)> {
        if !(MIN_ICON_SIZE..=MAX_ICON_SIZE).contains(&self.iconsize) {
            return Err((
                "iconsize",
                format!(
                    "icon size {} is outside {}..={}",
                    self.iconsize, MIN_ICON_SIZE, MAX_ICON_SIZE
                ),
            ));
        }

        if self.snaptogrid && self.gridsize.is_empty() {
            return Err((
                "gridsize",
                format!("grid size {} must be non-zero when snapping to the grid", self.gridsize),
            ));
        }

        Ok(())
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn total_symlinks(&self) -> usize {
        self.symlinks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::default();
        assert_eq!(config.iconsize, 128);
        assert_eq!(config.gridsize, GridSize::new(20, 20));
        assert_eq!(config.format, DiskImageFormat::Udbz);
        assert_eq!(config.featuresize, 10000);
        assert_eq!(config.textposition, TextPosition::Bottom);
        assert!(config.snaptofeatures);
        assert!(config.detectfeatures);
        assert!(!config.snaptogrid);
        assert!(config.check_invariants().is_ok());
    }

    #[test]
    fn test_format_codes_are_case_sensitive() {
        assert_eq!("UDRO".parse::<DiskImageFormat>().unwrap(), DiskImageFormat::Udro);
        assert_eq!(
            "UDRo".parse::<DiskImageFormat>().unwrap(),
            DiskImageFormat::UdroObsolete
        );
        assert!("udbz".parse::<DiskImageFormat>().is_err());
    }

    #[test]
    fn test_format_code_round_trip() {
        for format in DiskImageFormat::ALL {
            assert_eq!(format.code().parse::<DiskImageFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_grid_size_parsing() {
        assert_eq!("32x16".parse::<GridSize>().unwrap(), GridSize::new(32, 16));
        assert_eq!("8, 8".parse::<GridSize>().unwrap(), GridSize::new(8, 8));
        assert!("8".parse::<GridSize>().is_err());
        assert!("ax8".parse::<GridSize>().is_err());
    }

    #[test]
    fn test_icon_size_invariant() {
        let mut config = Configuration::default();
        config.iconsize = 8;
        assert_eq!(config.check_invariants().unwrap_err().0, "iconsize");

        config.iconsize = 513;
        assert!(config.check_invariants().is_err());

        config.iconsize = 512;
        assert!(config.check_invariants().is_ok());
    }

    #[test]
    fn test_grid_invariant_only_applies_when_snapping() {
        let mut config = Configuration::default();
        config.gridsize = GridSize::new(0, 10);
        assert!(config.check_invariants().is_ok());

        config.snaptogrid = true;
        assert_eq!(config.check_invariants().unwrap_err().0, "gridsize");
    }
}
