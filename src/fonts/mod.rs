//! Font discovery shared by the PDF layout and the chart rasteriser.
//!
//! Bundled Roboto files are searched first (`ALERT_REPORT_FONTS_DIR`, `assets/fonts` next to the
//! executable, `assets/fonts` in the crate manifest directory). When none of those hold the full
//! family, a system family is used instead: an explicit `ALERT_REPORT_SYSTEM_FONTS_DIR`, the
//! Windows Arial family, or the Liberation Sans / DejaVu Sans families commonly installed on
//! Linux.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable pointing at a directory holding the bundled font files.
pub const FONTS_DIR_ENV: &str = "ALERT_REPORT_FONTS_DIR";

/// Environment variable pointing at a directory holding one of the system families.
pub const SYSTEM_FONTS_DIR_ENV: &str = "ALERT_REPORT_SYSTEM_FONTS_DIR";

const FONT_FILES: &[&str] = &[
    "Roboto-Regular.ttf",
    "Roboto-Bold.ttf",
    "Roboto-Italic.ttf",
    "Roboto-BoldItalic.ttf",
];

struct SystemFamily {
    name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
    directories: &'static [&'static str],
}

impl SystemFamily {
    fn files(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }

    fn complete_in(&self, directory: &Path) -> bool {
        self.files()
            .iter()
            .all(|file| directory.join(file).is_file())
    }
}

const SYSTEM_FAMILIES: &[SystemFamily] = &[
    SystemFamily {
        name: "Arial",
        regular: "arial.ttf",
        bold: "arialbd.ttf",
        italic: "ariali.ttf",
        bold_italic: "arialbi.ttf",
        directories: &[],
    },
    SystemFamily {
        name: "Liberation Sans",
        regular: "LiberationSans-Regular.ttf",
        bold: "LiberationSans-Bold.ttf",
        italic: "LiberationSans-Italic.ttf",
        bold_italic: "LiberationSans-BoldItalic.ttf",
        directories: &[
            "/usr/share/fonts/truetype/liberation",
            "/usr/share/fonts/truetype/liberation2",
            "/usr/share/fonts/liberation-sans",
            "/usr/share/fonts/TTF",
        ],
    },
    SystemFamily {
        name: "DejaVu Sans",
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
        directories: &[
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/dejavu",
            "/usr/share/fonts/TTF",
        ],
    },
];

/// Location of a complete font family on disk.
enum FontSource {
    Bundled(PathBuf),
    System {
        family: &'static SystemFamily,
        directory: PathBuf,
    },
}

impl FontSource {
    fn regular_path(&self) -> PathBuf {
        match self {
            Self::Bundled(directory) => directory.join(FONT_FILES[0]),
            Self::System { family, directory } => directory.join(family.regular),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Bundled(directory) => format!(
                "bundled '{}' family in {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display()
            ),
            Self::System { family, directory } => {
                format!("system '{}' family in {}", family.name, directory.display())
            }
        }
    }

    fn load_family(&self) -> Result<FontFamily<FontData>, Error> {
        match self {
            Self::Bundled(directory) => fonts::from_files(directory, DEFAULT_FONT_FAMILY_NAME, None)
                .map_err(|err| {
                    Error::new(
                        format!(
                            "Failed to load default font family '{}' from {}: {}",
                            DEFAULT_FONT_FAMILY_NAME,
                            directory.display(),
                            err
                        ),
                        io::Error::new(io::ErrorKind::Other, err.to_string()),
                    )
                }),
            Self::System { family, directory } => Ok(FontFamily {
                regular: load_system_font(directory, family.regular, "regular")?,
                bold: load_system_font(directory, family.bold, "bold")?,
                italic: load_system_font(directory, family.italic, "italic")?,
                bold_italic: load_system_font(directory, family.bold_italic, "bold italic")?,
            }),
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

/// Directory holding the fonts that ship with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            let candidate = bin_dir.join("assets/fonts");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    let manifest_candidate = bundled_fonts_source_dir();
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<PathBuf> {
    FONT_FILES
        .iter()
        .map(|name| path.join(name))
        .filter(|candidate| !candidate.is_file())
        .collect()
}

fn resolve_bundled_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            format!("directory missing at {}", candidate.display())
        } else {
            let missing_list = missing
                .iter()
                .map(|path| path.file_name().unwrap_or_default().to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ");
            format!("missing files [{}]", missing_list)
        };

        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    let summary = if attempts.is_empty() {
        "no search paths were available".to_owned()
    } else {
        attempts.join(", ")
    };

    Err(Error::new(
        format!(
            "Unable to locate bundled font directory. Checked: {}. Copy the Roboto family to assets/fonts or set {}.",
            summary, FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "bundled fonts directory not found"),
    ))
}

fn system_directories(family: &SystemFamily) -> Vec<PathBuf> {
    let mut directories = Vec::new();

    if let Some(path) = env_path(SYSTEM_FONTS_DIR_ENV) {
        directories.push(path);
    }

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env_path(var) {
                directories.push(root.join("Fonts"));
            }
        }
    }

    // An explicit override disables the well-known locations.
    if env_path(SYSTEM_FONTS_DIR_ENV).is_none() {
        directories.extend(family.directories.iter().map(PathBuf::from));
    }

    directories
}

fn resolve_system_family() -> Option<FontSource> {
    SYSTEM_FAMILIES.iter().find_map(|family| {
        system_directories(family)
            .into_iter()
            .find(|directory| family.complete_in(directory))
            .map(|directory| FontSource::System { family, directory })
    })
}

fn resolve_font_source() -> Result<FontSource, Error> {
    match resolve_bundled_directory() {
        Ok(directory) => Ok(FontSource::Bundled(directory)),
        Err(err) => match resolve_system_family() {
            Some(source) => {
                warn!(
                    "Bundled fonts unavailable ({}); falling back to {}.",
                    err,
                    source.describe()
                );
                Ok(source)
            }
            None => {
                warn!("Bundled fonts unavailable ({}); no system fallback found", err);
                Err(Error::new(
                    format!("Bundled fonts unavailable and no system fallback found: {}", err),
                    io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
                ))
            }
        },
    }
}

fn load_system_font(directory: &Path, file: &str, style: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        let io_kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!(
                "Failed to load fallback {} font at {}: {}",
                style,
                path.display(),
                err
            ),
            io::Error::new(io_kind, err.to_string()),
        )
    })
}

/// Returns `true` when `err` reports fonts that are absent or unreadable rather than corrupt.
pub fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the bundled Roboto font family, or the first complete system family when the bundled
/// files are missing.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let source = resolve_font_source()?;
    debug!("Loading document fonts from {}", source.describe());
    source.load_family()
}

/// Returns the raw bytes of the regular face of the default family, for the chart rasteriser.
pub fn regular_font_bytes() -> Result<Vec<u8>, Error> {
    let source = resolve_font_source()?;
    let path = source.regular_path();
    fs::read(&path).map_err(|err| {
        Error::new(
            format!("Failed to read chart font {}", path.display()),
            err,
        )
    })
}

/// Indicates whether a complete font family (bundled or system) can be located.
pub fn default_fonts_available() -> bool {
    resolve_bundled_directory().is_ok() || resolve_system_family().is_some()
}
