//! Screenshot persistence
//!
//! Picks a writable directory, names the file, and publishes the PNG
//! atomically:
//! - bytes are staged in a hidden temp file inside the target directory
//! - the temp file is renamed into place without clobbering (a reader never
//!   sees a half-written PNG, and an existing screenshot is never replaced)

use super::naming::{self, Clock, SystemClock, TimestampStyle};
use crate::capture::traits::RawImage;
use crate::utils::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Highest `_N` suffix tried before giving up on a name
pub const MAX_SUFFIX: u32 = 999;

/// What to do when the timestamped name is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionPolicy {
    /// Append `_1`, `_2`, ... before the extension
    #[default]
    Suffix,
    /// Fail with `NameCollision`
    Fail,
}

/// Resolved location of a saved screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTarget {
    pub directory: PathBuf,
    pub filename: String,
}

impl SaveTarget {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Sink configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SinkOptions {
    /// Filename prefix
    pub prefix: String,

    /// Used when the caller does not pass a directory
    pub preferred_dir: Option<PathBuf>,

    /// Fallback root (downloads/desktop equivalent)
    pub fallback_root: Option<PathBuf>,

    /// Created under the fallback root when the root itself is unusable
    pub fallback_subdir: String,

    pub timestamp_style: TimestampStyle,

    pub collision_policy: CollisionPolicy,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            prefix: "screenshot".to_string(),
            preferred_dir: None,
            fallback_root: default_fallback_root(),
            fallback_subdir: "Screenshots".to_string(),
            timestamp_style: TimestampStyle::default(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// Platform downloads directory, else desktop, else home
pub fn default_fallback_root() -> Option<PathBuf> {
    dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .or_else(dirs::home_dir)
}

/// Writes captures to disk
pub struct FileSink {
    options: SinkOptions,
    clock: Arc<dyn Clock>,
}

impl FileSink {
    pub fn new(options: SinkOptions) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: SinkOptions, clock: Arc<dyn Clock>) -> Self {
        Self { options, clock }
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    /// Save with the configured prefix
    pub fn save(&self, image: &RawImage, preferred_dir: Option<&Path>) -> Result<SaveTarget, CaptureError> {
        let prefix = self.options.prefix.clone();
        self.save_with_prefix(image, &prefix, preferred_dir)
    }

    pub fn save_with_prefix(
        &self,
        image: &RawImage,
        prefix: &str,
        preferred_dir: Option<&Path>,
    ) -> Result<SaveTarget, CaptureError> {
        let bytes = encode_png(image)?;

        let (directory, mut staged) = self.resolve_directory(preferred_dir)?;

        staged
            .write_all(&bytes)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| CaptureError::WriteFailed(format!("{}: {}", staged.path().display(), e)))?;

        let filename = naming::timestamped_filename(prefix, &self.clock.now(), self.options.timestamp_style);
        let target = self.publish(staged, directory, filename)?;

        tracing::info!(
            "Saved {}x{} screenshot to {:?} ({} bytes)",
            image.width,
            image.height,
            target.path(),
            bytes.len()
        );

        Ok(target)
    }

    /// First viable directory, with a staged temp file already open in it
    fn resolve_directory(&self, preferred_dir: Option<&Path>) -> Result<(PathBuf, NamedTempFile), CaptureError> {
        let mut rejected = Vec::new();

        let preferred = preferred_dir
            .map(Path::to_path_buf)
            .or_else(|| self.options.preferred_dir.clone());

        if let Some(dir) = preferred {
            match stage_in(&dir) {
                Ok(staged) => return Ok((dir, staged)),
                Err(e) => {
                    tracing::warn!("Preferred directory {:?} is not usable: {}", dir, e);
                    rejected.push(format!("{}: {}", dir.display(), e));
                }
            }
        }

        let Some(root) = self.options.fallback_root.clone() else {
            rejected.push("no fallback directory available".to_string());
            return Err(CaptureError::DirectoryUnavailable(rejected.join("; ")));
        };

        match stage_in(&root) {
            Ok(staged) => return Ok((root, staged)),
            Err(e) => {
                tracing::debug!("Fallback directory {:?} is not usable: {}", root, e);
                rejected.push(format!("{}: {}", root.display(), e));
            }
        }

        if self.options.fallback_subdir.is_empty() {
            return Err(CaptureError::DirectoryUnavailable(rejected.join("; ")));
        }

        let subdir = root.join(&self.options.fallback_subdir);
        let staged = fs::create_dir_all(&subdir)
            .and_then(|_| stage_in(&subdir))
            .map_err(|e| {
                rejected.push(format!("{}: {}", subdir.display(), e));
                CaptureError::DirectoryUnavailable(rejected.join("; "))
            })?;

        tracing::debug!("Saving into fallback subdirectory {:?}", subdir);
        Ok((subdir, staged))
    }

    /// Move the staged file to its final name without replacing anything
    fn publish(
        &self,
        mut staged: NamedTempFile,
        directory: PathBuf,
        filename: String,
    ) -> Result<SaveTarget, CaptureError> {
        let mut attempt = 0;

        loop {
            let candidate = if attempt == 0 {
                filename.clone()
            } else {
                naming::suffixed(&filename, attempt)
            };
            let path = directory.join(&candidate);

            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    return Ok(SaveTarget {
                        directory,
                        filename: candidate,
                    })
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    if self.options.collision_policy == CollisionPolicy::Fail || attempt >= MAX_SUFFIX {
                        tracing::warn!("Refusing to overwrite {:?}", path);
                        return Err(CaptureError::NameCollision(path));
                    }
                    staged = e.file;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(CaptureError::WriteFailed(format!("{}: {}", path.display(), e.error)));
                }
            }
        }
    }
}

/// Open a hidden temp file in `dir`; doubles as the writability check
fn stage_in(dir: &Path) -> io::Result<NamedTempFile> {
    if !dir.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not an existing directory"));
    }

    tempfile::Builder::new()
        .prefix(".quicksnap-")
        .suffix(".tmp")
        .tempfile_in(dir)
}

/// Encode an RGBA8 image as PNG
pub fn encode_png(image: &RawImage) -> Result<Vec<u8>, CaptureError> {
    if image.width == 0 || image.height == 0 {
        return Err(CaptureError::EncodeFailed(format!(
            "image has a zero dimension ({}x{})",
            image.width, image.height
        )));
    }

    if image.rgba.len() != image.expected_len() {
        return Err(CaptureError::EncodeFailed(format!(
            "buffer holds {} bytes, expected {} for {}x{} RGBA",
            image.rgba.len(),
            image.expected_len(),
            image.width,
            image.height
        )));
    }

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;
        writer
            .write_image_data(&image.rgba)
            .map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;
    use chrono::{DateTime, Duration, Local, TimeZone};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    /// Advances one second per call
    struct SteppingClock(Mutex<DateTime<Local>>);

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Local> {
            let mut next = self.0.lock();
            let now = *next;
            *next = now + Duration::seconds(1);
            now
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).single().unwrap()
    }

    fn options(root: &Path) -> SinkOptions {
        SinkOptions {
            fallback_root: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    fn sink(options: SinkOptions) -> FileSink {
        FileSink::with_clock(options, Arc::new(FixedClock(noon())))
    }

    fn png_dimensions(path: &Path) -> (u32, u32) {
        let decoder = png::Decoder::new(fs::File::open(path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        (info.width, info.height)
    }

    fn visible_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_saved_png_keeps_dimensions() {
        let dir = tempdir().unwrap();
        let image = RawImage::filled(37, 21, [10, 20, 30, 255]);

        let target = sink(options(dir.path())).save(&image, None).unwrap();

        assert_eq!(target.filename, "screenshot_20240309_120000.png");
        assert_eq!(png_dimensions(&target.path()), (37, 21));
    }

    #[test]
    fn test_preferred_directory_wins() {
        let root = tempdir().unwrap();
        let preferred = tempdir().unwrap();
        let image = RawImage::filled(4, 4, [0; 4]);

        let target = sink(options(root.path())).save(&image, Some(preferred.path())).unwrap();

        assert_eq!(target.directory, preferred.path());
        assert!(visible_files(root.path()).is_empty());
    }

    #[test]
    fn test_argument_overrides_configured_preference() {
        let root = tempdir().unwrap();
        let configured = tempdir().unwrap();
        let argument = tempdir().unwrap();
        let mut opts = options(root.path());
        opts.preferred_dir = Some(configured.path().to_path_buf());

        let sink = sink(opts);
        let image = RawImage::filled(4, 4, [0; 4]);

        let target = sink.save(&image, Some(argument.path())).unwrap();
        assert_eq!(target.directory, argument.path());

        let target = sink.save(&image, None).unwrap();
        assert_eq!(target.directory, configured.path());
    }

    #[test]
    fn test_unusable_preferred_falls_back_to_root() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let image = RawImage::filled(4, 4, [0; 4]);

        let target = sink(options(root.path())).save(&image, Some(&blocker)).unwrap();

        assert_eq!(target.directory, root.path());
    }

    #[test]
    fn test_missing_root_creates_subdirectory() {
        let base = tempdir().unwrap();
        let root = base.path().join("Downloads");
        let missing_preferred = base.path().join("nowhere");
        let image = RawImage::filled(4, 4, [0; 4]);

        let target = sink(options(&root)).save(&image, Some(&missing_preferred)).unwrap();

        assert_eq!(target.directory, root.join("Screenshots"));
        assert!(target.path().is_file());
        assert!(!missing_preferred.exists());
    }

    #[test]
    fn test_everything_unusable_is_directory_unavailable() {
        let base = tempdir().unwrap();
        let blocker = base.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        // Neither can be a directory: their parent is a regular file
        let preferred = blocker.join("preferred");
        let root = blocker.join("root");
        let image = RawImage::filled(4, 4, [0; 4]);

        let err = sink(options(&root)).save(&image, Some(&preferred)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DirectoryUnavailable);
        assert!(err.detail().contains("preferred"));
    }

    #[test]
    fn test_no_fallback_root_is_directory_unavailable() {
        let opts = SinkOptions {
            fallback_root: None,
            ..Default::default()
        };
        let err = sink(opts).save(&RawImage::filled(1, 1, [0; 4]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryUnavailable);
    }

    #[test]
    fn test_one_second_apart_gives_two_files() {
        let dir = tempdir().unwrap();
        let sink = FileSink::with_clock(options(dir.path()), Arc::new(SteppingClock(Mutex::new(noon()))));
        let image = RawImage::filled(2, 2, [0; 4]);

        let first = sink.save(&image, None).unwrap();
        let second = sink.save(&image, None).unwrap();

        assert_ne!(first.filename, second.filename);
        assert_eq!(
            visible_files(dir.path()),
            vec!["screenshot_20240309_120000.png", "screenshot_20240309_120001.png"]
        );
    }

    #[test]
    fn test_same_second_fails_under_strict_policy() {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.collision_policy = CollisionPolicy::Fail;
        let sink = sink(opts);

        let first = sink.save(&RawImage::filled(8, 8, [0; 4]), None).unwrap();
        let err = sink.save(&RawImage::filled(3, 3, [0; 4]), None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NameCollision);
        // The original file is untouched and no temp file lingers
        assert_eq!(png_dimensions(&first.path()), (8, 8));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_same_second_gets_suffix_by_default() {
        let dir = tempdir().unwrap();
        let sink = sink(options(dir.path()));
        let image = RawImage::filled(2, 2, [0; 4]);

        sink.save(&image, None).unwrap();
        let second = sink.save(&image, None).unwrap();
        let third = sink.save(&image, None).unwrap();

        assert_eq!(second.filename, "screenshot_20240309_120000_1.png");
        assert_eq!(third.filename, "screenshot_20240309_120000_2.png");
    }

    #[test]
    fn test_bad_buffer_is_encode_failure_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let image = RawImage::new(4, 4, vec![0; 10]);

        let err = sink(options(dir.path())).save(&image, None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_zero_sized_image_is_encode_failure() {
        let err = encode_png(&RawImage::new(0, 5, vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
    }

    #[test]
    fn test_custom_prefix() {
        let dir = tempdir().unwrap();
        let target = sink(options(dir.path()))
            .save_with_prefix(&RawImage::filled(2, 2, [0; 4]), "screenshot_display2", None)
            .unwrap();
        assert_eq!(target.filename, "screenshot_display2_20240309_120000.png");
    }
}
