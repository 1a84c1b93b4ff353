use std::path::{Path, PathBuf};

/// A struct that contains a temporary directory and a path to a file in that directory.
pub struct TempFixture {
    _temp_dir: tempfile::TempDir,
    temp_path: PathBuf,
}

impl TempFixture {
    /// Creates a copy of the test file in a temporary directory.
    /// Returns the struct `TempFixture` that contains the temp dir (for clean-up on `drop`) as well as the path to the file.
    ///
    /// Sibling files sharing the stem (`towns.mid` for `towns.mif`) are copied too.
    pub fn fixture(name: &str) -> Self {
        let staging = Self::empty(name);
        let source = fixture(name);
        let stem = source.file_stem().unwrap().to_owned();
        for entry in std::fs::read_dir(source.parent().unwrap()).unwrap() {
            let entry = entry.unwrap().path();
            if entry.file_stem() == Some(stem.as_os_str()) {
                let target = staging._temp_dir.path().join(entry.file_name().unwrap());
                std::fs::copy(&entry, target).unwrap();
            }
        }
        staging
    }

    /// Creates a temporary directory and path to a non-existent file with given `name`.
    /// Useful for writing results to during testing
    ///
    /// Returns the struct `TempFixture` that contains the temp dir (for clean-up on `drop`)
    /// as well as the empty file path.
    pub fn empty(name: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let temp_path = _temp_dir.path().join(name);
        Self {
            _temp_dir,
            temp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.temp_path
    }
}

impl AsRef<Path> for TempFixture {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Returns the fully qualified path to `filename` in `${CARGO_MANIFEST_DIR}/fixtures`.
pub fn fixture(filename: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(filename)
}

/// Assert numerical difference between two expressions is less than
/// 64-bit machine epsilon or a specified epsilon.
///
/// # Examples:
/// ```rust, ignore
/// use std::f64::consts::{PI, E};
/// assert_near!(PI / E, 1.1557273497909217);
/// // with specified epsilon
/// assert_near!(PI / E, 1.15572734, epsilon = 1e-8);
/// ```
#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr) => {
        $crate::assert_near!($left, $right, epsilon = f64::EPSILON)
    };
    ($left:expr, $right:expr, epsilon = $ep:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "|{} - {}| = {} is greater than epsilon {:.4e}",
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
    ($left:expr, $right:expr, epsilon = $ep:expr, field = $field:expr) => {
        assert!(
            ($left - $right).abs() < $ep,
            "field {}: |{} - {}| = {} is greater than epsilon {:.4e}",
            $field,
            $left,
            $right,
            ($left - $right).abs(),
            $ep
        )
    };
    (Envelope, $left:expr, $right:expr, epsilon = $ep:expr) => {
        $crate::assert_near!($left.min_x, $right.min_x, epsilon = $ep, field = "min_x");
        $crate::assert_near!($left.max_x, $right.max_x, epsilon = $ep, field = "max_x");
        $crate::assert_near!($left.min_y, $right.min_y, epsilon = $ep, field = "min_y");
        $crate::assert_near!($left.max_y, $right.max_y, epsilon = $ep, field = "max_y");
    };
}
