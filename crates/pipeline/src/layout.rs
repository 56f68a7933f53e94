//! File naming for a single run.
//!
//! Every path a run reads or writes is derived here from the input path:
//!
//! ```text
//! <dir>/<base>.<edl_ext>        cut list
//! <tmp>/<base>.fix<ext>         remuxed intermediate
//! <tmp>/<base>.part<i><ext>     trimmed segment for boundary i
//! <tmp>/<base>.txt              concat list
//! <tmp>/<base>.cut<ext>         output, when <tmp> is the input directory
//! <tmp>/<base><ext>             output, otherwise
//! ```

use std::path::{Path, PathBuf};

use clutch_common::error::{ClutchError, ClutchResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RunLayout {
    pub input: PathBuf,
    pub edl: PathBuf,
    pub temp_dir: PathBuf,
    pub intermediate: PathBuf,
    pub list_file: PathBuf,
    pub output: PathBuf,
    base_name: String,
    extension: String,
}

impl RunLayout {
    /// Derive the layout for `input`.
    ///
    /// `temp_dir` defaults to the input's directory and must exist when given.
    pub fn new(input: &Path, temp_dir: Option<&Path>, edl_extension: &str) -> ClutchResult<Self> {
        let base_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ClutchError::config(format!("{} has no file name", input.display()))
            })?;
        let extension = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let input_dir = input.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

        let temp_dir = match temp_dir {
            Some(dir) if !dir.is_dir() => {
                return Err(ClutchError::config(format!(
                    "Directory {} does not exist",
                    dir.display()
                )));
            }
            Some(dir) => dir.to_path_buf(),
            None => input_dir.clone(),
        };

        let edl_extension = edl_extension.trim_start_matches('.');
        let output = if same_dir(&temp_dir, &input_dir) {
            temp_dir.join(format!("{base_name}.cut{extension}"))
        } else {
            temp_dir.join(format!("{base_name}{extension}"))
        };

        Ok(Self {
            input: input.to_path_buf(),
            edl: input_dir.join(format!("{base_name}.{edl_extension}")),
            intermediate: temp_dir.join(format!("{base_name}.fix{extension}")),
            list_file: temp_dir.join(format!("{base_name}.txt")),
            output,
            temp_dir,
            base_name,
            extension,
        })
    }

    /// Path of the trimmed segment for boundary `index`.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.temp_dir.join(format!(
            "{}.part{index}{}",
            self.base_name, self.extension
        ))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    let normalize = |p: &Path| {
        let p = if p.as_os_str().is_empty() {
            Path::new(".")
        } else {
            p
        };
        p.canonicalize().ok()
    };
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
