use std::{fs, io::Write, path::{Path, PathBuf}};

use crate::errors::StatsError;

/// Where a rendered report ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSink {
    Stdout,
    File(PathBuf)
}

impl ReportSink {
    pub fn new(output: Option<&Path>) -> Self {
        match output {
            Some(path) if path.as_os_str() != "-" => ReportSink::File(path.to_path_buf()),
            _ => ReportSink::Stdout
        }
    }

    /// Returns the written path for file sinks
    pub fn write(&self, report: &str) -> Result<Option<PathBuf>, StatsError> {
        match self {
            ReportSink::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(report.as_bytes())?;
                stdout.flush()?;
                Ok(None)
            },
            ReportSink::File(path) => Self::write_file(path, report).map(Some)
        }
    }

    ///
    /// Writes into a temp file beside the target and renames it over,
    /// readers never observe a half written report
    ///
    fn write_file(path: &Path, report: &str) -> Result<PathBuf, StatsError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from(".")
        };
        fs::create_dir_all(&parent).map_err(|e| StatsError::Io(
            std::io::Error::new(e.kind(), format!("create dir {}: {e}", parent.display()))
        ))?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e|
            StatsError::Io(std::io::Error::new(
                e.kind(), format!("tempfile in {}: {e}", parent.display())
            ))
        )?;
        temp.write_all(report.as_bytes())?;
        temp.flush()?;

        temp.persist(path).map_err(|e| StatsError::Io(std::io::Error::new(
            e.error.kind(), format!("persist {}: {}", path.display(), e.error)
        )))?;

        Ok(path.to_path_buf())
    }
}
