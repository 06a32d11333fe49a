use crate::error::Error;
use crate::ph_debug;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only text sink of a run.
pub trait Journal {
    /// Open journal at `path`, a previously opened journal is closed first.
    fn open(&mut self, path: &Path) -> Result<(), Error>;

    /// Append text as is, no line break is added.
    fn write(&mut self, text: &str) -> Result<(), Error>;

    /// Close journal, closing of a not opened journal is a no-op.
    fn close(&mut self) -> Result<(), Error>;

    fn is_open(&self) -> bool;
}

impl<J: Journal + ?Sized> Journal for &mut J {
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        (**self).open(path)
    }

    fn write(&mut self, text: &str) -> Result<(), Error> {
        (**self).write(text)
    }

    fn close(&mut self) -> Result<(), Error> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Journal in a regular file, every write is flushed so an interrupted run keeps its records.
#[derive(Default)]
pub struct FileJournal {
    file: Option<(PathBuf, File)>,
}

impl FileJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of an opened journal.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }
}

impl Journal for FileJournal {
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        self.close()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::JournalOpen(path.to_path_buf(), e))?;
        ph_debug!("journal opened at {}", path.display());
        self.file = Some((path.to_path_buf(), file));
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), Error> {
        let (_, file) = self.file.as_mut().ok_or(Error::JournalClosed)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some((path, mut file)) = self.file.take() {
            file.flush()?;
            ph_debug!("journal closed at {}", path.display());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}
