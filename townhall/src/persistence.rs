use crate::common::Error;
use log::trace;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use townhall_base::date_time::Stamp;
use townhall_base::{Kind, Record};

/// Whole-document JSON mirror of one collection.
///
/// Every write replaces the full file: the new document goes to a hidden sibling
/// `.<name>.tmp` file which is then renamed over the target.
#[derive(Clone, Debug)]
pub struct JsonFile {
    dir: PathBuf,
    path: PathBuf,
}

impl JsonFile {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        JsonFile { dir, path }
    }

    pub fn for_kind(dir: impl Into<PathBuf>, kind: Kind) -> Self {
        Self::new(dir, kind.file_name())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn ensure_storage_ready(&self) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn write_all(&self, records: &[Record]) -> Result<(), Error> {
        self.write_inner(records)
            .await
            .map_err(|e| Error::persistence(&self.path, e))
    }

    async fn write_inner(&self, records: &[Record]) -> Result<(), Error> {
        self.ensure_storage_ready().await?;
        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        trace!("{}: wrote {} records", self.path.display(), records.len());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(".");
        if let Some(file_name) = self.path.file_name() {
            name.push(file_name);
        }
        name.push(".tmp");
        self.dir.join(name)
    }

    /// A syntax error comes back as [`Error::Json`], well-formed JSON that is not a list of
    /// record objects as [`Error::Shape`].
    pub async fn read_all(&self) -> Result<Vec<Record>, Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        let document: Value = serde_json::from_slice(&bytes)?;
        serde_json::from_value(document).map_err(|e| Error::Shape(e.to_string()))
    }

    /// Moves an unusable document out of the way so the next write does not destroy it.
    /// Returns where it went.
    pub async fn set_aside(&self) -> Result<PathBuf, Error> {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".rejected-{}", Stamp::now().millis()));
        let target = PathBuf::from(name);
        tokio::fs::rename(&self.path, &target).await?;
        Ok(target)
    }
}
