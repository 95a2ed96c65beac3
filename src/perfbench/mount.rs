use std::path::{Path, PathBuf};
use std::process::Command;
use tempdir::TempDir;

use super::error::{Error, Result};

/// A dfuse mount of one pool/container, on an ephemeral mountpoint.
///
/// Teardown is phase-scoped: the orchestrator decides when to call
/// `unmount()`, so the write and read phases of a throughput run can share one
/// mount. Drop only cleans up best-effort if the orchestrator never got there.
pub struct DfuseMount {
    // Owns the mountpoint directory; removed when the mount is dropped.
    _dir: TempDir,
    mountpoint: PathBuf,
    mounted: bool,
}

impl DfuseMount {
    pub fn mount(pool: &str, container: &str) -> Result<DfuseMount> {
        let dir = TempDir::new("dfuse")
            .map_err(|e| Error::Execution(format!("failed to create dfuse mountpoint: {}", e)))?;
        let mountpoint = dir.path().to_owned();
        let status = Command::new("dfuse")
            .arg("--mountpoint")
            .arg(&mountpoint)
            .arg("--pool")
            .arg(pool)
            .arg("--container")
            .arg(container)
            .status()
            .map_err(|e| Error::Execution(format!("failed to run `dfuse`: {}", e)))?;
        if !status.success() {
            return Err(Error::Execution(format!(
                "failed to mount {}/{} at {:?}",
                pool, container, mountpoint
            )));
        }
        info!("Mounted {}/{} at {:?}", pool, container, mountpoint);
        Ok(DfuseMount {
            _dir: dir,
            mountpoint: mountpoint,
            mounted: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.mountpoint
    }

    pub fn unmount(&mut self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        let status = Command::new("fusermount3")
            .arg("-u")
            .arg(&self.mountpoint)
            .status()
            .map_err(|e| Error::Execution(format!("failed to run `fusermount3`: {}", e)))?;
        if !status.success() {
            return Err(Error::Execution(format!(
                "failed to unmount {:?}",
                self.mountpoint
            )));
        }
        self.mounted = false;
        Ok(())
    }
}

impl Drop for DfuseMount {
    fn drop(&mut self) {
        if self.mounted {
            warn!("dfuse still mounted at {:?}, unmounting", self.mountpoint);
            let _ = Command::new("fusermount3")
                .arg("-u")
                .arg(&self.mountpoint)
                .status();
        }
    }
}
