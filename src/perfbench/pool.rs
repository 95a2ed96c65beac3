use std::process::Command;

use super::error::{Error, Result};

// Run a management tool to completion; non-zero exit is fatal.
fn run_tool(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::Execution(format!("failed to run `{}`: {}", program, e)))?;
    if !status.success() {
        return Err(Error::Execution(format!(
            "`{} {}` exited with {}",
            program,
            args.join(" "),
            status
        )));
    }
    Ok(())
}

/// A storage pool, created through the management CLI and addressed by label.
/// Labels avoid parsing UUIDs out of tool output.
pub struct Pool {
    label: String,
}

impl Pool {
    pub fn create(label: &str, size: &str) -> Result<Pool> {
        info!("Creating pool {} ({})", label, size);
        run_tool("dmg", &["pool", "create", "--size", size, label])?;
        Ok(Pool {
            label: label.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn destroy(&mut self) -> Result<()> {
        info!("Destroying pool {}", self.label);
        run_tool("dmg", &["pool", "destroy", "--force", &self.label])
    }
}

/// A POSIX container inside a pool.
pub struct Container {
    pool: String,
    label: String,
}

impl Container {
    pub fn create(pool: &Pool, label: &str) -> Result<Container> {
        info!("Creating container {} in pool {}", label, pool.label());
        run_tool(
            "daos",
            &["container", "create", "--type", "POSIX", pool.label(), label],
        )?;
        Ok(Container {
            pool: pool.label().to_string(),
            label: label.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn destroy(&mut self) -> Result<()> {
        info!("Destroying container {}/{}", self.pool, self.label);
        run_tool("daos", &["container", "destroy", &self.pool, &self.label])
    }
}
