use super::super::perfbench::error::{Error, Result};
use super::super::perfbench::params::Params;

/// Configuration for one IOR invocation. Fields are only mutated through the
/// named setters so malformed values are rejected when they are set, not when
/// the command line is built.
pub struct IorCommand {
    namespace: String,
    api: String,
    dfs_oclass: String,
    transfer_size: String,
    block_size: String,
    sw_deadline: Option<u64>,
    sw_wearout: Option<u64>,
    dfs_chunk: String,
    flags: String,
}

impl IorCommand {
    pub fn new(namespace: &str) -> IorCommand {
        IorCommand {
            namespace: namespace.to_string(),
            api: "DFS".to_string(),
            dfs_oclass: "SX".to_string(),
            transfer_size: "1M".to_string(),
            block_size: "1G".to_string(),
            sw_deadline: None,
            sw_wearout: None,
            dfs_chunk: "1M".to_string(),
            flags: String::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn dfs_oclass(&self) -> &str {
        &self.dfs_oclass
    }

    pub fn transfer_size(&self) -> &str {
        &self.transfer_size
    }

    pub fn block_size(&self) -> &str {
        &self.block_size
    }

    pub fn sw_deadline(&self) -> Option<u64> {
        self.sw_deadline
    }

    pub fn dfs_chunk(&self) -> &str {
        &self.dfs_chunk
    }

    /// Replace the flag set, e.g. `-w -C -e -g -G 27 -k`. Every token must
    /// look like a flag or a flag argument.
    pub fn set_flags(&mut self, flags: &str) -> Result<()> {
        if flags.trim().is_empty() {
            return Err(Error::Configuration("empty ior flag set".to_string()));
        }
        let mut tokens = flags.split_whitespace();
        match tokens.next() {
            Some(first) if first.starts_with('-') => {}
            _ => {
                return Err(Error::Configuration(format!(
                    "ior flags must start with a flag, got '{}'",
                    flags
                )))
            }
        }
        self.flags = flags.trim().to_string();
        Ok(())
    }

    /// Drop the stonewalling parameters. They are write-phase concerns and
    /// must not leak into read timing; clearing twice is a no-op.
    pub fn clear_stonewall(&mut self) {
        self.sw_deadline = None;
        self.sw_wearout = None;
    }

    /// Reload every field present in the active namespace; fields absent from
    /// the config keep their current value.
    pub fn get_params(&mut self, params: &Params) -> Result<()> {
        let ns = self.namespace.clone();
        if let Some(v) = params.get_str("api", &ns) {
            self.api = v;
        }
        if let Some(v) = params.get_str("dfs_oclass", &ns) {
            self.dfs_oclass = v;
        }
        if let Some(v) = params.get_str("transfer_size", &ns) {
            self.transfer_size = v;
        }
        if let Some(v) = params.get_str("block_size", &ns) {
            self.block_size = v;
        }
        if let Some(v) = params.get_u64("sw_deadline", &ns) {
            self.sw_deadline = Some(v);
        }
        if let Some(v) = params.get_u64("sw_wearout", &ns) {
            self.sw_wearout = Some(v);
        }
        if let Some(v) = params.get_str("dfs_chunk", &ns) {
            self.dfs_chunk = v;
        }
        if let Some(v) = params.get_str("flags", &ns) {
            self.set_flags(&v)?;
        }
        Ok(())
    }

    /// Build the argument vector for the ior binary.
    pub fn args(&self, pool: &str, container: &str, test_file: &str) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        args.push("-a".to_string());
        args.push(self.api.clone());
        for token in self.flags.split_whitespace() {
            args.push(token.to_string());
        }
        args.push("-t".to_string());
        args.push(self.transfer_size.clone());
        args.push("-b".to_string());
        args.push(self.block_size.clone());
        if let Some(deadline) = self.sw_deadline {
            args.push("-D".to_string());
            args.push(deadline.to_string());
            if self.sw_wearout.is_some() {
                args.push("-O".to_string());
                args.push("stoneWallingWearOut=1".to_string());
            }
        }
        args.push("-o".to_string());
        args.push(test_file.to_string());
        if self.api.starts_with("DFS") {
            args.push("--dfs.pool".to_string());
            args.push(pool.to_string());
            args.push("--dfs.cont".to_string());
            args.push(container.to_string());
            args.push("--dfs.oclass".to_string());
            args.push(self.dfs_oclass.clone());
            args.push("--dfs.chunk_size".to_string());
            args.push(self.dfs_chunk.clone());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::IorCommand;
    use super::super::super::perfbench::params::Params;

    #[test]
    fn clear_stonewall_is_idempotent() {
        let mut cmd = IorCommand::new("/run/ior/*");
        let doc = r#"{"run": {"ior": {"sw_deadline": 30, "sw_wearout": 1}}}"#;
        let params = Params::from_value(::serde_json::from_str(doc).unwrap());
        cmd.get_params(&params).unwrap();
        assert_eq!(cmd.sw_deadline(), Some(30));

        cmd.clear_stonewall();
        assert_eq!(cmd.sw_deadline(), None);
        let once = cmd.args("pool", "cont", "/testfile");
        cmd.clear_stonewall();
        let twice = cmd.args("pool", "cont", "/testfile");
        assert_eq!(once, twice);
        assert!(!once.contains(&"-D".to_string()));
    }

    #[test]
    fn rejects_malformed_flags() {
        let mut cmd = IorCommand::new("/run/ior/*");
        assert!(cmd.set_flags("").is_err());
        assert!(cmd.set_flags("   ").is_err());
        assert!(cmd.set_flags("write fast").is_err());
        assert!(cmd.set_flags("-w -C -e -g -G 27 -k").is_ok());
    }

    #[test]
    fn dfs_api_gets_pool_and_container_args() {
        let mut cmd = IorCommand::new("/run/ior/*");
        cmd.set_flags("-w").unwrap();
        let args = cmd.args("perf_pool", "perf_cont", "/testfile");
        let joined = args.join(" ");
        assert!(joined.contains("-a DFS"));
        assert!(joined.contains("--dfs.pool perf_pool"));
        assert!(joined.contains("--dfs.cont perf_cont"));
        assert!(joined.contains("--dfs.oclass SX"));
    }

    #[test]
    fn posix_api_omits_dfs_args() {
        let doc = r#"{"run": {"ior_posix": {"api": "POSIX", "flags": "-w"}}}"#;
        let params = Params::from_value(::serde_json::from_str(doc).unwrap());
        let mut cmd = IorCommand::new("/run/ior_posix/*");
        cmd.get_params(&params).unwrap();
        let args = cmd.args("perf_pool", "perf_cont", "/mnt/dfuse/testfile");
        assert!(!args.contains(&"--dfs.pool".to_string()));
        assert!(args.contains(&"/mnt/dfuse/testfile".to_string()));
    }
}
