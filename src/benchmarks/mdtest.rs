use super::super::perfbench::params::Params;
use super::super::perfbench::error::Result;

/// Configuration for one mdtest invocation. Unlike IOR there is no separate
/// write/read flag set; a single pass covers the metadata operations.
pub struct MdtestCommand {
    namespace: String,
    api: String,
    dfs_oclass: String,
    dfs_dir_oclass: String,
    stonewall_timer: Option<u64>,
    dfs_chunk: String,
    num_items: Option<u64>,
}

impl MdtestCommand {
    pub fn new(namespace: &str) -> MdtestCommand {
        MdtestCommand {
            namespace: namespace.to_string(),
            api: "DFS".to_string(),
            dfs_oclass: "S1".to_string(),
            dfs_dir_oclass: "SX".to_string(),
            stonewall_timer: None,
            dfs_chunk: "1M".to_string(),
            num_items: None,
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

    pub fn dfs_dir_oclass(&self) -> &str {
        &self.dfs_dir_oclass
    }

    pub fn stonewall_timer(&self) -> Option<u64> {
        self.stonewall_timer
    }

    pub fn dfs_chunk(&self) -> &str {
        &self.dfs_chunk
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
        if let Some(v) = params.get_str("dfs_dir_oclass", &ns) {
            self.dfs_dir_oclass = v;
        }
        if let Some(v) = params.get_u64("stonewall_timer", &ns) {
            self.stonewall_timer = Some(v);
        }
        if let Some(v) = params.get_str("dfs_chunk", &ns) {
            self.dfs_chunk = v;
        }
        if let Some(v) = params.get_u64("num_items", &ns) {
            self.num_items = Some(v);
        }
        Ok(())
    }

    /// Build the argument vector for the mdtest binary.
    pub fn args(&self, pool: &str, container: &str, test_dir: &str) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        args.push("-a".to_string());
        args.push(self.api.clone());
        args.push("-d".to_string());
        args.push(test_dir.to_string());
        if let Some(items) = self.num_items {
            args.push("-n".to_string());
            args.push(items.to_string());
        }
        if let Some(timer) = self.stonewall_timer {
            args.push("-W".to_string());
            args.push(timer.to_string());
        }
        if self.api.starts_with("DFS") {
            args.push("--dfs.pool".to_string());
            args.push(pool.to_string());
            args.push("--dfs.cont".to_string());
            args.push(container.to_string());
            args.push("--dfs.oclass".to_string());
            args.push(self.dfs_oclass.clone());
            args.push("--dfs.dir_oclass".to_string());
            args.push(self.dfs_dir_oclass.clone());
            args.push("--dfs.chunk_size".to_string());
            args.push(self.dfs_chunk.clone());
        }
        args
    }
}
