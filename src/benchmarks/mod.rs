use std::path::{Path, PathBuf};

use super::perfbench::error::{Error, Result};
use super::perfbench::mount::DfuseMount;
use super::perfbench::oclass;
use super::perfbench::params::Params;
use super::perfbench::pool::{Container, Pool};

pub mod ior;
pub use self::ior::*;
pub mod mdtest;
pub use self::mdtest::*;

const DEFAULT_IOR_NAMESPACE: &'static str = "/run/ior/*";
const DEFAULT_MDTEST_NAMESPACE: &'static str = "/run/mdtest/*";
// Process counts always come from these fixed namespaces, never from the
// per-test namespace, so the ior and mdtest parameter trees stay isolated.
const IOR_PROCESS_NAMESPACE: &'static str = "/run/ior/client_processes/*";
const MDTEST_PROCESS_NAMESPACE: &'static str = "/run/mdtest/client_processes/*";
const DEFAULT_POOL_SIZE: &'static str = "85%";

/// Which benchmark a report describes. Being an enum, there is no "invalid
/// cmd" case to reject at runtime.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BenchKind {
    Ior,
    Mdtest,
}

/// Ambient state for one test case, read from the config file. The runner
/// reads it but never owns the hosts it names.
#[derive(Deserialize)]
pub struct RunContext {
    #[serde(default)]
    pub test_id: String,
    pub hostlist_servers: Vec<String>,
    pub hostlist_clients: Vec<String>,
    pub prefix: PathBuf,
}

/// Orchestrates the performance benchmarks: one IOR command and one mdtest
/// command held by composition, plus the pool/container/dfuse state shared
/// between the write and read phases of a throughput run.
pub struct PerformanceRunner<'a> {
    params: &'a Params,
    context: RunContext,
    ior_cmd: IorCommand,
    mdtest_cmd: MdtestCommand,
    processes: u64,
    ppn: u64,
    pool: Option<Pool>,
    container: Option<Container>,
    dfuse: Option<DfuseMount>,
}

impl<'a> PerformanceRunner<'a> {
    pub fn new(params: &'a Params, context: RunContext) -> Result<PerformanceRunner<'a>> {
        let mut ior_cmd = IorCommand::new(DEFAULT_IOR_NAMESPACE);
        ior_cmd.get_params(params)?;
        let mut mdtest_cmd = MdtestCommand::new(DEFAULT_MDTEST_NAMESPACE);
        mdtest_cmd.get_params(params)?;
        Ok(PerformanceRunner {
            params: params,
            context: context,
            ior_cmd: ior_cmd,
            mdtest_cmd: mdtest_cmd,
            processes: 0,
            ppn: 0,
            pool: None,
            container: None,
            dfuse: None,
        })
    }

    /// The parameter summary as lines, sentinels included. Names are padded
    /// to the longest name so the values line up.
    pub fn report(&self, kind: BenchKind) -> Vec<String> {
        let mut params: Vec<(&str, String)> = vec![
            ("TEST_NAME", self.context.test_id.clone()),
            ("NUM_SERVERS", self.context.hostlist_servers.len().to_string()),
            ("NUM_CLIENTS", self.context.hostlist_clients.len().to_string()),
            ("PPC", self.ppn.to_string()),
            ("PPN", self.ppn.to_string()),
        ];
        match kind {
            BenchKind::Ior => {
                params.push(("API", self.ior_cmd.api().to_string()));
                params.push(("OCLASS", self.ior_cmd.dfs_oclass().to_string()));
                params.push(("XFER_SIZE", self.ior_cmd.transfer_size().to_string()));
                params.push(("BLOCK_SIZE", self.ior_cmd.block_size().to_string()));
                params.push(("SW_TIME", display_opt(self.ior_cmd.sw_deadline())));
                params.push(("CHUNK_SIZE", self.ior_cmd.dfs_chunk().to_string()));
            }
            BenchKind::Mdtest => {
                params.push(("API", self.mdtest_cmd.api().to_string()));
                params.push(("OCLASS", self.mdtest_cmd.dfs_oclass().to_string()));
                params.push(("DIR_OCLASS", self.mdtest_cmd.dfs_dir_oclass().to_string()));
                params.push(("SW_TIME", display_opt(self.mdtest_cmd.stonewall_timer())));
                params.push(("CHUNK_SIZE", self.mdtest_cmd.dfs_chunk().to_string()));
            }
        }
        let max_len = params.iter().map(|&(name, _)| name.len()).max().unwrap_or(0);
        let mut lines = Vec::with_capacity(params.len() + 2);
        lines.push("PERFORMANCE PARAMS START".to_string());
        for &(name, ref value) in &params {
            lines.push(format!("{:<width$} : {}", name, value, width = max_len));
        }
        lines.push("PERFORMANCE PARAMS END".to_string());
        lines
    }

    pub fn print_performance_params(&self, kind: BenchKind) {
        for line in self.report(kind) {
            info!("{}", line);
        }
    }

    fn verify_oclass_compat(&self, oclass: &str) -> Result<()> {
        oclass::verify_compat(oclass, self.context.hostlist_clients.len())
    }

    /// A complete write-then-read IOR cycle against one pool/container. The
    /// write phase creates the pool, container and (for POSIX) the dfuse
    /// mount; the read phase reuses them and tears the mount down.
    pub fn run_performance_ior(&mut self, namespace: Option<&str>, use_intercept: bool) -> Result<()> {
        self.processes = self.params
            .get_u64("np", IOR_PROCESS_NAMESPACE)
            .ok_or_else(|| Error::Configuration(format!("np not found under {}", IOR_PROCESS_NAMESPACE)))?;
        self.ppn = self.params
            .get_u64("ppn", IOR_PROCESS_NAMESPACE)
            .ok_or_else(|| Error::Configuration(format!("ppn not found under {}", IOR_PROCESS_NAMESPACE)))?;

        let intercept = if use_intercept {
            Some(self.context.prefix.join("lib64").join("libioil.so"))
        } else {
            None
        };

        if let Some(ns) = namespace {
            self.ior_cmd.set_namespace(ns);
            self.ior_cmd.get_params(self.params)?;
        }
        let active = self.ior_cmd.namespace().to_string();
        let write_flags = self.params
            .get_str("write_flags", &active)
            .ok_or_else(|| Error::Configuration("write_flags not found in config".to_string()))?;
        let read_flags = self.params
            .get_str("read_flags", &active)
            .ok_or_else(|| Error::Configuration("read_flags not found in config".to_string()))?;

        self.print_performance_params(BenchKind::Ior);

        let oclass = self.ior_cmd.dfs_oclass().to_string();
        self.verify_oclass_compat(&oclass)?;

        info!("Running IOR write");
        self.ior_cmd.set_flags(&write_flags)?;
        self.run_ior_with_pool(true, true, intercept.as_deref(), false, false)?;

        info!("Running IOR read");
        self.ior_cmd.set_flags(&read_flags)?;
        // Stonewalling is a write-phase concern; it must not limit the read.
        self.ior_cmd.clear_stonewall();
        self.run_ior_with_pool(false, false, intercept.as_deref(), false, true)?;

        self.teardown()
    }

    /// A single mdtest pass; no write/read phase split.
    pub fn run_performance_mdtest(&mut self, namespace: Option<&str>) -> Result<()> {
        self.processes = self.params
            .get_u64("np", MDTEST_PROCESS_NAMESPACE)
            .ok_or_else(|| Error::Configuration(format!("np not found under {}", MDTEST_PROCESS_NAMESPACE)))?;
        self.ppn = self.params
            .get_u64("ppn", MDTEST_PROCESS_NAMESPACE)
            .ok_or_else(|| Error::Configuration(format!("ppn not found under {}", MDTEST_PROCESS_NAMESPACE)))?;

        if let Some(ns) = namespace {
            self.mdtest_cmd.set_namespace(ns);
            self.mdtest_cmd.get_params(self.params)?;
        }

        self.print_performance_params(BenchKind::Mdtest);

        let file_oclass = self.mdtest_cmd.dfs_oclass().to_string();
        let dir_oclass = self.mdtest_cmd.dfs_dir_oclass().to_string();
        self.verify_oclass_compat(&file_oclass)?;
        self.verify_oclass_compat(&dir_oclass)?;

        info!("Running MDTEST");
        self.execute_mdtest()?;

        self.teardown()
    }

    fn run_ior_with_pool(
        &mut self,
        create_pool: bool,
        create_cont: bool,
        intercept: Option<&Path>,
        intercept_info: bool,
        stop_dfuse: bool,
    ) -> Result<()> {
        if create_pool {
            let label = sanitize_label(&format!("{}_pool", self.context.test_id));
            self.pool = Some(Pool::create(&label, DEFAULT_POOL_SIZE)?);
        }
        if create_cont {
            let label = sanitize_label(&format!("{}_cont", self.context.test_id));
            let pool = self.pool
                .as_ref()
                .ok_or_else(|| Error::Configuration("container requested without a pool".to_string()))?;
            self.container = Some(Container::create(pool, &label)?);
        }
        let pool_label = match self.pool {
            Some(ref pool) => pool.label().to_string(),
            None => return Err(Error::Configuration("ior run without a pool".to_string())),
        };
        let cont_label = match self.container {
            Some(ref cont) => cont.label().to_string(),
            None => return Err(Error::Configuration("ior run without a container".to_string())),
        };

        let test_file = if self.ior_cmd.api() == "POSIX" {
            if self.dfuse.is_none() {
                self.dfuse = Some(DfuseMount::mount(&pool_label, &cont_label)?);
            }
            match self.dfuse {
                Some(ref dfuse) => dfuse.path().join("testfile").to_string_lossy().into_owned(),
                None => return Err(Error::Execution("dfuse mount missing".to_string())),
            }
        } else {
            "/testfile".to_string()
        };

        let args = self.ior_cmd.args(&pool_label, &cont_label, &test_file);
        self.run_mpi("ior", &args, intercept, intercept_info)?;

        if stop_dfuse {
            if let Some(mut dfuse) = self.dfuse.take() {
                dfuse.unmount()?;
            }
        }
        Ok(())
    }

    fn execute_mdtest(&mut self) -> Result<()> {
        let pool = Pool::create(
            &sanitize_label(&format!("{}_pool", self.context.test_id)),
            DEFAULT_POOL_SIZE,
        )?;
        let container = Container::create(
            &pool,
            &sanitize_label(&format!("{}_cont", self.context.test_id)),
        )?;
        let pool_label = pool.label().to_string();
        let cont_label = container.label().to_string();
        self.pool = Some(pool);
        self.container = Some(container);

        let test_dir = if self.mdtest_cmd.api() == "POSIX" {
            let dfuse = DfuseMount::mount(&pool_label, &cont_label)?;
            let dir = dfuse.path().join("testdir").to_string_lossy().into_owned();
            self.dfuse = Some(dfuse);
            dir
        } else {
            "/testdir".to_string()
        };

        let args = self.mdtest_cmd.args(&pool_label, &cont_label, &test_dir);
        self.run_mpi("mdtest", &args, None, false)?;

        if let Some(mut dfuse) = self.dfuse.take() {
            dfuse.unmount()?;
        }
        Ok(())
    }

    // Launch the benchmark binary under mpirun and block until it exits.
    fn run_mpi(
        &self,
        program: &str,
        args: &[String],
        intercept: Option<&Path>,
        intercept_info: bool,
    ) -> Result<()> {
        use std::process::Command;
        let mut command = Command::new("mpirun");
        command.arg("-np").arg(self.processes.to_string());
        command.arg("--map-by").arg(format!("ppr:{}:node", self.ppn));
        if !self.context.hostlist_clients.is_empty() {
            command.arg("--host").arg(self.context.hostlist_clients.join(","));
        }
        if let Some(path) = intercept {
            command.env("LD_PRELOAD", path);
            command.arg("-x").arg("LD_PRELOAD");
            if intercept_info {
                command.env("D_IL_REPORT", "1");
                command.arg("-x").arg("D_IL_REPORT");
            }
        }
        command.arg(program).args(args);
        info!("Running {:?}", command);
        let status = command
            .status()
            .map_err(|e| Error::Execution(format!("failed to run `mpirun`: {}", e)))?;
        if !status.success() {
            return Err(Error::Execution(format!("{} exited with {}", program, status)));
        }
        Ok(())
    }

    /// Destroy whatever is still standing, mount first. Idempotent.
    pub fn teardown(&mut self) -> Result<()> {
        if let Some(mut dfuse) = self.dfuse.take() {
            dfuse.unmount()?;
        }
        if let Some(mut container) = self.container.take() {
            container.destroy()?;
        }
        if let Some(mut pool) = self.pool.take() {
            pool.destroy()?;
        }
        Ok(())
    }
}

fn display_opt(value: Option<u64>) -> String {
    match value {
        Some(n) => n.to_string(),
        None => "none".to_string(),
    }
}

// Pool/container labels allow a restricted character set.
fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{BenchKind, PerformanceRunner, RunContext};
    use super::super::perfbench::error::Error;
    use super::super::perfbench::params::Params;
    use std::path::PathBuf;

    fn context(num_clients: usize) -> RunContext {
        RunContext {
            test_id: "ior_easy.dfs_sx".to_string(),
            hostlist_servers: vec!["server-1".to_string(), "server-2".to_string()],
            hostlist_clients: (0..num_clients).map(|i| format!("client-{}", i)).collect(),
            prefix: PathBuf::from("/usr"),
        }
    }

    fn params(doc: &str) -> Params {
        Params::from_value(::serde_json::from_str(doc).unwrap())
    }

    #[test]
    fn ior_report_is_aligned_and_bracketed() {
        let p = params(r#"{"run": {"ior": {"sw_deadline": 30}}}"#);
        let runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let lines = runner.report(BenchKind::Ior);

        assert_eq!(lines.first().unwrap(), "PERFORMANCE PARAMS START");
        assert_eq!(lines.last().unwrap(), "PERFORMANCE PARAMS END");
        assert_eq!(
            lines.iter().filter(|l| l.contains("PARAMS START")).count(),
            1
        );
        assert_eq!(lines.iter().filter(|l| l.contains("PARAMS END")).count(), 1);

        // 5 common + 6 ior-specific entries, in declared order
        let body = &lines[1..lines.len() - 1];
        assert_eq!(body.len(), 11);
        assert!(body[0].starts_with("TEST_NAME"));
        assert!(body[4].starts_with("PPN"));
        assert!(body[5].starts_with("API"));
        assert!(body[10].starts_with("CHUNK_SIZE"));

        // every name is padded to the longest name
        let width = body[0].find(" : ").unwrap();
        assert_eq!(width, "NUM_SERVERS".len());
        for line in body.iter() {
            assert_eq!(line.find(" : ").unwrap(), width);
        }
        assert!(body[9].starts_with("SW_TIME"));
        assert!(body[9].ends_with(": 30"));
    }

    #[test]
    fn mdtest_report_lists_both_oclasses() {
        let p = params(r#"{"run": {"mdtest": {"dfs_dir_oclass": "RP_3"}}}"#);
        let runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let lines = runner.report(BenchKind::Mdtest);
        let body = &lines[1..lines.len() - 1];
        assert_eq!(body.len(), 10);
        assert!(body[7].starts_with("DIR_OCLASS"));
        assert!(body[7].ends_with(": RP_3"));
    }

    #[test]
    fn missing_write_flags_is_fatal() {
        let doc = r#"{"run": {
            "ior": {"client_processes": {"np": 4, "ppn": 2}},
            "ior_dfs_sx": {"api": "DFS"}
        }}"#;
        let p = params(doc);
        let mut runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let err = runner
            .run_performance_ior(Some("/run/ior_dfs_sx/*"), false)
            .unwrap_err();
        assert!(format!("{}", err).contains("write_flags"));
    }

    #[test]
    fn missing_read_flags_is_fatal() {
        let doc = r#"{"run": {
            "ior": {"client_processes": {"np": 4, "ppn": 2}},
            "ior_dfs_sx": {"write_flags": "-w"}
        }}"#;
        let p = params(doc);
        let mut runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let err = runner
            .run_performance_ior(Some("/run/ior_dfs_sx/*"), false)
            .unwrap_err();
        assert!(format!("{}", err).contains("read_flags"));
    }

    #[test]
    fn default_namespace_without_flags_is_fatal() {
        // No namespace override and no flag sets under /run/ior
        let doc = r#"{"run": {
            "ior": {"client_processes": {"np": 4, "ppn": 2}}
        }}"#;
        let p = params(doc);
        let mut runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let err = runner.run_performance_ior(None, false).unwrap_err();
        assert!(format!("{}", err).contains("write_flags"));
    }

    #[test]
    fn missing_process_counts_are_fatal() {
        let p = params(r#"{"run": {"ior": {}}}"#);
        let mut runner = PerformanceRunner::new(&p, context(4)).unwrap();
        let err = runner.run_performance_ior(None, false).unwrap_err();
        assert!(format!("{}", err).contains("np"));
    }

    #[test]
    fn ior_oclass_needs_enough_clients() {
        let doc = r#"{"run": {
            "ior": {"client_processes": {"np": 4, "ppn": 2}},
            "ior_dfs_ec": {
                "dfs_oclass": "EC_16P2GX",
                "write_flags": "-w",
                "read_flags": "-r"
            }
        }}"#;
        let p = params(doc);
        let mut runner = PerformanceRunner::new(&p, context(17)).unwrap();
        let err = runner
            .run_performance_ior(Some("/run/ior_dfs_ec/*"), false)
            .unwrap_err();
        match err {
            Error::Capacity { min, oclass } => {
                assert_eq!(min, 18);
                assert_eq!(oclass, "EC_16P2GX");
            }
            other => panic!("expected capacity error, got {}", other),
        }
    }

    #[test]
    fn mdtest_dir_oclass_is_validated_too() {
        let doc = r#"{"run": {
            "mdtest": {"client_processes": {"np": 4, "ppn": 2}},
            "mdtest_dfs_sx": {"dfs_oclass": "S1", "dfs_dir_oclass": "RP_3"}
        }}"#;
        let p = params(doc);
        let mut runner = PerformanceRunner::new(&p, context(2)).unwrap();
        let err = runner
            .run_performance_mdtest(Some("/run/mdtest_dfs_sx/*"))
            .unwrap_err();
        match err {
            Error::Capacity { min, oclass } => {
                assert_eq!(min, 3);
                assert_eq!(oclass, "RP_3");
            }
            other => panic!("expected capacity error, got {}", other),
        }
    }
}
