// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Service supervisor state machine, per spec.md §4.8 ("Service
//! management"). Owns the transition table for database/cache services
//! that packages can auto-start on install.

pub mod catalog;
mod unit;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error as ThisError;
use tracing::{info, instrument, warn};

use catalog::ServiceDefinition;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("unknown service '{0}'")]
    UnknownService(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("platform error: {0}")]
    Platform(#[from] launchpad_platform::Error),
    #[error("'{0}' initialization failed: {1}")]
    InitFailed(String, String),
    #[error("'{0}' failed to start: {1}")]
    StartFailed(String, String),
    #[error("'{0}' failed health check after starting")]
    HealthCheckFailed(String),
    #[error("'{0}' is not running")]
    NotRunning(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub definition_name: String,
    pub status: ServiceStatus,
    pub enabled: bool,
    pub pid: Option<u32>,
    pub started_at: Option<std::time::SystemTime>,
    pub last_checked_at: Option<std::time::SystemTime>,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub config: BTreeMap<String, String>,
}

impl ServiceInstance {
    fn new(definition_name: &str, env_dir: &Path) -> Self {
        let (data_dir, config_file, log_file, _pid_file) = catalog::default_paths(env_dir, definition_name);
        Self {
            definition_name: definition_name.to_owned(),
            status: ServiceStatus::Stopped,
            enabled: false,
            pid: None,
            started_at: None,
            last_checked_at: None,
            data_dir,
            config_file,
            log_file,
            config: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationLogEntry {
    pub action: String,
    pub service_name: String,
    pub timestamp: std::time::SystemTime,
    pub result: Result<(), String>,
    pub duration: Duration,
}

/// Drives service instances through the transition table in spec.md §4.8:
/// `stopped -> starting -> running`, `running -> stopping -> stopped`, and
/// `-> failed` on any unrecoverable error in either direction.
pub struct ServiceManager {
    instances: BTreeMap<String, ServiceInstance>,
    operation_log: Vec<OperationLogEntry>,
    test_mode: bool,
}

impl ServiceManager {
    pub fn new(test_mode: bool) -> Self {
        Self { instances: BTreeMap::new(), operation_log: Vec::new(), test_mode }
    }

    pub fn operation_log(&self) -> &[OperationLogEntry] {
        &self.operation_log
    }

    pub fn status(&self, service_name: &str) -> Option<&ServiceInstance> {
        self.instances.get(service_name)
    }

    /// Start `service_name` under `prefix`'s environment directory,
    /// initializing its data directory on first start, per spec.md §4.8.
    #[instrument(skip(self))]
    pub async fn start(&mut self, service_name: &str, prefix: &Path) -> Result<(), Error> {
        let definition = catalog::lookup(service_name).ok_or_else(|| Error::UnknownService(service_name.to_owned()))?;
        let start = std::time::Instant::now();

        let result = self.start_inner(&definition, prefix).await;

        self.record(
            "start",
            service_name,
            start.elapsed(),
            result.as_ref().map(|_| ()).map_err(ToString::to_string),
        );
        result
    }

    async fn start_inner(&mut self, definition: &ServiceDefinition, prefix: &Path) -> Result<(), Error> {
        let env_dir = prefix.join(".launchpad");
        let instance = self
            .instances
            .entry(definition.name.to_owned())
            .or_insert_with(|| ServiceInstance::new(definition.name, &env_dir));

        if instance.status == ServiceStatus::Running {
            return Ok(());
        }
        instance.status = ServiceStatus::Starting;

        fs_err::create_dir_all(&instance.data_dir)?;
        if let Some(parent) = instance.log_file.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let vars = template_vars(definition, instance);

        if self.test_mode {
            instance.status = ServiceStatus::Running;
            instance.pid = Some(0);
            instance.started_at = Some(now());
            return Ok(());
        }

        if let Some(init_template) = definition.init_command_template
            && is_first_start(&instance.data_dir, definition.name)
        {
            let argv = unit::expand_argv(init_template, &vars);
            let outcome = unit::run_with_timeout(&argv, Duration::from_secs(60)).await;
            if !outcome.success && !unit::is_idempotent_failure(&outcome.stderr) {
                instance.status = ServiceStatus::Failed;
                return Err(Error::InitFailed(definition.name.to_owned(), outcome.stderr));
            }
        }

        let pid = self.launch(definition, instance, &vars)?;
        instance.pid = Some(pid);
        instance.started_at = Some(now());

        if let Some(health_check) = &definition.health_check {
            match probe_health(health_check, &vars).await {
                Ok(()) => {}
                Err(e) => {
                    instance.status = ServiceStatus::Failed;
                    return Err(e);
                }
            }
        }
        instance.last_checked_at = Some(now());

        for template in definition.post_start_command_templates {
            let argv = unit::expand_argv(template, &vars);
            let outcome = unit::run_with_timeout(&argv, Duration::from_secs(crate::environment::POST_START_TIMEOUT_SECS)).await;
            if !outcome.success && !unit::is_idempotent_failure(&outcome.stderr) {
                warn!(service = definition.name, error = %outcome.stderr, "post-start command failed, continuing");
            }
        }

        instance.status = ServiceStatus::Running;
        info!(service = definition.name, "service started");
        Ok(())
    }

    fn launch(&self, definition: &ServiceDefinition, instance: &ServiceInstance, vars: &BTreeMap<String, String>) -> Result<u32, Error> {
        let Some(start_template) = definition.start_command_template else {
            return Err(Error::StartFailed(definition.name.to_owned(), "service has no start command".to_owned()));
        };
        let argv = unit::expand_argv(start_template, vars);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::StartFailed(definition.name.to_owned(), "empty start command".to_owned()));
        };

        let unit_name = format!("{}-{}", crate::environment::NAME, definition.name);
        let env: BTreeMap<String, String> = BTreeMap::new();

        match launchpad_platform::current() {
            launchpad_platform::Platform::Macos => {
                let label = format!("com.{unit_name}");
                let unit = launchpad_platform::launchd_plist(&label, program, args, &env, Some(&instance.data_dir));
                launchpad_platform::write_unit(&unit)?;
                match launchpad_platform::load_unit(&unit, &unit_name) {
                    Ok(()) => Ok(0),
                    Err(_) => {
                        // macOS fallback: direct spawn when launchd loading fails, per
                        // spec.md §4.8.
                        let pid = launchpad_platform::spawn_detached(Path::new(program), args, &env, Some(&instance.log_file))?;
                        Ok(pid)
                    }
                }
            }
            launchpad_platform::Platform::Linux => {
                let exec_start = argv.join(" ");
                let unit = launchpad_platform::systemd_unit(&unit_name, &format!("Launchpad {}", definition.display_name), &exec_start, &env);
                launchpad_platform::write_unit(&unit)?;
                launchpad_platform::load_unit(&unit, &unit_name)?;
                Ok(0)
            }
            launchpad_platform::Platform::Other => {
                let pid = launchpad_platform::spawn_detached(Path::new(program), args, &env, Some(&instance.log_file))?;
                Ok(pid)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self, service_name: &str) -> Result<(), Error> {
        let start = std::time::Instant::now();
        let result = self.stop_inner(service_name).await;
        self.record("stop", service_name, start.elapsed(), result.as_ref().map(|_| ()).map_err(ToString::to_string));
        result
    }

    async fn stop_inner(&mut self, service_name: &str) -> Result<(), Error> {
        let definition = catalog::lookup(service_name).ok_or_else(|| Error::UnknownService(service_name.to_owned()))?;
        let instance = self.instances.get_mut(service_name).ok_or_else(|| Error::NotRunning(service_name.to_owned()))?;

        if instance.status != ServiceStatus::Running {
            return Ok(());
        }
        instance.status = ServiceStatus::Stopping;

        if self.test_mode {
            instance.status = ServiceStatus::Stopped;
            instance.pid = None;
            return Ok(());
        }

        let unit_name = format!("{}-{}", crate::environment::NAME, definition.name);
        let vars = template_vars(&definition, instance);

        if let Some(stop_template) = definition.stop_command_template {
            let argv = unit::expand_argv(stop_template, &vars);
            let outcome = unit::run_with_timeout(&argv, Duration::from_secs(30)).await;
            if !outcome.success
                && let Some(pid) = instance.pid.filter(|p| *p != 0)
            {
                let _ = launchpad_platform::terminate(pid);
            }
        } else if let Some(pid) = instance.pid.filter(|p| *p != 0) {
            launchpad_platform::terminate(pid)?;
        }

        if launchpad_platform::current() == launchpad_platform::Platform::Macos {
            let label = format!("com.{unit_name}");
            // launchd plist path is a deterministic function of the label; re-derive
            // it rather than persisting it on the instance.
            let unit = launchpad_platform::launchd_plist(&label, "true", &[], &BTreeMap::new(), None);
            let _ = launchpad_platform::unload_unit(&unit, &unit_name);
        } else if launchpad_platform::current() == launchpad_platform::Platform::Linux {
            let unit = launchpad_platform::systemd_unit(&unit_name, "", "", &BTreeMap::new());
            let _ = launchpad_platform::unload_unit(&unit, &unit_name);
        }

        if let Some(health_check) = &definition.health_check {
            probe_health_negative(health_check, &vars).await;
        }

        instance.status = ServiceStatus::Stopped;
        instance.pid = None;
        info!(service = definition.name, "service stopped");
        Ok(())
    }

    pub async fn restart(&mut self, service_name: &str, prefix: &Path) -> Result<(), Error> {
        self.stop(service_name).await?;
        self.start(service_name, prefix).await
    }

    #[instrument(skip(self))]
    pub fn enable(&mut self, service_name: &str) -> Result<(), Error> {
        catalog::lookup(service_name).ok_or_else(|| Error::UnknownService(service_name.to_owned()))?;
        let unit_name = format!("{}-{service_name}", crate::environment::NAME);
        if !self.test_mode {
            launchpad_platform::enable_unit(&unit_name)?;
        }
        if let Some(instance) = self.instances.get_mut(service_name) {
            instance.enabled = true;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn disable(&mut self, service_name: &str) -> Result<(), Error> {
        catalog::lookup(service_name).ok_or_else(|| Error::UnknownService(service_name.to_owned()))?;
        let unit_name = format!("{}-{service_name}", crate::environment::NAME);
        if !self.test_mode {
            launchpad_platform::disable_unit(&unit_name)?;
        }
        if let Some(instance) = self.instances.get_mut(service_name) {
            instance.enabled = false;
        }
        Ok(())
    }

    fn record(&mut self, action: &str, service_name: &str, duration: Duration, result: Result<(), String>) {
        self.operation_log.push(OperationLogEntry {
            action: action.to_owned(),
            service_name: service_name.to_owned(),
            timestamp: now(),
            result,
            duration,
        });
    }
}

fn template_vars(definition: &ServiceDefinition, instance: &ServiceInstance) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("dataDir".to_owned(), instance.data_dir.display().to_string());
    vars.insert("configFile".to_owned(), instance.config_file.display().to_string());
    vars.insert("logFile".to_owned(), instance.log_file.display().to_string());
    vars.insert("port".to_owned(), definition.port.to_string());
    vars.insert("dbUsername".to_owned(), instance.config.get("dbUsername").cloned().unwrap_or_else(|| "launchpad".to_owned()));
    vars.insert("dbPassword".to_owned(), instance.config.get("dbPassword").cloned().unwrap_or_default());
    vars.insert("authMethod".to_owned(), instance.config.get("authMethod").cloned().unwrap_or_else(|| "trust".to_owned()));
    vars.insert("projectName".to_owned(), instance.config.get("projectName").cloned().unwrap_or_else(|| "app".to_owned()));
    vars.insert(
        "projectDatabase".to_owned(),
        instance.config.get("projectDatabase").cloned().unwrap_or_else(|| "app".to_owned()),
    );
    for (key, value) in &instance.config {
        vars.entry(key.clone()).or_insert_with(|| value.clone());
    }
    vars
}

/// A data directory needs one-time init when its marker file is absent —
/// `PG_VERSION` for postgres, an empty check (MySQL's `--initialize-insecure`
/// is itself idempotent-ish) otherwise.
fn is_first_start(data_dir: &Path, service_name: &str) -> bool {
    let marker = match service_name {
        "postgres" => data_dir.join("PG_VERSION"),
        "mysql" => data_dir.join("mysql"),
        _ => return false,
    };
    !marker.exists()
}

async fn probe_health(health_check: &catalog::HealthCheckTemplate, vars: &BTreeMap<String, String>) -> Result<(), Error> {
    let argv = unit::expand_argv(health_check.command_template, vars);
    let timeout = Duration::from_secs(health_check.timeout_secs);

    const ATTEMPTS: u32 = 5;
    for attempt in 0..ATTEMPTS {
        let outcome = unit::run_with_timeout(&argv, timeout).await;
        if outcome.code == Some(health_check.expected_exit_code) {
            return Ok(());
        }
        if attempt + 1 < ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
        }
    }
    Err(Error::HealthCheckFailed(String::new()))
}

/// Poll `health_check` until it reports the service no longer responds
/// (or attempts run out). The pid is cleared only once this returns,
/// mirroring `probe_health`'s positive-polling loop used on start.
async fn probe_health_negative(health_check: &catalog::HealthCheckTemplate, vars: &BTreeMap<String, String>) {
    let argv = unit::expand_argv(health_check.command_template, vars);
    let timeout = Duration::from_secs(health_check.timeout_secs);

    const ATTEMPTS: u32 = 5;
    for attempt in 0..ATTEMPTS {
        let outcome = unit::run_with_timeout(&argv, timeout).await;
        if outcome.code != Some(health_check.expected_exit_code) {
            return;
        }
        if attempt + 1 < ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
        }
    }
    warn!("health check still positive after shutdown; proceeding anyway");
}

fn now() -> std::time::SystemTime {
    std::time::SystemTime::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mode_start_short_circuits_to_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ServiceManager::new(true);

        manager.start("postgres", dir.path()).await.unwrap();

        let instance = manager.status("postgres").unwrap();
        assert_eq!(instance.status, ServiceStatus::Running);
        assert_eq!(manager.operation_log().len(), 1);
        assert_eq!(manager.operation_log()[0].action, "start");
    }

    #[tokio::test]
    async fn test_mode_stop_returns_to_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ServiceManager::new(true);

        manager.start("redis", dir.path()).await.unwrap();
        manager.stop("redis").await.unwrap();

        assert_eq!(manager.status("redis").unwrap().status, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn unknown_service_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ServiceManager::new(true);

        let result = manager.start("not-a-service", dir.path()).await;
        assert!(matches!(result, Err(Error::UnknownService(_))));
    }

    #[test]
    fn first_start_detection_looks_for_pg_version() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_first_start(dir.path(), "postgres"));

        std::fs::write(dir.path().join("PG_VERSION"), "16").unwrap();
        assert!(!is_first_start(dir.path(), "postgres"));
    }

    #[test]
    fn template_vars_fill_known_placeholders() {
        let definition = catalog::lookup("postgres").unwrap();
        let instance = ServiceInstance::new("postgres", Path::new("/env"));
        let vars = template_vars(&definition, &instance);

        assert_eq!(vars.get("port").map(String::as_str), Some("5432"));
        assert_eq!(vars.get("authMethod").map(String::as_str), Some("trust"));
    }
}
