// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Static service definitions, per spec.md §3 ("Service definition").

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub command: Vec<String>,
    pub expected_exit_code: i32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: &'static str,
    pub display_name: &'static str,
    pub executable: &'static str,
    pub package_domain: Option<&'static str>,
    /// `Some` for databases needing one-time data-directory setup.
    pub init_command_template: Option<&'static str>,
    pub start_command_template: Option<&'static str>,
    pub stop_command_template: Option<&'static str>,
    pub post_start_command_templates: &'static [&'static str],
    pub port: u16,
    pub health_check: Option<HealthCheckTemplate>,
}

#[derive(Debug, Clone)]
pub struct HealthCheckTemplate {
    pub command_template: &'static str,
    pub expected_exit_code: i32,
    pub timeout_secs: u64,
}

/// Returns the service name for `domain`, if the domain is service-
/// associated (drives §4.7's auto-start step).
pub fn service_for_domain(domain: &str) -> Option<&'static str> {
    definitions().into_iter().find(|d| d.package_domain == Some(domain)).map(|d| d.name)
}

pub fn lookup(name: &str) -> Option<ServiceDefinition> {
    definitions().into_iter().find(|d| d.name == name)
}

pub fn definitions() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition {
            name: "postgres",
            display_name: "PostgreSQL",
            executable: "postgres",
            package_domain: Some("postgresql.org"),
            init_command_template: Some("initdb -D {dataDir} -U {dbUsername} --auth-local={authMethod}"),
            start_command_template: Some("postgres -D {dataDir} -p {port}"),
            stop_command_template: Some("pg_ctl -D {dataDir} stop -m fast"),
            post_start_command_templates: &["createdb -h 127.0.0.1 -p {port} -U {dbUsername} {projectDatabase}"],
            port: 5432,
            health_check: Some(HealthCheckTemplate {
                command_template: "psql -h 127.0.0.1 -p {port} -U {dbUsername} -c 'select 1'",
                expected_exit_code: 0,
                timeout_secs: 5,
            }),
        },
        ServiceDefinition {
            name: "redis",
            display_name: "Redis",
            executable: "redis-server",
            package_domain: Some("redis.io"),
            init_command_template: None,
            start_command_template: Some("redis-server --port {port} --daemonize no"),
            stop_command_template: Some("redis-cli -p {port} shutdown nosave"),
            post_start_command_templates: &[],
            port: 6379,
            health_check: Some(HealthCheckTemplate {
                command_template: "redis-cli -p {port} ping",
                expected_exit_code: 0,
                timeout_secs: 5,
            }),
        },
        ServiceDefinition {
            name: "mysql",
            display_name: "MySQL",
            executable: "mysqld",
            package_domain: Some("mysql.com"),
            init_command_template: Some("mysqld --initialize-insecure --datadir={dataDir}"),
            start_command_template: Some("mysqld --datadir={dataDir} --port={port}"),
            stop_command_template: Some("mysqladmin -P {port} -u root shutdown"),
            post_start_command_templates: &[],
            port: 3306,
            health_check: Some(HealthCheckTemplate {
                command_template: "mysqladmin -P {port} -u root ping",
                expected_exit_code: 0,
                timeout_secs: 5,
            }),
        },
    ]
}

/// Default per-instance paths under the environment's data directory.
pub fn default_paths(env_dir: &std::path::Path, service_name: &str) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let base = env_dir.join("services").join(service_name);
    (base.join("data"), base.join("config"), base.join("log/service.log"), base.join("service.pid"))
}
