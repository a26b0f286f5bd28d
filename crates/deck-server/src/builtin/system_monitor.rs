//! System monitor extension
//!
//! Host, process and network statistics collected with `sysinfo`. Routes,
//! relative to `/api/ext/system_monitor`:
//!
//! - `GET /info`
//! - `GET /system-info`
//! - `GET /processes?search=`
//! - `GET /network`

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use deck_sdk::{ExtensionModule, RouteGroup};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use sysinfo::{Disks, Networks, System, Users, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::{error, info};

/// Name under which the module is registered in the catalog
pub const MODULE_NAME: &str = "system_monitor";

/// Processes returned by `/processes`
pub const PROCESS_LIMIT: usize = 50;

type HandlerError = (StatusCode, Json<Value>);

#[derive(Debug, Default)]
pub struct SystemMonitor;

impl SystemMonitor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtensionModule for SystemMonitor {
    async fn init(&self) -> anyhow::Result<()> {
        info!("System monitor initialized");
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        info!("System monitor unloaded");
        Ok(())
    }

    fn register_routes(&self, routes: &mut RouteGroup) {
        routes
            .route("/info", get(extension_info))
            .route("/system-info", get(system_info))
            .route("/processes", get(processes))
            .route("/network", get(network));
    }
}

#[derive(Debug, Serialize)]
pub struct CpuInfo {
    pub count: usize,
    pub usage: f32,
}

#[derive(Debug, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct DiskInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub system: Option<String>,
    pub release: Option<String>,
    pub version: Option<String>,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub disk: DiskInfo,
}

#[derive(Debug, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub username: Option<String>,
    pub memory_percent: f64,
    pub cpu_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct ProcessList {
    /// Matching processes before truncation
    pub count: usize,
    pub processes: Vec<ProcessInfo>,
}

#[derive(Debug, Serialize)]
pub struct InterfaceStats {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
}

#[derive(Debug, Serialize)]
pub struct NetworkInfo {
    pub interfaces: BTreeMap<String, InterfaceStats>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessQuery {
    #[serde(default)]
    pub search: String,
}

async fn extension_info() -> Json<Value> {
    Json(json!({
        "id": MODULE_NAME,
        "name": "System monitor",
        "description": "System resource and process monitoring",
        "version": "0.1.0",
        "author": "Deck",
    }))
}

async fn system_info() -> Result<Json<SystemInfo>, HandlerError> {
    blocking(collect_system_info).await.map(Json)
}

async fn processes(Query(query): Query<ProcessQuery>) -> Result<Json<ProcessList>, HandlerError> {
    blocking(move || collect_processes(&query.search))
        .await
        .map(Json)
}

async fn network() -> Result<Json<NetworkInfo>, HandlerError> {
    blocking(collect_network).await.map(Json)
}

/// sysinfo refreshes block (CPU usage needs two samples), so collection runs
/// on the blocking pool
async fn blocking<T, F>(collect: F) -> Result<T, HandlerError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(collect).await.map_err(|e| {
        error!("System monitor collection failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn collect_system_info() -> SystemInfo {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"));
    let (total, free) = match root {
        Some(disk) => (disk.total_space(), disk.available_space()),
        None => disks.list().iter().fold((0, 0), |(t, f), d| {
            (t + d.total_space(), f + d.available_space())
        }),
    };
    let used = total.saturating_sub(free);

    SystemInfo {
        hostname: System::host_name(),
        system: System::name(),
        release: System::kernel_version(),
        version: System::os_version(),
        cpu: CpuInfo {
            count: sys.cpus().len(),
            usage: sys.global_cpu_info().cpu_usage(),
        },
        memory: MemoryInfo {
            total: sys.total_memory(),
            available: sys.available_memory(),
            used: sys.used_memory(),
            percent: percent(sys.used_memory(), sys.total_memory()),
        },
        disk: DiskInfo {
            total,
            used,
            free,
            percent: percent(used, total),
        },
    }
}

/// Processes whose name contains `search` (case-insensitive), busiest first
pub fn collect_processes(search: &str) -> ProcessList {
    let search = search.trim().to_lowercase();

    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes();

    let users = Users::new_with_refreshed_list();
    let total_memory = sys.total_memory();

    let mut processes: Vec<ProcessInfo> = sys
        .processes()
        .values()
        .filter(|p| search.is_empty() || p.name().to_lowercase().contains(&search))
        .map(|p| ProcessInfo {
            pid: p.pid().as_u32(),
            name: p.name().to_string(),
            username: p.user_id().and_then(|uid| {
                users
                    .list()
                    .iter()
                    .find(|u| u.id() == uid)
                    .map(|u| u.name().to_string())
            }),
            memory_percent: percent(p.memory(), total_memory),
            cpu_percent: round2(f64::from(p.cpu_usage())),
        })
        .collect();

    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    let count = processes.len();
    processes.truncate(PROCESS_LIMIT);

    ProcessList { count, processes }
}

pub fn collect_network() -> NetworkInfo {
    let networks = Networks::new_with_refreshed_list();
    let interfaces = networks
        .list()
        .iter()
        .map(|(name, data)| {
            (
                name.clone(),
                InterfaceStats {
                    bytes_sent: data.total_transmitted(),
                    bytes_recv: data.total_received(),
                    packets_sent: data.total_packets_transmitted(),
                    packets_recv: data.total_packets_received(),
                    errin: data.total_errors_on_received(),
                    errout: data.total_errors_on_transmitted(),
                },
            )
        })
        .collect();

    NetworkInfo { interfaces }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use deck_sdk::RouteTable;
    use http_body_util::BodyExt;

    async fn get_json(table: &RouteTable, uri: &str) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = table.dispatch(MODULE_NAME, request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn bound_table() -> RouteTable {
        let mut group = RouteGroup::new(MODULE_NAME);
        SystemMonitor::new().register_routes(&mut group);
        assert_eq!(group.route_count(), 4);

        let table = RouteTable::new();
        table.bind(group).await;
        table
    }

    #[tokio::test]
    async fn test_info_route() {
        let table = bound_table().await;
        let (status, body) = get_json(&table, "/api/ext/system_monitor/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "system_monitor");
        assert_eq!(body["version"], "0.1.0");
    }

    #[tokio::test]
    async fn test_system_info_route() {
        let table = bound_table().await;
        let (status, body) = get_json(&table, "/api/ext/system_monitor/system-info").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["cpu"]["count"].as_u64().unwrap() > 0);
        assert!(body["memory"]["total"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_process_search_filters() {
        let table = bound_table().await;
        let (status, body) = get_json(
            &table,
            "/api/ext/system_monitor/processes?search=deck_no_such_process_name",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["processes"], json!([]));
    }

    #[test]
    fn test_process_list_is_bounded_and_sorted() {
        let list = collect_processes("");
        assert!(list.processes.len() <= PROCESS_LIMIT);
        assert!(list.count >= list.processes.len());
        assert!(
            list.processes
                .windows(2)
                .all(|w| w[0].cpu_percent >= w[1].cpu_percent)
        );
    }

    #[tokio::test]
    async fn test_network_route() {
        let table = bound_table().await;
        let (status, body) = get_json(&table, "/api/ext/system_monitor/network").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["interfaces"].is_object());
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[tokio::test]
    async fn test_hooks() {
        let monitor = SystemMonitor::new();
        assert!(monitor.init().await.is_ok());
        assert!(monitor.shutdown().await.is_ok());
    }
}
